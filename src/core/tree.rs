use crate::core::buffer::Buffer;

/// Payload of a buffer tree node.
#[derive(Debug, Default)]
enum NodeKind {
    /// Renders to nothing; not a member of any priority ring.
    #[default]
    Void,
    /// A slice of the owning tree's text buffer.
    Text { pos: usize, len: usize },
    /// A nested tree.
    Tree(BufTree),
}

/// A buffer tree node. Non-void nodes are linked into a doubly-linked ring of
/// the nodes sharing their priority; the links are indices into the owning
/// tree's node array.
#[derive(Debug, Default)]
struct Node {
    kind: NodeKind,
    prio: usize,
    prev: usize,
    next: usize,
}

impl Node {
    fn is_void(&self) -> bool {
        matches!(self.kind, NodeKind::Void)
    }

    fn is_empty(&self) -> bool {
        match &self.kind {
            NodeKind::Void => true,
            NodeKind::Text { len, .. } => *len == 0,
            NodeKind::Tree(tree) => tree.is_empty(),
        }
    }

    fn is_solid(&self) -> bool {
        match &self.kind {
            NodeKind::Void => false,
            NodeKind::Text { .. } => true,
            NodeKind::Tree(tree) => tree.is_solid(),
        }
    }

    fn is_atomic(&mut self, cached: bool) -> bool {
        match &mut self.kind {
            NodeKind::Tree(tree) => tree.is_atomic(cached),
            _ => true,
        }
    }

    fn len(&mut self, cached: bool) -> usize {
        match &mut self.kind {
            NodeKind::Void => 0,
            NodeKind::Text { len, .. } => *len,
            NodeKind::Tree(tree) => tree.len(cached),
        }
    }

    fn trim(&mut self, atomic_cached: bool, len_cached: bool, budget: usize) -> usize {
        match &mut self.kind {
            NodeKind::Void => 0,
            NodeKind::Text { len, .. } => *len,
            NodeKind::Tree(tree) => tree.trim(atomic_cached, len_cached, budget),
        }
    }
}

/// Growing buffer tree with priority-based trimming support.
///
/// The tree holds a text buffer, an ordered node array (the render order) and
/// one ring of nodes per priority. Text appended to the buffer since the last
/// commit forms the pending span; committing it snapshots the span into a new
/// or explicitly positioned text node. Trimming voids whole priority levels
/// from the highest priority down and proportionally shortens nested trees on
/// the first level that does not fit.
#[derive(Debug, Default)]
pub struct BufTree {
    text: Buffer,
    nodes: Vec<Node>,
    /// Head node index of the ring at each priority, if the priority is
    /// populated.
    prios: Vec<Option<usize>>,
    /// High-water mark of committed text.
    tail: usize,
    /// Cached total content length.
    len: usize,
    /// Cached "cannot be trimmed further" flag.
    atomic: bool,
}

impl BufTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text buffer markup is appended to before being committed as a
    /// node.
    pub fn text(&mut self) -> &mut Buffer {
        &mut self.text
    }

    pub fn empty(&mut self) {
        self.text.empty();
        self.nodes.clear();
        self.prios.clear();
        self.tail = 0;
        self.len = 0;
        self.atomic = false;
    }

    /// True if every node renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(Node::is_empty)
    }

    /// True if no node is void.
    pub fn is_solid(&self) -> bool {
        self.nodes.iter().all(Node::is_solid)
    }

    /// True if trimming cannot shorten the tree any further.
    pub fn is_atomic(&mut self, cached: bool) -> bool {
        if cached {
            return self.atomic;
        }
        // Non-atomic if any priority-zero node is non-atomic.
        if let Some(&Some(head)) = self.prios.first() {
            let mut index = head;
            loop {
                let next = self.nodes[index].next;
                if !self.nodes[index].is_atomic(false) {
                    self.atomic = false;
                    return false;
                }
                index = next;
                if index == head {
                    break;
                }
            }
        }
        // Non-atomic if any node sits above priority zero.
        if self.prios.iter().skip(1).any(Option::is_some) {
            self.atomic = false;
            return false;
        }
        self.atomic = true;
        true
    }

    /// Total content length; recomputed and cached unless `cached`.
    pub fn len(&mut self, cached: bool) -> usize {
        if !cached {
            let mut len = 0;
            for node in &mut self.nodes {
                len += node.len(false);
            }
            self.len = len;
        }
        self.len
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_exists(&self, index: usize) -> bool {
        self.nodes.get(index).is_some_and(|node| !node.is_void())
    }

    /// Void the node at `index`, unlinking it from its priority ring.
    /// Indices past the end allocate void nodes up to and including `index`.
    pub fn void_node(&mut self, index: usize) {
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, Node::default);
            return;
        }
        if self.nodes[index].is_void() {
            return;
        }
        let (prio, prev, next) = {
            let node = &self.nodes[index];
            (node.prio, node.prev, node.next)
        };
        if next == index {
            self.prios[prio] = None;
        } else {
            self.nodes[prev].next = next;
            self.nodes[next].prev = prev;
            if self.prios[prio] == Some(index) {
                self.prios[prio] = Some(next);
            }
        }
        self.nodes[index].kind = NodeKind::Void;
    }

    /// Void and re-link the node at `index` into the ring of `prio`.
    fn put(&mut self, index: usize, prio: usize) {
        self.void_node(index);
        if prio >= self.prios.len() {
            self.prios.resize(prio + 1, None);
        }
        match self.prios[prio] {
            None => {
                self.prios[prio] = Some(index);
                self.nodes[index].prev = index;
                self.nodes[index].next = index;
            }
            Some(head) => {
                let tail = self.nodes[head].prev;
                self.nodes[tail].next = index;
                self.nodes[head].prev = index;
                self.nodes[index].prev = tail;
                self.nodes[index].next = head;
            }
        }
        self.nodes[index].prio = prio;
    }

    /// Commit the pending text span into the node slot at `index`.
    pub fn put_text(&mut self, index: usize, prio: usize) {
        self.put(index, prio);
        self.nodes[index].kind = NodeKind::Text {
            pos: self.tail,
            len: self.text.len() - self.tail,
        };
        self.tail = self.text.len();
    }

    /// Commit the pending text span as a new node at the end.
    pub fn add_text(&mut self, prio: usize) {
        self.put_text(self.nodes.len(), prio);
    }

    /// Place a nested tree into the node slot at `index`.
    pub fn put_tree(&mut self, index: usize, prio: usize, tree: BufTree) {
        self.put(index, prio);
        self.nodes[index].kind = NodeKind::Tree(tree);
    }

    /// Place a nested tree as a new node at the end.
    pub fn add_tree(&mut self, prio: usize, tree: BufTree) {
        self.put_tree(self.nodes.len(), prio, tree);
    }

    /// Content length of one priority level.
    fn prio_len(&mut self, cached: bool, prio: usize) -> usize {
        let mut len = 0;
        if let Some(head) = self.prios[prio] {
            let mut index = head;
            loop {
                let next = self.nodes[index].next;
                len += self.nodes[index].len(cached);
                index = next;
                if index == head {
                    break;
                }
            }
        }
        len
    }

    /// Void every node of one priority level.
    fn prio_void(&mut self, prio: usize) {
        if let Some(head) = self.prios[prio] {
            let mut index = head;
            loop {
                let next = self.nodes[index].next;
                self.nodes[index].kind = NodeKind::Void;
                index = next;
                if index == head {
                    break;
                }
            }
            self.prios[prio] = None;
        }
    }

    /// Proportionally trim the nodes of one priority level towards `budget`.
    /// Returns the resulting level length, which exceeds the budget when the
    /// level's atomic remainder does.
    fn prio_trim(
        &mut self,
        mut atomic_cached: bool,
        mut len_cached: bool,
        prio: usize,
        budget: usize,
    ) -> usize {
        loop {
            let mut atom_total = 0;
            let mut non_atom_total = 0;
            if let Some(head) = self.prios[prio] {
                let mut index = head;
                loop {
                    let next = self.nodes[index].next;
                    let node_len = self.nodes[index].len(len_cached);
                    if self.nodes[index].is_atomic(atomic_cached) {
                        atom_total += node_len;
                    } else {
                        non_atom_total += node_len;
                    }
                    index = next;
                    if index == head {
                        break;
                    }
                }
            }
            let total = atom_total + non_atom_total;
            len_cached = true;
            atomic_cached = true;
            if non_atom_total == 0 || total <= budget {
                return total;
            }
            let non_atom_budget = budget.saturating_sub(atom_total);
            if let Some(head) = self.prios[prio] {
                let mut index = head;
                loop {
                    let next = self.nodes[index].next;
                    if !self.nodes[index].is_atomic(atomic_cached) {
                        let node_len = self.nodes[index].len(len_cached);
                        let node_budget = node_len * non_atom_budget / non_atom_total;
                        self.nodes[index].trim(atomic_cached, len_cached, node_budget);
                    }
                    index = next;
                    if index == head {
                        break;
                    }
                }
            }
        }
    }

    /// Trim the tree's content to fit `budget` bytes if possible without
    /// voiding priority zero, caching the resulting length and atomicity.
    /// Returns the resulting length, which exceeds the budget only when the
    /// tree ends up atomic.
    pub fn trim(&mut self, atomic_cached: bool, len_cached: bool, budget: usize) -> usize {
        let nprios = self.prios.len();
        let mut tree_len = 0;
        let mut prio = 0;

        // Accumulate the priority levels that fit whole.
        while prio < nprios {
            let prio_len = self.prio_len(len_cached, prio);
            if tree_len + prio_len > budget {
                break;
            }
            tree_len += prio_len;
            prio += 1;
        }

        // Trim the first level that does not fit; keep it if it ends up
        // fitting, or unconditionally at priority zero.
        if prio < nprios {
            let trimmed = self.prio_trim(atomic_cached, true, prio, budget - tree_len);
            if tree_len + trimmed <= budget || prio == 0 {
                tree_len += trimmed;
                prio += 1;
            }
        }

        // Void all remaining levels.
        for p in prio..nprios {
            self.prio_void(p);
        }

        self.atomic = tree_len > budget;
        self.len = tree_len;
        tree_len
    }

    /// Append the rendered content, nodes in index order, to `out`.
    pub fn render(&self, out: &mut Buffer) {
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Void => {}
                NodeKind::Text { pos, len } => {
                    out.add_bytes(&self.text.as_slice()[*pos..pos + len]);
                }
                NodeKind::Tree(tree) => tree.render(out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_to_string(tree: &BufTree) -> String {
        let mut out = Buffer::new();
        tree.render(&mut out);
        String::from_utf8(out.as_slice().to_vec()).expect("rendered bytes should be UTF-8")
    }

    fn text_tree(spans: &[(&str, usize)]) -> BufTree {
        let mut tree = BufTree::new();
        for (text, prio) in spans {
            tree.text().add_str(text);
            tree.add_text(*prio);
        }
        tree
    }

    #[test]
    fn test_render_in_node_order() {
        let tree = text_tree(&[("a", 0), ("b", 2), ("c", 1)]);
        assert_eq!(render_to_string(&tree), "abc");
    }

    #[test]
    fn test_put_text_at_slot_leaves_voids() {
        let mut tree = BufTree::new();
        tree.text().add_str("x");
        tree.put_text(3, 0);
        assert_eq!(tree.node_count(), 4);
        assert!(!tree.node_exists(0));
        assert!(tree.node_exists(3));
        assert!(!tree.is_solid());
        assert_eq!(render_to_string(&tree), "x");
    }

    #[test]
    fn test_put_replaces_occupant() {
        let mut tree = text_tree(&[("old", 1)]);
        tree.text().add_str("new");
        tree.put_text(0, 2);
        assert_eq!(render_to_string(&tree), "new");
        assert_eq!(tree.len(false), 3);
    }

    #[test]
    fn test_void_node_unlinks_ring() {
        let mut tree = text_tree(&[("a", 1), ("b", 1), ("c", 1)]);
        tree.void_node(1);
        assert_eq!(render_to_string(&tree), "ac");
        assert_eq!(tree.len(false), 2);
        tree.void_node(0);
        tree.void_node(2);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_trim_voids_higher_priorities_first() {
        let mut tree = text_tree(&[("head", 0), ("body", 1), ("tail", 2)]);
        let len = tree.trim(false, false, 8);
        assert_eq!(len, 8);
        assert_eq!(render_to_string(&tree), "headbody");
        assert!(!tree.is_atomic(true));
    }

    #[test]
    fn test_trim_keeps_unremovable_priority_zero() {
        let mut tree = text_tree(&[("irreducible", 0)]);
        let len = tree.trim(false, false, 4);
        assert_eq!(len, 11);
        assert!(tree.is_atomic(true));
        assert_eq!(render_to_string(&tree), "irreducible");
    }

    #[test]
    fn test_trim_exact_fit_is_not_atomic() {
        let mut tree = text_tree(&[("12345678", 0)]);
        let len = tree.trim(false, false, 8);
        assert_eq!(len, 8);
        assert!(!tree.is_atomic(true));
    }

    #[test]
    fn test_trim_shortens_nested_tree() {
        // Priority 1 holds a child tree whose own priorities 1..4 can be
        // dropped one by one.
        let mut child = text_tree(&[("0000", 0), ("1111", 1), ("2222", 2), ("3333", 3)]);
        assert_eq!(child.len(false), 16);
        let mut tree = text_tree(&[("head", 0)]);
        tree.add_tree(1, child);
        let len = tree.trim(false, false, 12);
        assert_eq!(len, 12);
        assert_eq!(render_to_string(&tree), "head00001111");
    }

    #[test]
    fn test_trim_nested_atomic_minimum() {
        // The child cannot shrink below its priority-zero content, so the
        // whole level is voided and only unremovable content remains.
        let mut tree = text_tree(&[("head", 0)]);
        tree.add_tree(1, text_tree(&[("longpriozero", 0)]));
        let len = tree.trim(false, false, 6);
        assert_eq!(len, 4);
        assert_eq!(render_to_string(&tree), "head");
    }

    #[test]
    fn test_trim_is_monotonic() {
        let mut first = text_tree(&[("head", 0), ("body", 1), ("tail", 2)]);
        first.trim(false, false, 10);
        first.trim(true, true, 6);
        let mut direct = text_tree(&[("head", 0), ("body", 1), ("tail", 2)]);
        direct.trim(false, false, 6);
        assert_eq!(render_to_string(&first), render_to_string(&direct));
    }

    #[test]
    fn test_empty_resets_everything() {
        let mut tree = text_tree(&[("a", 0), ("b", 1)]);
        tree.empty();
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.len(false), 0);
        assert_eq!(render_to_string(&tree), "");
        // A second empty is a no-op.
        tree.empty();
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_solid_after_filling_all_slots() {
        let mut tree = BufTree::new();
        tree.text().add_str("b");
        tree.put_text(1, 1);
        assert!(!tree.is_solid());
        tree.text().add_str("a");
        tree.put_text(0, 0);
        assert!(tree.is_solid());
        assert_eq!(render_to_string(&tree), "ab");
    }
}
