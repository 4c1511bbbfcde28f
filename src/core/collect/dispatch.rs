use crate::core::collect::Collector;
use crate::core::error::ConvError;
use crate::core::format::Format;
use crate::core::record::Record;
use crate::core::tree::BufTree;

/// The root collector: routes each record to the collector registered for
/// its type name. The last table entry has no name and catches every other
/// type.
#[derive(Debug)]
pub(super) struct DispColl {
    map: Vec<(Option<&'static str>, Collector)>,
}

impl DispColl {
    pub(super) fn new() -> Self {
        Self {
            map: vec![
                (Some("EXECVE"), Collector::execve()),
                (Some("PATH"), Collector::path()),
                (Some("OBJ_PID"), Collector::repeated("obj_pid")),
                (Some("AVC"), Collector::repeated("avc")),
                (Some("EOE"), Collector::absorbing()),
                (None, Collector::unique()),
            ],
        }
    }

    fn lookup_mut(&mut self, name: &str) -> &mut Collector {
        let pos = self
            .map
            .iter()
            .position(|(entry, _)| entry.map_or(true, |n| n == name))
            .unwrap_or(self.map.len() - 1);
        &mut self.map[pos].1
    }

    pub(super) fn is_empty(&self) -> bool {
        self.map.iter().all(|(_, coll)| coll.is_empty())
    }

    pub(super) fn empty(&mut self) {
        for (_, coll) in &mut self.map {
            coll.empty();
        }
    }

    pub(super) fn add(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
        record: &Record,
    ) -> Result<(), ConvError> {
        self.lookup_mut(&record.type_name)
            .add(container, format, count, level, prio, record)
    }

    pub(super) fn end(
        &mut self,
        container: &mut BufTree,
        format: &Format,
        count: &mut usize,
        level: usize,
        prio: usize,
    ) -> Result<(), ConvError> {
        for (_, coll) in &mut self.map {
            coll.end(container, format, count, level, prio)?;
        }
        Ok(())
    }
}
