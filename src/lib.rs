//! Root library file exposing the Hexagonal Architecture modules.
//!
//! # Architecture
//! - `core`: Conversion engine (buffers, trees, collectors, converter).
//! - `ports`: Interfaces (Traits) defining interaction contracts.
//! - `adapters`: Infrastructure implementations (line parser, sinks).

pub mod core;
pub mod ports;
pub mod adapters;
