//! Store driver collaborator: the primitive per-key operations the
//! inspector, scanner, exporter and importer are built on.
//!
//! Provides an in-memory driver and a RESP-over-TCP driver.

pub mod traits;
pub mod memory;
pub mod network;

pub use traits::*;
pub use memory::MemoryStore;
pub use network::{RespConnector, RespStore};
