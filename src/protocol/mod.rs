//! Redis Serialization Protocol (RESP2) codec used by the network driver.

pub mod resp;

pub use resp::*;
