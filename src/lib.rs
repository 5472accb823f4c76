pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod store;
pub mod telemetry;

pub use dispatch::{ContentFormat, ContentResult, KeyRecord, ValueType};
pub use error::{OperationError, status_text};
pub use protocol::{RespParser, RespValue};
pub use store::{MemoryStore, RespConnector, StoreConnector, StoreDriver, StoreError};
