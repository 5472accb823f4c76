//! Typed value dispatch: classify a key's shape, render it for display, and
//! move it in and out of the store.

pub mod admin;
pub mod escape;
pub mod export;
pub mod format;
pub mod import;
pub mod inspect;
pub mod scan;
pub mod ttl;
pub mod value_type;

pub use admin::{database_count, server_info};
pub use export::{export_key_list, export_keys, parse_key_list, ExportFormat, ExportOutput};
pub use format::{format_hash_text, format_scalar, ContentFormat};
pub use import::{create_key, delete_keys};
pub use inspect::{display_content, Content, ContentResult, InspectOptions, ScoredMember};
pub use scan::{list_keys, KeyRecord, KeysResult, ScanStatus};
pub use value_type::ValueType;
