//! Schema model and byte layout resolution for Borsh-serialized program accounts
//!
//! This crate describes account records as an ordered list of typed fields,
//! resolves the byte offset and length of every field, and decodes raw
//! account data back into JSON field maps.
//!
//! ## Example
//!
//! ```rust
//! use accounts_query_schema::{compute_layout, FieldType, Schema};
//!
//! let schema = Schema::new().with_struct(
//!     "AccountMetaData",
//!     [
//!         ("pubkey", FieldType::PUBKEY),
//!         ("isSigner", FieldType::U8),
//!         ("isWritable", FieldType::U8),
//!     ],
//! );
//!
//! let layout = compute_layout("AccountMetaData", &schema).unwrap();
//! assert_eq!(layout.total_len, 34);
//! assert_eq!(layout.field("isWritable").unwrap().offset, 33);
//! ```

pub mod decode;
pub mod error;
pub mod layout;
pub mod parse;
pub mod schema;
pub mod types;

pub use decode::decode_record;
pub use error::*;
pub use layout::{compute_layout, resolve_length, FieldLayout, RecordLayout};
pub use parse::{parse_schema_content, parse_schema_file};
pub use schema::*;
