//! # accounts-query
//!
//! Chainable query builder for fetching Borsh-serialized program accounts
//! over Solana JSON-RPC.
//!
//! A query names a record type of a [`Schema`], binds one or more program
//! addresses with [`AccountsQuery::at`], and narrows each with a field
//! selection and equality filters. Filters become `memcmp`/`dataSize`
//! constraints evaluated by the RPC node, selections become a `dataSlice`,
//! and the returned account data is decoded back into JSON records.
//!
//! ## Example
//!
//! ```rust,ignore
//! use accounts_query::prelude::*;
//!
//! let mut query = AccountsQuery::new(schema, "AccountMetaData");
//! query
//!     .at("dammHkt7jmytvbS3nHTxQNEcP59aE57nxwV21YdqEDN")
//!     .select(["isWritable"])
//!     .where_(Where::new().eq("isSigner", 1u8).is_null("delegate"));
//!
//! for record in query.fetch().await? {
//!     println!("{} {:?}", record.pubkey().unwrap_or_default(), record.fields);
//! }
//! ```
//!
//! ## Failure model
//!
//! Layout, unknown-field and literal-length errors abort the whole fetch.
//! Transport failures and undecodable accounts only reduce the number of
//! records returned.

mod compile;
mod config;
mod error;
mod filter;
pub mod prelude;
mod query;
mod record;
mod rpc;
pub mod telemetry;

pub use compile::{
    compile_filters, rpc_payload, CompiledFilter, CompiledFilters, CompiledQuery, ProjectionSpan,
    Selection,
};
pub use config::{
    Commitment, ConnectionSpec, FetchOptions, QueryConfig, RpcConnection, DEFAULT_BATCH_DELAY,
    DEFAULT_ENDPOINT, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_REQUESTS_PER_BATCH,
};
pub use error::{QueryError, ReconstructError, TransportError};
pub use filter::{Condition, FilterValue, Predicate, Where};
pub use query::{AccountsQuery, Leaf, NodeId, QueryNode};
pub use record::{pad_slice, reconstruct, Metadata, Record, TypedRecord, DEFAULT_REQUEST_ID};
pub use rpc::{execute, HttpTransport, RawAccount, Transport};

pub use accounts_query_schema::{self as schema, FieldType, Schema};
pub use serde_json::Value;
pub use solana_pubkey::Pubkey;
