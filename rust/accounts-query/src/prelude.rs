//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use accounts_query::prelude::*;
//! ```

pub use crate::{
    AccountsQuery, Commitment, ConnectionSpec, FetchOptions, FieldType, FilterValue, QueryConfig,
    QueryError, Record, RpcConnection, Schema, Transport, TypedRecord, Where,
};

pub use std::sync::Arc;
