use crate::error::QueryError;
use serde_json::{Map, Value};
use solana_pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Client-side filter: receives the decoded field value (`Null` when the
/// field was not selected) and the record's projected field map.
pub type Predicate = Arc<dyn Fn(&Value, &Map<String, Value>) -> bool + Send + Sync>;

/// A literal compared byte-for-byte against account data.
///
/// Each variant encodes to the little-endian bytes of its own width, so a
/// `U64` literal only ever matches an 8-byte field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Bool(bool),
    Pubkey(Pubkey),
    Bytes(Vec<u8>),
}

impl FilterValue {
    /// Parses a base58 account address.
    pub fn address(address: &str) -> Result<Self, QueryError> {
        Pubkey::from_str(address)
            .map(FilterValue::Pubkey)
            .map_err(|_| QueryError::InvalidAddress(address.to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            FilterValue::U8(v) => v.to_le_bytes().to_vec(),
            FilterValue::U16(v) => v.to_le_bytes().to_vec(),
            FilterValue::U32(v) => v.to_le_bytes().to_vec(),
            FilterValue::U64(v) => v.to_le_bytes().to_vec(),
            FilterValue::U128(v) => v.to_le_bytes().to_vec(),
            FilterValue::I8(v) => v.to_le_bytes().to_vec(),
            FilterValue::I16(v) => v.to_le_bytes().to_vec(),
            FilterValue::I32(v) => v.to_le_bytes().to_vec(),
            FilterValue::I64(v) => v.to_le_bytes().to_vec(),
            FilterValue::I128(v) => v.to_le_bytes().to_vec(),
            FilterValue::Bool(v) => vec![*v as u8],
            FilterValue::Pubkey(key) => key.to_bytes().to_vec(),
            FilterValue::Bytes(bytes) => bytes.clone(),
        }
    }
}

macro_rules! impl_from_literal {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(v: $ty) -> Self {
                    FilterValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_literal!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    bool => Bool,
    Pubkey => Pubkey,
    Vec<u8> => Bytes,
);

impl<const N: usize> From<[u8; N]> for FilterValue {
    fn from(bytes: [u8; N]) -> Self {
        FilterValue::Bytes(bytes.to_vec())
    }
}

#[derive(Clone)]
pub enum Condition {
    Eq(FilterValue),
    IsNull,
    Matches(Predicate),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Eq(v) => f.debug_tuple("Eq").field(v).finish(),
            Condition::IsNull => f.write_str("IsNull"),
            Condition::Matches(_) => f.write_str("Matches(<fn>)"),
        }
    }
}

/// Field conditions for a leaf query. All conditions must hold.
///
/// ```rust,ignore
/// let conditions = Where::new()
///     .eq("pubkey", FilterValue::address("dammHkt7jmytvbS3nHTxQNEcP59aE57nxwV21YdqEDN")?)
///     .is_null("delegate")
///     .matches("isSigner", |v, _| v == &json!(1));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Where {
    conditions: Vec<(String, Condition)>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches accounts whose field bytes equal `value`.
    pub fn eq(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// Matches accounts whose field bytes are all zero.
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.with(field, Condition::IsNull)
    }

    /// Keeps records for which `predicate` returns true. Evaluated client-side.
    pub fn matches<F>(self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.with(field, Condition::Matches(Arc::new(predicate)))
    }

    /// Sets the condition for `field`, replacing any earlier one.
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        let field = field.into();
        match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some(existing) => existing.1 = condition,
            None => self.conditions.push((field, condition)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
