//! Rebuilding records from raw account data
//!
//! When a leaf fetched a `dataSlice`, the slice is zero-padded back to the
//! full record size before decoding so the decoder sees every field at its
//! real offset. Fields outside the slice decode as zeroes and are never
//! copied into the record.

use crate::compile::{CompiledQuery, ProjectionSpan, Selection};
use crate::config::FetchOptions;
use crate::error::ReconstructError;
use crate::rpc::RawAccount;
use accounts_query_schema::{decode_record, Schema};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_REQUEST_ID: i64 = 1;

/// Attached to every record when metadata is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Caller-supplied `with_metadata` entries
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub pubkey: String,
    #[serde(rename = "requestId")]
    pub request_id: Value,
}

/// A decoded, projected account.
///
/// Serializes as the field map with metadata under `$metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(rename = "$metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn pubkey(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.pubkey.as_str())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Deserializes the fields into `T`, keeping the raw record if they don't fit.
    pub fn typed<T: DeserializeOwned>(self) -> TypedRecord<T> {
        match serde_json::from_value::<T>(Value::Object(self.fields.clone())) {
            Ok(value) => TypedRecord::Typed {
                value,
                metadata: self.metadata,
            },
            Err(e) => {
                tracing::debug!("Record does not deserialize into target type: {}", e);
                TypedRecord::Raw(self)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedRecord<T> {
    Typed { value: T, metadata: Option<Metadata> },
    Raw(Record),
}

impl<T> TypedRecord<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            TypedRecord::Typed { value, .. } => Some(value),
            TypedRecord::Raw(_) => None,
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            TypedRecord::Typed { metadata, .. } => metadata.as_ref(),
            TypedRecord::Raw(record) => record.metadata.as_ref(),
        }
    }
}

/// Prepends `span.offset` zero bytes and appends enough to reach `total_len`.
pub fn pad_slice(slice: &[u8], span: ProjectionSpan, total_len: usize) -> Vec<u8> {
    let tail = total_len.saturating_sub(span.offset + span.length);
    let mut padded = Vec::with_capacity(span.offset + slice.len() + tail);
    padded.resize(span.offset, 0);
    padded.extend_from_slice(slice);
    padded.resize(padded.len() + tail, 0);
    padded
}

fn project(decoded: Map<String, Value>, selection: &Selection) -> Map<String, Value> {
    match selection {
        Selection::All => decoded,
        Selection::Nothing => Map::new(),
        Selection::Fields(fields) => decoded
            .into_iter()
            .filter(|(name, _)| fields.contains(name))
            .collect(),
    }
}

fn decode_fields(
    schema: &Schema,
    query: &CompiledQuery,
    raw: &RawAccount,
) -> Result<Map<String, Value>, ReconstructError> {
    if query.selection == Selection::Nothing {
        return Ok(Map::new());
    }

    let bytes = STANDARD.decode(raw.data.as_bytes())?;

    let decoded = match (&query.selection, query.compiled.projection) {
        (Selection::Fields(fields), Some(span)) if !fields.is_empty() => {
            let padded = pad_slice(&bytes, span, query.compiled.total_len);
            decode_record(schema, &query.record, &padded)?
        }
        _ => decode_record(schema, &query.record, &bytes)?,
    };

    Ok(project(decoded, &query.selection))
}

/// Turns one returned account into a record, or `None` if it is filtered out.
pub fn reconstruct(
    schema: &Schema,
    query: &CompiledQuery,
    raw: &RawAccount,
    options: &FetchOptions,
) -> Option<Record> {
    let fields = match decode_fields(schema, query, raw) {
        Ok(fields) => fields,
        Err(e) if options.include_empty_results => {
            tracing::warn!("Keeping undecodable account {}: {}", raw.pubkey, e);
            Map::new()
        }
        Err(e) => {
            tracing::warn!("Dropping undecodable account {}: {}", raw.pubkey, e);
            return None;
        }
    };

    let passes = query.compiled.predicates().all(|(field, predicate)| {
        let value = fields.get(field).unwrap_or(&Value::Null);
        predicate(value, &fields)
    });
    if !passes {
        return None;
    }

    let metadata = options.include_metadata.then(|| {
        let mut extra = query.metadata.clone();
        extra.remove("pubkey");
        extra.remove("requestId");
        Metadata {
            extra,
            pubkey: raw.pubkey.clone(),
            request_id: query.request_id.clone(),
        }
    });

    Some(Record { fields, metadata })
}

pub(crate) fn default_request_id() -> Value {
    json!(DEFAULT_REQUEST_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_slice_restores_offsets() {
        let padded = pad_slice(&[7], ProjectionSpan { offset: 33, length: 1 }, 34);
        assert_eq!(padded.len(), 34);
        assert_eq!(padded[33], 7);
        assert!(padded[..33].iter().all(|b| *b == 0));

        let padded = pad_slice(&[1, 2], ProjectionSpan { offset: 4, length: 2 }, 10);
        assert_eq!(padded, vec![0, 0, 0, 0, 1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_record_serializes_with_metadata_block() {
        let mut fields = Map::new();
        fields.insert("isWritable".to_string(), json!(1));
        let mut extra = Map::new();
        extra.insert("source".to_string(), json!("test"));

        let record = Record {
            fields,
            metadata: Some(Metadata {
                extra,
                pubkey: "abc".to_string(),
                request_id: default_request_id(),
            }),
        };

        assert_eq!(
            record.to_json(),
            json!({
                "isWritable": 1,
                "$metadata": { "source": "test", "pubkey": "abc", "requestId": 1 }
            })
        );
        assert_eq!(record.pubkey(), Some("abc"));
    }

    #[test]
    fn test_typed_falls_back_to_raw() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Flags {
            is_signer: u8,
        }

        let mut fields = Map::new();
        fields.insert("isSigner".to_string(), json!(1));
        let record = Record {
            fields,
            metadata: None,
        };

        let typed = record.clone().typed::<Flags>();
        assert_eq!(typed.value(), Some(&Flags { is_signer: 1 }));

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Other {
            missing: String,
        }
        assert!(matches!(record.clone().typed::<Other>(), TypedRecord::Raw(r) if r == record));
    }
}
