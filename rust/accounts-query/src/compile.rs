//! Filter compilation: where-conditions and selections to RPC filters
//!
//! Literal and null conditions become `memcmp` filters resolved against the
//! record layout; predicates stay client-side. A selection narrows the
//! request to the smallest contiguous `dataSlice` covering every selected
//! field. Unselected fields lying between two selected ones are fetched too
//! and discarded after decoding.

use crate::config::Commitment;
use crate::error::QueryError;
use crate::filter::{Condition, Predicate, Where};
use crate::query::NodeId;
use accounts_query_schema::RecordLayout;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Which fields a leaf returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every field; no `dataSlice`.
    #[default]
    All,
    /// No field data, only account existence.
    Nothing,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectionSpan {
    pub offset: usize,
    pub length: usize,
}

#[derive(Clone)]
pub enum CompiledFilter {
    ByteLiteral { offset: usize, bytes: Vec<u8> },
    ClientPredicate { field: String, predicate: Predicate },
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledFilter::ByteLiteral { offset, bytes } => f
                .debug_struct("ByteLiteral")
                .field("offset", offset)
                .field("bytes", &bs58::encode(bytes).into_string())
                .finish(),
            CompiledFilter::ClientPredicate { field, .. } => f
                .debug_struct("ClientPredicate")
                .field("field", field)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFilters {
    /// Byte literals sorted by offset, then predicates in condition order
    pub filters: Vec<CompiledFilter>,
    pub projection: Option<ProjectionSpan>,
    pub total_len: usize,
}

impl CompiledFilters {
    pub fn byte_literals(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.filters.iter().filter_map(|f| match f {
            CompiledFilter::ByteLiteral { offset, bytes } => Some((*offset, bytes.as_slice())),
            CompiledFilter::ClientPredicate { .. } => None,
        })
    }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.filters.iter().filter_map(|f| match f {
            CompiledFilter::ClientPredicate { field, predicate } => Some((field.as_str(), predicate)),
            CompiledFilter::ByteLiteral { .. } => None,
        })
    }

    /// Exact-size constraint, known whenever the record has any bytes.
    pub fn data_size(&self) -> Option<usize> {
        (self.total_len > 0).then_some(self.total_len)
    }
}

fn unknown_field(layout: &RecordLayout, field: &str) -> QueryError {
    QueryError::UnknownField {
        record: layout.record.clone(),
        field: field.to_string(),
    }
}

/// Compiles conditions and a selection against a record layout.
///
/// `discriminator` is matched at offset 0 ahead of any field filter.
pub fn compile_filters(
    conditions: &Where,
    selection: &Selection,
    layout: &RecordLayout,
    discriminator: &[u8],
) -> Result<CompiledFilters, QueryError> {
    let mut literals = Vec::new();
    let mut predicates = Vec::new();

    if !discriminator.is_empty() {
        literals.push((0, discriminator.to_vec()));
    }

    for (field, condition) in conditions.iter() {
        let field_layout = layout.field(field).ok_or_else(|| unknown_field(layout, field))?;

        let bytes = match condition {
            Condition::Matches(predicate) => {
                predicates.push(CompiledFilter::ClientPredicate {
                    field: field.to_string(),
                    predicate: predicate.clone(),
                });
                continue;
            }
            Condition::IsNull => vec![0u8; field_layout.length],
            Condition::Eq(value) => value.to_bytes(),
        };

        if bytes.len() != field_layout.length {
            return Err(QueryError::LengthMismatch {
                field: field.to_string(),
                expected: field_layout.length,
                actual: bytes.len(),
            });
        }

        literals.push((field_layout.offset, bytes));
    }

    literals.sort_by_key(|(offset, _)| *offset);

    let projection = match selection {
        Selection::All => None,
        Selection::Nothing => Some(ProjectionSpan {
            offset: 0,
            length: 0,
        }),
        Selection::Fields(fields) if fields.is_empty() => None,
        Selection::Fields(fields) => {
            let mut start = usize::MAX;
            let mut end = 0;
            for field in fields {
                let field_layout = layout.field(field).ok_or_else(|| unknown_field(layout, field))?;
                start = start.min(field_layout.offset);
                end = end.max(field_layout.end());
            }
            Some(ProjectionSpan {
                offset: start,
                length: end - start,
            })
        }
    };

    let mut filters: Vec<CompiledFilter> = literals
        .into_iter()
        .map(|(offset, bytes)| CompiledFilter::ByteLiteral { offset, bytes })
        .collect();
    filters.extend(predicates);

    Ok(CompiledFilters {
        filters,
        projection,
        total_len: layout.total_len,
    })
}

/// Everything needed to issue one leaf's request and rebuild its records.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub node: NodeId,
    pub record: String,
    pub program_address: String,
    pub selection: Selection,
    pub compiled: CompiledFilters,
    pub metadata: Map<String, Value>,
    pub request_id: Value,
    pub payload: Value,
}

/// Builds the `getProgramAccounts` JSON-RPC request for a compiled leaf.
pub fn rpc_payload(program_address: &str, commitment: Commitment, compiled: &CompiledFilters) -> Value {
    let mut filters: Vec<Value> = compiled
        .byte_literals()
        .map(|(offset, bytes)| {
            json!({
                "memcmp": {
                    "offset": offset,
                    "bytes": bs58::encode(bytes).into_string(),
                }
            })
        })
        .collect();

    if let Some(size) = compiled.data_size() {
        filters.push(json!({ "dataSize": size }));
    }

    let mut params = Map::new();
    params.insert("commitment".to_string(), json!(commitment.as_str()));
    params.insert("encoding".to_string(), json!("base64"));
    if !filters.is_empty() {
        params.insert("filters".to_string(), Value::Array(filters));
    }
    if let (Some(span), Some(_)) = (compiled.projection, compiled.data_size()) {
        params.insert("dataSlice".to_string(), json!(span));
    }

    json!({
        "jsonrpc": "2.0",
        "method": "getProgramAccounts",
        "id": 1,
        "params": [program_address, Value::Object(params)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterValue;
    use accounts_query_schema::{compute_layout, FieldType, Schema};

    fn layout() -> RecordLayout {
        let schema = Schema::new().with_struct(
            "AccountMetaData",
            [
                ("pubkey", FieldType::PUBKEY),
                ("isSigner", FieldType::U8),
                ("isWritable", FieldType::U8),
            ],
        );
        compute_layout("AccountMetaData", &schema).unwrap()
    }

    #[test]
    fn test_no_conditions_only_data_size() {
        let compiled = compile_filters(&Where::new(), &Selection::All, &layout(), &[]).unwrap();
        let payload = rpc_payload("123", Commitment::Confirmed, &compiled);

        assert_eq!(payload["params"][1]["filters"], json!([{ "dataSize": 34 }]));
        assert!(payload["params"][1].get("dataSlice").is_none());
        assert_eq!(payload["params"][1]["commitment"], json!("confirmed"));
        assert_eq!(payload["params"][0], json!("123"));
    }

    #[test]
    fn test_null_is_zero_filled() {
        let compiled =
            compile_filters(&Where::new().is_null("pubkey"), &Selection::All, &layout(), &[]).unwrap();
        let literals: Vec<_> = compiled.byte_literals().collect();

        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].0, 0);
        assert_eq!(literals[0].1, &[0u8; 32][..]);

        let payload = rpc_payload("123", Commitment::Confirmed, &compiled);
        assert_eq!(
            payload["params"][1]["filters"][0]["memcmp"]["bytes"],
            json!("11111111111111111111111111111111")
        );
    }

    #[test]
    fn test_length_mismatch_for_every_wrong_width() {
        let wrong: Vec<FilterValue> = vec![
            2u16.into(),
            3u32.into(),
            4u64.into(),
            5u128.into(),
            Vec::<u8>::new().into(),
            vec![1u8, 2].into(),
        ];
        for value in wrong {
            let actual = value.to_bytes().len();
            let err = compile_filters(&Where::new().eq("isSigner", value), &Selection::All, &layout(), &[])
                .unwrap_err();
            assert!(matches!(
                err,
                QueryError::LengthMismatch { ref field, expected: 1, actual: a } if field == "isSigner" && a == actual
            ));
        }
    }

    #[test]
    fn test_literals_sorted_by_offset_and_predicates_split() {
        let conditions = Where::new()
            .eq("isWritable", 1u8)
            .matches("isSigner", |v, _| v == &json!(1))
            .eq("isSigner", 0u8)
            .matches("pubkey", |_, _| true);
        let compiled = compile_filters(&conditions, &Selection::All, &layout(), &[]).unwrap();

        let offsets: Vec<usize> = compiled.byte_literals().map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![32, 33]);
        let fields: Vec<&str> = compiled.predicates().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["pubkey"]);

        let conditions = Where::new()
            .eq("isWritable", 1u8)
            .matches("isSigner", |v, _| v == &json!(1))
            .matches("pubkey", |_, _| true);
        let compiled = compile_filters(&conditions, &Selection::All, &layout(), &[]).unwrap();
        let offsets: Vec<usize> = compiled.byte_literals().map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![33]);
        let fields: Vec<&str> = compiled.predicates().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["isSigner", "pubkey"]);

        let conditions = Where::new().eq("isWritable", 1u8).eq("isSigner", 0u8);
        let compiled = compile_filters(&conditions, &Selection::All, &layout(), &[]).unwrap();
        let offsets: Vec<usize> = compiled.byte_literals().map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![32, 33]);
    }

    #[test]
    fn test_projection_spans() {
        let layout = layout();

        let none = compile_filters(&Where::new(), &Selection::Nothing, &layout, &[]).unwrap();
        assert_eq!(none.projection, Some(ProjectionSpan { offset: 0, length: 0 }));
        let payload = rpc_payload("123", Commitment::Confirmed, &none);
        assert_eq!(payload["params"][1]["dataSlice"], json!({ "offset": 0, "length": 0 }));

        let one = Selection::Fields(vec!["isWritable".to_string()]);
        let compiled = compile_filters(&Where::new(), &one, &layout, &[]).unwrap();
        assert_eq!(compiled.projection, Some(ProjectionSpan { offset: 33, length: 1 }));

        // The gap between non-adjacent fields is included in the span
        let gap = Selection::Fields(vec!["isWritable".to_string(), "pubkey".to_string()]);
        let compiled = compile_filters(&Where::new(), &gap, &layout, &[]).unwrap();
        assert_eq!(compiled.projection, Some(ProjectionSpan { offset: 0, length: 34 }));

        let empty = compile_filters(&Where::new(), &Selection::Fields(vec![]), &layout, &[]).unwrap();
        assert_eq!(empty.projection, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let layout = layout();
        assert!(matches!(
            compile_filters(&Where::new().eq("owner", 1u8), &Selection::All, &layout, &[]),
            Err(QueryError::UnknownField { ref field, .. }) if field == "owner"
        ));
        assert!(matches!(
            compile_filters(&Where::new(), &Selection::Fields(vec!["owner".into()]), &layout, &[]),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_discriminator_leads_filters() {
        let schema = Schema::new()
            .with_struct("Flag", [("on", FieldType::BOOL)])
            .with_discriminator("Flag", vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let layout = compute_layout("Flag", &schema).unwrap();

        let compiled = compile_filters(
            &Where::new().eq("on", true),
            &Selection::All,
            &layout,
            schema.discriminator("Flag"),
        )
        .unwrap();
        let payload = rpc_payload("prog", Commitment::Finalized, &compiled);

        assert_eq!(
            payload["params"][1]["filters"],
            json!([
                { "memcmp": { "offset": 0, "bytes": bs58::encode([1u8, 2, 3, 4, 5, 6, 7, 8]).into_string() } },
                { "memcmp": { "offset": 8, "bytes": bs58::encode([1u8]).into_string() } },
                { "dataSize": 9 }
            ])
        );
    }
}
