//! Byte layout resolution
//!
//! Every field of a record gets an offset equal to the running sum of the
//! lengths declared before it. Only fixed-size types can be placed; anything
//! variable-length makes every later offset unknowable, so it is an error.

use crate::error::LayoutError;
use crate::schema::{FieldType, Schema, TypeDef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub offset: usize,
    pub length: usize,
    pub ty: FieldType,
}

impl FieldLayout {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub record: String,
    /// Discriminator prefix length; field offsets start here.
    pub header_len: usize,
    pub total_len: usize,
    fields: Vec<(String, FieldLayout)>,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, layout)| layout)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldLayout)> {
        self.fields.iter().map(|(name, layout)| (name.as_str(), layout))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Serialized byte length of `ty`.
pub fn resolve_length(ty: &FieldType, schema: &Schema) -> Result<usize, LayoutError> {
    resolve(ty, schema, &mut Vec::new())
}

fn resolve(ty: &FieldType, schema: &Schema, visiting: &mut Vec<String>) -> Result<usize, LayoutError> {
    match ty {
        FieldType::Primitive(p) => Ok(p.width()),
        FieldType::Array { elem, len } => resolve(elem, schema, visiting)?
            .checked_mul(*len)
            .ok_or_else(|| LayoutError::Overflow { ty: ty.to_string() }),
        FieldType::Defined(name) => {
            if visiting.iter().any(|v| v == name) {
                return Err(LayoutError::Recursive { name: name.clone() });
            }
            match schema.get(name) {
                None => Err(LayoutError::UnknownType { name: name.clone() }),
                Some(TypeDef::Enum(variants)) => {
                    if variants.iter().any(|v| v.has_fields) {
                        Err(LayoutError::Unsized { ty: name.clone() })
                    } else {
                        Ok(1)
                    }
                }
                Some(TypeDef::Struct(fields)) => {
                    visiting.push(name.clone());
                    let mut total = 0usize;
                    for field in fields {
                        let length = resolve(&field.ty, schema, visiting)
                            .map_err(|e| e.in_field(name, &field.name))?;
                        total = total
                            .checked_add(length)
                            .ok_or_else(|| LayoutError::Overflow { ty: name.clone() })?;
                    }
                    visiting.pop();
                    Ok(total)
                }
            }
        }
        FieldType::Option(_)
        | FieldType::Vec(_)
        | FieldType::String
        | FieldType::Bytes
        | FieldType::Map(_, _) => Err(LayoutError::Unsized { ty: ty.to_string() }),
    }
}

/// Offsets and lengths of every field of `record`, in declaration order.
pub fn compute_layout(record: &str, schema: &Schema) -> Result<RecordLayout, LayoutError> {
    let fields = match schema.get(record) {
        Some(TypeDef::Struct(fields)) => fields,
        Some(TypeDef::Enum(_)) => {
            return Err(LayoutError::NotAStruct {
                name: record.to_string(),
            })
        }
        None => {
            return Err(LayoutError::UnknownType {
                name: record.to_string(),
            })
        }
    };

    let header_len = schema.discriminator(record).len();
    let mut offset = header_len;
    let mut laid_out = Vec::with_capacity(fields.len());
    let mut visiting = vec![record.to_string()];

    for field in fields {
        let length = resolve(&field.ty, schema, &mut visiting).map_err(|e| {
            tracing::debug!("Cannot size {}.{}: {}", record, field.name, e);
            e.in_field(record, &field.name)
        })?;
        laid_out.push((
            field.name.clone(),
            FieldLayout {
                offset,
                length,
                ty: field.ty.clone(),
            },
        ));
        offset = offset.checked_add(length).ok_or_else(|| LayoutError::Overflow {
            ty: record.to_string(),
        })?;
    }

    Ok(RecordLayout {
        record: record.to_string(),
        header_len,
        total_len: offset,
        fields: laid_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_meta() -> Schema {
        Schema::new().with_struct(
            "AccountMetaData",
            [
                ("pubkey", FieldType::PUBKEY),
                ("isSigner", FieldType::U8),
                ("isWritable", FieldType::U8),
            ],
        )
    }

    #[test]
    fn test_account_meta_layout() {
        let layout = compute_layout("AccountMetaData", &account_meta()).unwrap();

        assert_eq!(layout.total_len, 34);
        assert_eq!(layout.header_len, 0);
        assert_eq!(layout.field("pubkey").unwrap().offset, 0);
        assert_eq!(layout.field("pubkey").unwrap().length, 32);
        assert_eq!(layout.field("isSigner").unwrap().offset, 32);
        assert_eq!(layout.field("isWritable").unwrap().offset, 33);
        assert_eq!(
            layout.field_names(),
            vec!["pubkey", "isSigner", "isWritable"]
        );
    }

    #[test]
    fn test_offsets_increase_and_sum_to_total() {
        let schema = Schema::new()
            .with_struct("Inner", [("a", FieldType::U16), ("b", FieldType::PUBKEY)])
            .with_struct(
                "Outer",
                [
                    ("flag", FieldType::BOOL),
                    ("inner", FieldType::defined("Inner")),
                    ("ticks", FieldType::array(FieldType::I64, 3)),
                    ("amount", FieldType::U128),
                ],
            );

        let layout = compute_layout("Outer", &schema).unwrap();
        let mut expected_offset = 0;
        for (_, field) in layout.fields() {
            assert_eq!(field.offset, expected_offset);
            assert!(field.length > 0);
            expected_offset = field.end();
        }
        assert_eq!(layout.total_len, expected_offset);
        assert_eq!(layout.total_len, 1 + 34 + 24 + 16);

        assert_eq!(compute_layout("Outer", &schema).unwrap(), layout);
    }

    #[test]
    fn test_arrays_multiply_element_width() {
        let schema = Schema::new().with_struct("S", [("x", FieldType::U8)]);

        assert_eq!(resolve_length(&FieldType::array(FieldType::U8, 7), &schema), Ok(7));
        assert_eq!(resolve_length(&FieldType::array(FieldType::U64, 4), &schema), Ok(32));
        assert_eq!(
            resolve_length(
                &FieldType::array(FieldType::array(FieldType::defined("S"), 2), 3),
                &schema
            ),
            Ok(6)
        );
    }

    #[test]
    fn test_record_length_overflow_is_an_error() {
        let half = usize::MAX / 2 + 1;
        let schema = Schema::new().with_struct(
            "Huge",
            [
                ("a", FieldType::array(FieldType::U8, half)),
                ("b", FieldType::array(FieldType::U8, half)),
            ],
        );

        assert_eq!(
            compute_layout("Huge", &schema),
            Err(LayoutError::Overflow {
                ty: "Huge".to_string()
            })
        );
    }

    #[test]
    fn test_discriminator_shifts_offsets() {
        let schema = account_meta().with_discriminator("AccountMetaData", vec![7u8; 8]);
        let layout = compute_layout("AccountMetaData", &schema).unwrap();

        assert_eq!(layout.header_len, 8);
        assert_eq!(layout.field("pubkey").unwrap().offset, 8);
        assert_eq!(layout.total_len, 42);
    }

    #[test]
    fn test_unit_enum_is_one_byte() {
        let schema = Schema::new()
            .with_enum("Side", ["Bid", "Ask"])
            .with_struct("Order", [("side", FieldType::defined("Side")), ("qty", FieldType::U64)]);

        let layout = compute_layout("Order", &schema).unwrap();
        assert_eq!(layout.field("qty").unwrap().offset, 1);
        assert_eq!(layout.total_len, 9);
    }

    #[test]
    fn test_variable_length_field_fails() {
        let schema = Schema::new().with_struct(
            "Named",
            [("name", FieldType::String), ("owner", FieldType::PUBKEY)],
        );

        let err = compute_layout("Named", &schema).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &LayoutError::Unsized {
                ty: "string".to_string()
            }
        );
        assert_eq!(err.to_string(), "Named.name: type 'string' has no fixed byte length");
    }

    #[test]
    fn test_unknown_and_recursive_types_fail() {
        let schema = Schema::new()
            .with_struct("Node", [("next", FieldType::defined("Node"))])
            .with_struct("Dangling", [("x", FieldType::defined("Missing"))]);

        assert!(matches!(
            compute_layout("Node", &schema).unwrap_err().root_cause(),
            LayoutError::Recursive { name } if name == "Node"
        ));
        assert!(matches!(
            compute_layout("Dangling", &schema).unwrap_err().root_cause(),
            LayoutError::UnknownType { name } if name == "Missing"
        ));
        assert!(matches!(
            compute_layout("Nope", &schema),
            Err(LayoutError::UnknownType { .. })
        ));
    }
}
