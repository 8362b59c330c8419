//! Schema-driven Borsh decoding into JSON field maps
//!
//! Decoding is "unchecked": bytes left over after the last field are ignored,
//! so a zero-padded buffer decodes the same as an exact one.

use crate::error::DecodeError;
use crate::schema::{FieldType, PrimitiveType, Schema, TypeDef};
use borsh::BorshDeserialize;
use serde_json::{json, Map, Value};
use solana_pubkey::Pubkey;

/// Upper bound on preallocation for length-prefixed collections.
const MAX_PREALLOC: usize = 4096;

/// Decodes `bytes` as `record`, skipping its discriminator prefix.
pub fn decode_record(
    schema: &Schema,
    record: &str,
    bytes: &[u8],
) -> Result<Map<String, Value>, DecodeError> {
    let fields = schema.fields(record).ok_or_else(|| DecodeError::UnknownRecord {
        name: record.to_string(),
    })?;

    let header = schema.discriminator(record).len();
    let mut buf = bytes.get(header..).ok_or_else(|| DecodeError::Borsh {
        path: "$discriminator".to_string(),
        message: format!("expected {} bytes, found {}", header, bytes.len()),
    })?;

    let mut out = Map::new();
    for field in fields {
        let value = decode_value(&field.ty, schema, &mut buf).map_err(|e| e.at(&field.name))?;
        out.insert(field.name.clone(), value);
    }
    Ok(out)
}

fn read<T: BorshDeserialize>(buf: &mut &[u8]) -> Result<T, DecodeError> {
    T::deserialize(buf).map_err(|e| DecodeError::Borsh {
        path: String::new(),
        message: e.to_string(),
    })
}

fn read_len(buf: &mut &[u8]) -> Result<usize, DecodeError> {
    Ok(read::<u32>(buf)? as usize)
}

fn float(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn decode_primitive(p: PrimitiveType, buf: &mut &[u8]) -> Result<Value, DecodeError> {
    Ok(match p {
        PrimitiveType::U8 => json!(read::<u8>(buf)?),
        PrimitiveType::I8 => json!(read::<i8>(buf)?),
        PrimitiveType::Bool => json!(read::<u8>(buf)? != 0),
        PrimitiveType::U16 => json!(read::<u16>(buf)?),
        PrimitiveType::I16 => json!(read::<i16>(buf)?),
        PrimitiveType::U32 => json!(read::<u32>(buf)?),
        PrimitiveType::I32 => json!(read::<i32>(buf)?),
        PrimitiveType::F32 => float(f32::from_bits(read::<u32>(buf)?) as f64),
        PrimitiveType::U64 => json!(read::<u64>(buf)?),
        PrimitiveType::I64 => json!(read::<i64>(buf)?),
        PrimitiveType::F64 => float(f64::from_bits(read::<u64>(buf)?)),
        PrimitiveType::U128 => json!(read::<u128>(buf)?.to_string()),
        PrimitiveType::I128 => json!(read::<i128>(buf)?.to_string()),
        PrimitiveType::Pubkey => {
            json!(Pubkey::new_from_array(read::<[u8; 32]>(buf)?).to_string())
        }
    })
}

fn decode_value(ty: &FieldType, schema: &Schema, buf: &mut &[u8]) -> Result<Value, DecodeError> {
    match ty {
        FieldType::Primitive(p) => decode_primitive(*p, buf),
        FieldType::Array { elem, len } => {
            let mut items = Vec::with_capacity((*len).min(MAX_PREALLOC));
            for i in 0..*len {
                items.push(decode_value(elem, schema, buf).map_err(|e| e.at(&i.to_string()))?);
            }
            Ok(Value::Array(items))
        }
        FieldType::Vec(elem) => {
            let len = read_len(buf)?;
            let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
            for i in 0..len {
                items.push(decode_value(elem, schema, buf).map_err(|e| e.at(&i.to_string()))?);
            }
            Ok(Value::Array(items))
        }
        FieldType::Option(inner) => match read::<u8>(buf)? {
            0 => Ok(Value::Null),
            _ => decode_value(inner, schema, buf),
        },
        FieldType::String => Ok(Value::String(read::<String>(buf)?)),
        FieldType::Bytes => Ok(json!(read::<Vec<u8>>(buf)?)),
        FieldType::Map(key, value) => {
            let len = read_len(buf)?;
            let mut out = Map::new();
            for _ in 0..len {
                let k = match decode_value(key, schema, buf)? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let v = decode_value(value, schema, buf).map_err(|e| e.at(&k))?;
                out.insert(k, v);
            }
            Ok(Value::Object(out))
        }
        FieldType::Defined(name) => match schema.get(name) {
            None => Err(DecodeError::Unsupported {
                path: String::new(),
                ty: name.clone(),
            }),
            Some(TypeDef::Struct(fields)) => {
                let mut out = Map::new();
                for field in fields {
                    let value =
                        decode_value(&field.ty, schema, buf).map_err(|e| e.at(&field.name))?;
                    out.insert(field.name.clone(), value);
                }
                Ok(Value::Object(out))
            }
            Some(TypeDef::Enum(variants)) => {
                let index = read::<u8>(buf)? as usize;
                match variants.get(index) {
                    Some(variant) if !variant.has_fields => Ok(json!(variant.name)),
                    Some(variant) => Err(DecodeError::Unsupported {
                        path: String::new(),
                        ty: format!("{}::{}", name, variant.name),
                    }),
                    None => Err(DecodeError::Borsh {
                        path: String::new(),
                        message: format!("variant index {} out of range for {}", index, name),
                    }),
                }
            }
        },
    }
}
