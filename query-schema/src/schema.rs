//! Record schemas: named structs and enums built from typed fields

use crate::error::SchemaError;
use crate::types::{IdlSerialization, IdlSpec, IdlType, IdlTypeArrayElement, IdlTypeDefKind};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    U8,
    I8,
    Bool,
    U16,
    I16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
    U128,
    I128,
    Pubkey,
}

impl PrimitiveType {
    /// Serialized width in bytes.
    pub fn width(self) -> usize {
        match self {
            PrimitiveType::U8 | PrimitiveType::I8 | PrimitiveType::Bool => 1,
            PrimitiveType::U16 | PrimitiveType::I16 => 2,
            PrimitiveType::U32 | PrimitiveType::I32 | PrimitiveType::F32 => 4,
            PrimitiveType::U64 | PrimitiveType::I64 | PrimitiveType::F64 => 8,
            PrimitiveType::U128 | PrimitiveType::I128 => 16,
            PrimitiveType::Pubkey => 32,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "u8" => PrimitiveType::U8,
            "i8" => PrimitiveType::I8,
            "bool" => PrimitiveType::Bool,
            "u16" => PrimitiveType::U16,
            "i16" => PrimitiveType::I16,
            "u32" => PrimitiveType::U32,
            "i32" => PrimitiveType::I32,
            "f32" => PrimitiveType::F32,
            "u64" => PrimitiveType::U64,
            "i64" => PrimitiveType::I64,
            "f64" => PrimitiveType::F64,
            "u128" => PrimitiveType::U128,
            "i128" => PrimitiveType::I128,
            "pubkey" | "publicKey" | "Pubkey" => PrimitiveType::Pubkey,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::U8 => "u8",
            PrimitiveType::I8 => "i8",
            PrimitiveType::Bool => "bool",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I16 => "i16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::I32 => "i32",
            PrimitiveType::F32 => "f32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::I64 => "i64",
            PrimitiveType::F64 => "f64",
            PrimitiveType::U128 => "u128",
            PrimitiveType::I128 => "i128",
            PrimitiveType::Pubkey => "pubkey",
        }
    }
}

/// The type of a single field.
///
/// `Option`, `Vec`, `String`, `Bytes` and `Map` are variable-length in Borsh
/// and cannot be given a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Array { elem: Box<FieldType>, len: usize },
    Defined(String),
    Option(Box<FieldType>),
    Vec(Box<FieldType>),
    String,
    Bytes,
    Map(Box<FieldType>, Box<FieldType>),
}

impl FieldType {
    pub const U8: FieldType = FieldType::Primitive(PrimitiveType::U8);
    pub const I8: FieldType = FieldType::Primitive(PrimitiveType::I8);
    pub const BOOL: FieldType = FieldType::Primitive(PrimitiveType::Bool);
    pub const U16: FieldType = FieldType::Primitive(PrimitiveType::U16);
    pub const I16: FieldType = FieldType::Primitive(PrimitiveType::I16);
    pub const U32: FieldType = FieldType::Primitive(PrimitiveType::U32);
    pub const I32: FieldType = FieldType::Primitive(PrimitiveType::I32);
    pub const U64: FieldType = FieldType::Primitive(PrimitiveType::U64);
    pub const I64: FieldType = FieldType::Primitive(PrimitiveType::I64);
    pub const U128: FieldType = FieldType::Primitive(PrimitiveType::U128);
    pub const PUBKEY: FieldType = FieldType::Primitive(PrimitiveType::Pubkey);

    pub fn array(elem: FieldType, len: usize) -> Self {
        FieldType::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn defined(name: impl Into<String>) -> Self {
        FieldType::Defined(name.into())
    }

    pub fn option(inner: FieldType) -> Self {
        FieldType::Option(Box::new(inner))
    }

    pub fn vec(inner: FieldType) -> Self {
        FieldType::Vec(Box::new(inner))
    }
}

impl From<PrimitiveType> for FieldType {
    fn from(p: PrimitiveType) -> Self {
        FieldType::Primitive(p)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => f.write_str(p.name()),
            FieldType::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            FieldType::Defined(name) => f.write_str(name),
            FieldType::Option(inner) => write!(f, "Option<{}>", inner),
            FieldType::Vec(inner) => write!(f, "Vec<{}>", inner),
            FieldType::String => f.write_str("string"),
            FieldType::Bytes => f.write_str("bytes"),
            FieldType::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub has_fields: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    Struct(Vec<Field>),
    Enum(Vec<EnumVariant>),
}

/// A set of named type definitions. Records are the struct definitions that
/// accounts deserialize into; they may carry a discriminator prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    types: HashMap<String, TypeDef>,
    discriminators: HashMap<String, Vec<u8>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_struct<N, I>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, FieldType)>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| Field {
                name: name.into(),
                ty,
            })
            .collect();
        self.types.insert(name.into(), TypeDef::Struct(fields));
        self
    }

    /// Adds a unit-only enum, serialized as a one-byte variant index.
    pub fn with_enum<N, I>(mut self, name: impl Into<String>, variants: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = N>,
    {
        let variants = variants
            .into_iter()
            .map(|name| EnumVariant {
                name: name.into(),
                has_fields: false,
            })
            .collect();
        self.types.insert(name.into(), TypeDef::Enum(variants));
        self
    }

    pub fn with_discriminator(mut self, record: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.discriminators.insert(record.into(), bytes.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn fields(&self, record: &str) -> Option<&[Field]> {
        match self.types.get(record)? {
            TypeDef::Struct(fields) => Some(fields),
            TypeDef::Enum(_) => None,
        }
    }

    /// Discriminator prefix of `record`, empty when it has none.
    pub fn discriminator(&self, record: &str) -> &[u8] {
        self.discriminators
            .get(record)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Builds a schema from every account and type of an IDL.
    ///
    /// Accounts get their discriminator (explicit or Anchor-derived) as a
    /// record prefix.
    pub fn from_idl(idl: &IdlSpec) -> Result<Self, SchemaError> {
        let mut schema = Schema::new();

        for ty in &idl.types {
            if matches!(
                ty.serialization,
                Some(IdlSerialization::Bytemuck) | Some(IdlSerialization::BytemuckUnsafe)
            ) {
                tracing::warn!(
                    "Type {} uses zero-copy serialization; alignment padding is not modeled",
                    ty.name
                );
            }
            let def = convert_type_def(&ty.name, &ty.type_def)?;
            schema.types.insert(ty.name.clone(), def);
        }

        for account in &idl.accounts {
            match &account.type_def {
                Some(kind) => {
                    let def = convert_type_def(&account.name, kind)?;
                    schema.types.insert(account.name.clone(), def);
                }
                None if schema.types.contains_key(&account.name) => {}
                None => {
                    return Err(SchemaError::MissingDefinition {
                        account: account.name.clone(),
                    })
                }
            }
            schema
                .discriminators
                .insert(account.name.clone(), account.get_discriminator());
        }

        tracing::debug!(
            "Loaded schema for {} with {} types",
            idl.get_name(),
            schema.types.len()
        );

        Ok(schema)
    }
}

fn convert_type_def(owner: &str, kind: &IdlTypeDefKind) -> Result<TypeDef, SchemaError> {
    Ok(match kind {
        IdlTypeDefKind::Struct { fields, .. } => TypeDef::Struct(
            fields
                .iter()
                .map(|f| {
                    Ok(Field {
                        name: f.name.clone(),
                        ty: convert_type(owner, &f.type_)?,
                    })
                })
                .collect::<Result<_, SchemaError>>()?,
        ),
        IdlTypeDefKind::TupleStruct { fields, .. } => TypeDef::Struct(
            fields
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    Ok(Field {
                        name: i.to_string(),
                        ty: convert_type(owner, ty)?,
                    })
                })
                .collect::<Result<_, SchemaError>>()?,
        ),
        IdlTypeDefKind::Enum { variants, .. } => TypeDef::Enum(
            variants
                .iter()
                .map(|v| EnumVariant {
                    name: v.name.clone(),
                    has_fields: v.fields.is_some(),
                })
                .collect(),
        ),
    })
}

fn convert_type(owner: &str, ty: &IdlType) -> Result<FieldType, SchemaError> {
    let unsupported = |ty: String| SchemaError::UnsupportedType {
        owner: owner.to_string(),
        ty,
    };

    Ok(match ty {
        IdlType::Simple(name) => match name.as_str() {
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            other => PrimitiveType::parse(other)
                .map(FieldType::Primitive)
                .ok_or_else(|| unsupported(other.to_string()))?,
        },
        IdlType::Array(array) => match array.array.as_slice() {
            [IdlTypeArrayElement::Nested(elem), IdlTypeArrayElement::Size(len)] => {
                FieldType::array(convert_type(owner, elem)?, *len as usize)
            }
            _ => return Err(unsupported(format!("{:?}", array.array))),
        },
        IdlType::Option(opt) => FieldType::option(convert_type(owner, &opt.option)?),
        IdlType::Vec(vec) => FieldType::vec(convert_type(owner, &vec.vec)?),
        IdlType::HashMap(map) => FieldType::Map(
            Box::new(convert_type(owner, &map.hash_map.0)?),
            Box::new(convert_type(owner, &map.hash_map.1)?),
        ),
        IdlType::Defined(defined) => FieldType::defined(defined.defined.name()),
    })
}
