//! Error types for schema construction, layout resolution and decoding

use std::fmt;

/// Failure to size a type or compute a record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A `Defined` type name that the schema does not contain.
    UnknownType { name: String },
    /// The requested record exists but is not a struct.
    NotAStruct { name: String },
    /// A variable-length type (string, vec, option, map, data-carrying enum).
    Unsized { ty: String },
    /// A struct that contains itself without indirection.
    Recursive { name: String },
    /// Array dimensions that overflow `usize`.
    Overflow { ty: String },
    /// Wraps an error with the field it occurred in.
    Field {
        record: String,
        field: String,
        source: Box<LayoutError>,
    },
}

impl LayoutError {
    pub(crate) fn in_field(self, record: &str, field: &str) -> Self {
        LayoutError::Field {
            record: record.to_string(),
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping field context.
    pub fn root_cause(&self) -> &LayoutError {
        match self {
            LayoutError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::UnknownType { name } => write!(f, "unknown type '{}'", name),
            LayoutError::NotAStruct { name } => write!(f, "type '{}' is not a struct", name),
            LayoutError::Unsized { ty } => {
                write!(f, "type '{}' has no fixed byte length", ty)
            }
            LayoutError::Recursive { name } => {
                write!(f, "type '{}' contains itself", name)
            }
            LayoutError::Overflow { ty } => write!(f, "length of '{}' overflows", ty),
            LayoutError::Field {
                record,
                field,
                source,
            } => write!(f, "{}.{}: {}", record, field, source),
        }
    }
}

impl std::error::Error for LayoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LayoutError::Field { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Failure to decode account bytes against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownRecord { name: String },
    Borsh { path: String, message: String },
    Unsupported { path: String, ty: String },
}

impl DecodeError {
    pub(crate) fn at(self, segment: &str) -> Self {
        let join = |path: String| {
            if path.is_empty() {
                segment.to_string()
            } else {
                format!("{}.{}", segment, path)
            }
        };
        match self {
            DecodeError::Borsh { path, message } => DecodeError::Borsh {
                path: join(path),
                message,
            },
            DecodeError::Unsupported { path, ty } => DecodeError::Unsupported {
                path: join(path),
                ty,
            },
            other => other,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownRecord { name } => write!(f, "unknown record '{}'", name),
            DecodeError::Borsh { path, message } => {
                write!(f, "failed to decode '{}': {}", path, message)
            }
            DecodeError::Unsupported { path, ty } => {
                write!(f, "cannot decode '{}' of type '{}'", path, ty)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure to build a schema from an IDL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Read { path: String, source: String },
    Parse { source: String },
    UnsupportedType { owner: String, ty: String },
    MissingDefinition { account: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Read { path, source } => {
                write!(f, "Failed to read IDL file {}: {}", path, source)
            }
            SchemaError::Parse { source } => write!(f, "Failed to parse IDL JSON: {}", source),
            SchemaError::UnsupportedType { owner, ty } => {
                write!(f, "Unsupported type {} in {}", ty, owner)
            }
            SchemaError::MissingDefinition { account } => {
                write!(f, "Account {} has no type definition", account)
            }
        }
    }
}

impl std::error::Error for SchemaError {}
