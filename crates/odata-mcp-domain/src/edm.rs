//! EDM (Entity Data Model) primitive types and their JSON-Schema projection.

use serde::{Deserialize, Serialize};

/// A recognized EDM primitive type. Unrecognized type names are kept verbatim
/// in [`EdmType::Other`] rather than failing the parse — metadata from
/// services with vendor-specific scalar types must still produce a usable
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdmType {
    String,
    Boolean,
    Guid,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Double,
    Single,
    DateTime,
    DateTimeOffset,
    Time,
    Binary,
    /// A named type not recognized above (e.g. `Edm.Stream`, a complex type name).
    Other(String),
}

impl EdmType {
    /// Parse the `Type` attribute of a CSDL `Property`/`Parameter` element,
    /// stripping an `Edm.` namespace prefix when present.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let unqualified = raw.strip_prefix("Edm.").unwrap_or(raw);
        match unqualified {
            "String" => Self::String,
            "Boolean" => Self::Boolean,
            "Guid" => Self::Guid,
            "Byte" => Self::Byte,
            "SByte" => Self::SByte,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Decimal" => Self::Decimal,
            "Double" => Self::Double,
            "Single" | "Float" => Self::Single,
            "DateTime" => Self::DateTime,
            "DateTimeOffset" => Self::DateTimeOffset,
            "Time" => Self::Time,
            "Binary" => Self::Binary,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether this is a numeric EDM type (for the SAP numeric-stringification
    /// quirk and for JSON-Schema `"type": "integer" | "number"` mapping).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Decimal
                | Self::Double
                | Self::Single
        )
    }

    /// Whether this is an integral (no fractional part) numeric EDM type.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    /// The JSON-Schema `"type"` keyword value this EDM type should be exposed as
    /// in a synthesized tool's `inputSchema`.
    #[must_use]
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            _ if self.is_integer() => "integer",
            _ if self.is_numeric() => "number",
            _ => "string",
        }
    }

    /// Optional JSON-Schema `"format"` hint, matching common conventions.
    #[must_use]
    pub fn json_schema_format(&self) -> Option<&'static str> {
        match self {
            Self::Guid => Some("uuid"),
            Self::DateTime | Self::DateTimeOffset => Some("date-time"),
            Self::Binary => Some("byte"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_edm_namespace_prefix() {
        assert_eq!(EdmType::parse("Edm.Int32"), EdmType::Int32);
        assert_eq!(EdmType::parse("Int32"), EdmType::Int32);
    }

    #[test]
    fn unknown_types_are_preserved() {
        assert_eq!(
            EdmType::parse("Edm.Stream"),
            EdmType::Other("Stream".to_owned())
        );
    }

    #[test]
    fn numeric_classification() {
        assert!(EdmType::Int32.is_numeric());
        assert!(EdmType::Int32.is_integer());
        assert!(EdmType::Decimal.is_numeric());
        assert!(!EdmType::Decimal.is_integer());
        assert!(!EdmType::String.is_numeric());
    }

    #[test]
    fn json_schema_type_mapping() {
        assert_eq!(EdmType::Int64.json_schema_type(), "integer");
        assert_eq!(EdmType::Double.json_schema_type(), "number");
        assert_eq!(EdmType::Boolean.json_schema_type(), "boolean");
        assert_eq!(EdmType::Guid.json_schema_type(), "string");
        assert_eq!(EdmType::Guid.json_schema_format(), Some("uuid"));
    }
}
