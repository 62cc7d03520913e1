//! Predicate (field schema) types.
//!
//! Space-Track describes each request class through its modeldef endpoint,
//! which returns MySQL-style column descriptions:
//!
//! ```json
//! {"controller": "basicspacedata", "data": [
//!     {"Field": "NORAD_CAT_ID", "Type": "int(10) unsigned", "Null": "NO",
//!      "Key": "", "Default": "0", "Extra": ""}
//! ]}
//! ```

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateType {
    Int,
    Float,
    Str,
    Date,
    DateTime,
    Enum,
}

impl PredicateType {
    /// Map a MySQL column type name to a predicate type.
    fn from_sql(type_name: &str) -> Option<Self> {
        let ty = match type_name {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                PredicateType::Int
            }
            "float" | "double" | "decimal" => PredicateType::Float,
            "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" => {
                PredicateType::Str
            }
            "date" => PredicateType::Date,
            "datetime" | "timestamp" => PredicateType::DateTime,
            "enum" => PredicateType::Enum,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredicateType::Int => "int",
            PredicateType::Float => "float",
            PredicateType::Str => "str",
            PredicateType::Date => "date",
            PredicateType::DateTime => "datetime",
            PredicateType::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// One field descriptor of a request class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Lower-cased field name, as used in query URLs
    pub name: String,
    /// Value type
    pub predicate_type: PredicateType,
    /// Whether the column accepts null
    pub nullable: bool,
    /// Column default, if any
    pub default: Option<String>,
    /// Allowed values for `enum` columns
    #[serde(default)]
    pub enum_values: Vec<String>,
}

/// Modeldef endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelDefResponse {
    pub data: Vec<ModelDefField>,
}

/// Raw column description from the modeldef endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelDefField {
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(rename = "Type")]
    pub sql_type: String,
    #[serde(rename = "Null", default)]
    pub null: String,
    #[serde(rename = "Default", default)]
    pub default: Option<serde_json::Value>,
}

impl ModelDefField {
    /// Convert into a [`Predicate`].
    pub(crate) fn into_predicate(self) -> Result<Predicate> {
        let full_type = self.sql_type.trim().to_ascii_lowercase();
        let type_name: String = full_type
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        let predicate_type = PredicateType::from_sql(&type_name).ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "Couldn't parse field type '{}' of '{}'",
                self.sql_type, self.field
            ))
        })?;

        let enum_values = if predicate_type == PredicateType::Enum {
            parse_enum_values(&self.sql_type)
        } else {
            Vec::new()
        };

        let default = self.default.and_then(|v| match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(Predicate {
            name: self.field.to_lowercase(),
            predicate_type,
            nullable: self.null.eq_ignore_ascii_case("YES"),
            default,
            enum_values,
        })
    }
}

/// Extract quoted values from `enum('a','b')`, preserving their case.
fn parse_enum_values(full_type: &str) -> Vec<String> {
    full_type
        .split('\'')
        .skip(1)
        .step_by(2)
        .map(String::from)
        .collect()
}

/// Parse a modeldef `data` array into predicates.
pub(crate) fn parse_predicates(fields: Vec<ModelDefField>) -> Result<Vec<Predicate>> {
    fields.into_iter().map(ModelDefField::into_predicate).collect()
}
