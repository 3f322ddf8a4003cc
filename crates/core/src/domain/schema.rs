// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool input schema as a tagged AST, with a shared decode routine and a
//! pure strict-mode rewrite (spec §4.5.4, §9 design note on dynamic
//! schemas). Deliberately not a JSON-Schema engine: the set of shapes a
//! tool input needs is small and static, so a dynamic validator is more
//! machinery than the problem calls for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Literal {
        value: Value,
    },
    /// Wraps an inner schema, making `null` an additional valid value.
    NullOr {
        inner: Box<Schema>,
    },
    Array {
        items: Box<Schema>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Struct {
        fields: BTreeMap<String, Schema>,
        #[serde(default)]
        required: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaDecodeError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("field '{path}' expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },
}

impl Schema {
    /// Decode a JSON value against this schema, per the shared decode
    /// routine named in the design note. Used by the Tool Invoker's
    /// validation step (spec §4.4 step 3).
    pub fn decode(&self, value: &Value) -> Result<(), SchemaDecodeError> {
        self.decode_at("$", value)
    }

    fn decode_at(&self, path: &str, value: &Value) -> Result<(), SchemaDecodeError> {
        match self {
            Schema::String { .. } => expect(path, value, value.is_string(), "string"),
            Schema::Number { .. } => expect(path, value, value.is_number(), "number"),
            Schema::Boolean { .. } => expect(path, value, value.is_boolean(), "boolean"),
            Schema::Literal { value: expected } => {
                if value == expected {
                    Ok(())
                } else {
                    Err(SchemaDecodeError::TypeMismatch {
                        path: path.to_string(),
                        expected: "literal",
                        actual: value.to_string(),
                    })
                }
            }
            Schema::NullOr { inner } => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.decode_at(path, value)
                }
            }
            Schema::Array { items, .. } => match value.as_array() {
                Some(arr) => {
                    for (i, item) in arr.iter().enumerate() {
                        items.decode_at(&format!("{path}[{i}]"), item)?;
                    }
                    Ok(())
                }
                None => expect(path, value, false, "array"),
            },
            Schema::Struct {
                fields, required, ..
            } => {
                let obj = match value.as_object() {
                    Some(obj) => obj,
                    None => return expect(path, value, false, "object"),
                };
                for name in required {
                    if !obj.contains_key(name) {
                        return Err(SchemaDecodeError::MissingField(name.clone()));
                    }
                }
                for (name, field_schema) in fields {
                    if let Some(field_value) = obj.get(name) {
                        field_schema.decode_at(&format!("{path}.{name}"), field_value)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Strict-mode rewrite (spec §4.5.4): every declared property becomes
    /// required-but-nullable, so providers that insist every property
    /// appear in `required` still see a schema they accept. Pure AST
    /// transform — the invoker side treats a decoded `null` as "absent".
    pub fn to_strict(&self) -> Schema {
        match self {
            Schema::Struct {
                fields,
                description,
                ..
            } => {
                let rewritten: BTreeMap<String, Schema> = fields
                    .iter()
                    .map(|(name, schema)| (name.clone(), schema.clone().nullable()))
                    .collect();
                let required = rewritten.keys().cloned().collect();
                Schema::Struct {
                    fields: rewritten,
                    required,
                    description: description.clone(),
                }
            }
            other => other.clone(),
        }
    }

    fn nullable(self) -> Schema {
        match self {
            Schema::NullOr { .. } => self,
            other => Schema::NullOr {
                inner: Box::new(other),
            },
        }
    }

    /// Collects description text from this schema and, for `Struct`,
    /// every field's description — used by capability inference's
    /// `external` rule (spec §4.1 rule 3), which scans descriptions for
    /// endpoint/remote-API language.
    pub fn collect_descriptions<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Schema::String { description }
            | Schema::Number { description }
            | Schema::Boolean { description }
            | Schema::Array { description, .. } => {
                if let Some(d) = description {
                    out.push(d);
                }
            }
            Schema::Struct {
                fields,
                description,
                ..
            } => {
                if let Some(d) = description {
                    out.push(d);
                }
                for field in fields.values() {
                    field.collect_descriptions(out);
                }
            }
            Schema::NullOr { inner } => inner.collect_descriptions(out),
            Schema::Literal { .. } => {}
        }
    }
}

fn expect(
    path: &str,
    value: &Value,
    ok: bool,
    expected: &'static str,
) -> Result<(), SchemaDecodeError> {
    if ok {
        Ok(())
    } else {
        Err(SchemaDecodeError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual: type_name(value),
        })
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}
