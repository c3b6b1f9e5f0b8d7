// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Output schema descriptors
//!
//! A [`Shape`] describes the JSON value a scoring model must reply with. It is
//! rendered into the system prompt and used to validate replies. Record fields
//! keep their declaration order in both.

use serde_json::Value;
use std::fmt::Write;

/// Shape of a JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Text,
    /// A number, optionally bounded (inclusive)
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// A string from a closed set
    OneOf(Vec<String>),
    ListOf(Box<Shape>),
    /// An object with ordered, required fields. Unknown fields are tolerated.
    Record(Vec<FieldSpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub shape: Shape,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Shape {
    pub fn bounded(min: f64, max: f64) -> Self {
        Shape::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shape::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn list_of(item: Shape) -> Self {
        Shape::ListOf(Box::new(item))
    }

    /// Check `value` against this shape. Errors name the offending path.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), String> {
        match self {
            Shape::Text => {
                if !value.is_string() {
                    return Err(format!("{path}: expected a string, got {value}"));
                }
            }
            Shape::Number { min, max } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("{path}: expected a number, got {value}"))?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(format!("{path}: {n} is below the minimum {min}"));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(format!("{path}: {n} is above the maximum {max}"));
                    }
                }
            }
            Shape::OneOf(allowed) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{path}: expected a string, got {value}"))?;
                if !allowed.iter().any(|a| a == s) {
                    return Err(format!(
                        "{path}: '{s}' is not one of {}",
                        quoted_list(allowed)
                    ));
                }
            }
            Shape::ListOf(item) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("{path}: expected an array, got {value}"))?;
                for (i, v) in items.iter().enumerate() {
                    item.validate_at(v, &format!("{path}[{i}]"))?;
                }
            }
            Shape::Record(fields) => {
                let object = value
                    .as_object()
                    .ok_or_else(|| format!("{path}: expected an object, got {value}"))?;
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    let v = object
                        .get(&field.name)
                        .ok_or_else(|| format!("{field_path}: missing field"))?;
                    field.shape.validate_at(v, &field_path)?;
                }
            }
        }
        Ok(())
    }

    fn describe_into(&self, out: &mut String, indent: usize) {
        match self {
            Shape::Text => out.push_str("string"),
            Shape::Number { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    let _ = write!(out, "number between {min} and {max}");
                }
                (Some(min), None) => {
                    let _ = write!(out, "number >= {min}");
                }
                (None, Some(max)) => {
                    let _ = write!(out, "number <= {max}");
                }
                (None, None) => out.push_str("number"),
            },
            Shape::OneOf(allowed) => {
                let _ = write!(out, "one of {}", quoted_list(allowed));
            }
            Shape::ListOf(item) => {
                out.push_str("array, each item: ");
                item.describe_into(out, indent);
            }
            Shape::Record(fields) => {
                out.push_str("object with these fields, in this order:");
                for field in fields {
                    out.push('\n');
                    out.push_str(&"  ".repeat(indent + 1));
                    let _ = write!(out, "- \"{}\": ", field.name);
                    field.shape.describe_into(out, indent + 1);
                    if let Some(description) = &field.description {
                        let _ = write!(out, " ({description})");
                    }
                }
            }
        }
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Named root shape of a model reply
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub root: Shape,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, root: Shape) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self::new(name, Shape::Record(fields))
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.root.validate(value)
    }

    /// Human- and machine-readable format description for the system prompt
    pub fn describe(&self) -> String {
        let mut out = format!("Reply with a single JSON value ({}) of this shape: ", self.name);
        self.root.describe_into(&mut out, 0);
        out.push_str("\nDo not write anything outside the JSON value.");
        out
    }
}
