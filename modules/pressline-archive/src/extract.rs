// Typed field access over loosely-typed vendor JSON.
//
// Items are pulled out of a page with JSON pointers. A missing or mistyped
// required field becomes an ExtractError naming the field, which the caller
// logs and skips; it never takes the page down with it.

use serde_json::Value;

/// A required field was absent or had the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("missing field {field}")]
    Missing { field: String },

    #[error("field {field} is not {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

impl ExtractError {
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field } | Self::WrongType { field, .. } => field,
        }
    }
}

/// A view into one JSON node that remembers where it came from, for error messages.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Fields<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    fn full(&self, pointer: &str) -> String {
        format!("{}{}", self.path, pointer)
    }

    fn lookup(&self, pointer: &str) -> Option<&'a Value> {
        self.value.pointer(pointer).filter(|v| !v.is_null())
    }

    pub fn has(&self, pointer: &str) -> bool {
        self.lookup(pointer).is_some()
    }

    /// Descend into a required node.
    pub fn at(&self, pointer: &str) -> Result<Fields<'a>, ExtractError> {
        let value = self.lookup(pointer).ok_or_else(|| ExtractError::Missing {
            field: self.full(pointer),
        })?;
        Ok(Fields {
            value,
            path: self.full(pointer),
        })
    }

    /// Descend into an optional node.
    pub fn opt(&self, pointer: &str) -> Option<Fields<'a>> {
        self.lookup(pointer).map(|value| Fields {
            value,
            path: self.full(pointer),
        })
    }

    pub fn str(&self, pointer: &str) -> Result<&'a str, ExtractError> {
        self.at(pointer)?
            .value
            .as_str()
            .ok_or_else(|| ExtractError::WrongType {
                field: self.full(pointer),
                expected: "a string",
            })
    }

    pub fn opt_str(&self, pointer: &str) -> Option<&'a str> {
        self.lookup(pointer).and_then(Value::as_str)
    }

    pub fn string(&self, pointer: &str) -> Result<String, ExtractError> {
        self.str(pointer).map(str::to_string)
    }

    /// Integer field. Numeric strings are accepted, since some APIs quote their counters.
    pub fn i64(&self, pointer: &str) -> Result<i64, ExtractError> {
        let value = self.at(pointer)?.value;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| ExtractError::WrongType {
                field: self.full(pointer),
                expected: "an integer",
            })
    }

    /// String or number, rendered as text.
    pub fn text(&self, pointer: &str) -> Result<String, ExtractError> {
        match self.at(pointer)?.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(ExtractError::WrongType {
                field: self.full(pointer),
                expected: "a string or number",
            }),
        }
    }

    pub fn opt_text(&self, pointer: &str) -> Option<String> {
        self.opt(pointer).and_then(|f| f.text("").ok())
    }

    /// Optional list of strings; non-string elements are dropped.
    pub fn opt_str_list(&self, pointer: &str) -> Option<Vec<String>> {
        self.lookup(pointer).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    /// Required array, yielding a `Fields` per element.
    pub fn array(&self, pointer: &str) -> Result<Vec<Fields<'a>>, ExtractError> {
        let base = self.full(pointer);
        let items = self
            .at(pointer)?
            .value
            .as_array()
            .ok_or_else(|| ExtractError::WrongType {
                field: base.clone(),
                expected: "an array",
            })?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Fields {
                value,
                path: format!("{base}/{i}"),
            })
            .collect())
    }
}
