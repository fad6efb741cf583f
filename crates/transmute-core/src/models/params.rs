use crate::error::AppError;
use std::collections::BTreeMap;

/// Raw string parameters as submitted with a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values are trimmed; a blank value is treated as absent.
    pub fn insert(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        let name = name.into();
        if value.is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, value.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build parameters from a JSON object body. Scalars are stringified; nested values
    /// are rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let object = match value {
            serde_json::Value::Object(object) => object,
            other => {
                return Err(AppError::ValidationFailure(format!(
                    "Request body must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let mut params = Params::new();
        for (name, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => params.insert(name, s),
                serde_json::Value::Number(n) => params.insert(name, n.to_string()),
                serde_json::Value::Bool(b) => params.insert(name, b.to_string()),
                other => {
                    return Err(AppError::ValidationFailure(format!(
                        "Parameter '{}' must be a scalar, got {}",
                        name,
                        json_type_name(&other)
                    )))
                }
            }
        }
        Ok(params)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    Number(f64),
    Text(String),
}

/// Parameters after contract validation, typed and with defaults applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams(BTreeMap<&'static str, ParamValue>);

impl ResolvedParams {
    pub(crate) fn insert(&mut self, name: &'static str, value: ParamValue) {
        self.0.insert(name, value);
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ParamValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(ParamValue::Number(v)) => Some(*v),
            Some(ParamValue::Integer(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParamValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn require_integer(&self, name: &str) -> Result<i64, AppError> {
        self.integer(name).ok_or_else(|| missing(name))
    }

    pub fn require_number(&self, name: &str) -> Result<f64, AppError> {
        self.number(name).ok_or_else(|| missing(name))
    }

    pub fn require_text(&self, name: &str) -> Result<&str, AppError> {
        self.text(name).ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> AppError {
    AppError::ValidationFailure(format!("Missing required parameter '{}'", name))
}
