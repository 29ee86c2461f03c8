//! Operation/parameter bags for the management control surface

use std::collections::HashMap;
use std::fmt;

/// A control request: an operation name plus free-form string parameters.
///
/// The address parameter, when present, is
/// `TYPE,opc,dpc[,sls[,spare]]` with point codes in `n-c-m` form.
#[derive(Debug, Clone, Default)]
pub struct ControlParams {
    operation: String,
    params: HashMap<String, String>,
}

impl ControlParams {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into(), params: HashMap::new() }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::trim) {
            Some("true") | Some("yes") | Some("on") | Some("enable") => true,
            Some("false") | Some("no") | Some("off") | Some("disable") => false,
            _ => default,
        }
    }

    /// Split the `address` parameter into its comma fields
    pub fn address_fields(&self) -> Option<Vec<&str>> {
        self.get("address").map(|a| a.split(',').map(str::trim).collect())
    }
}

impl fmt::Display for ControlParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        for (k, v) in &self.params {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}
