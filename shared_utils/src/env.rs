use std::env::{self, VarError};

use thiserror::Error;

/// An environment variable is set but cannot be used.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// The value is not valid unicode.
    #[error("Environment variable {0} is not valid unicode")]
    NotUnicode(String),
}

/// Reads an optional environment variable.
///
/// Unset and blank values both map to `Ok(None)`, so an operator can clear an
/// override with `VAR=` instead of unsetting it. Surrounding whitespace is
/// trimmed.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn optional_env_var(name: &str) -> Result<Option<String>, EnvVarError> {
    match env::var(name) {
        Ok(value) => {
            let value = value.trim();
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(EnvVarError::NotUnicode(name.to_string())),
    }
}
