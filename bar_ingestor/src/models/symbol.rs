//! Ticker symbol validation.
//!
//! Symbols are opaque provider identifiers ("QQQ", "^GSPC", "BRK-B"), but they
//! also become part of a file name and a URL path segment, so a few shapes are
//! rejected up front.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("symbol is empty")]
    Empty,

    #[error("symbol {0:?} has leading or trailing whitespace")]
    Whitespace(String),

    #[error("symbol {0:?} contains a path separator")]
    PathSeparator(String),
}

/// Checks that `symbol` is usable both as a request parameter and a file-name stem.
pub fn validate_symbol(symbol: &str) -> Result<(), SymbolError> {
    if symbol.trim().is_empty() {
        return Err(SymbolError::Empty);
    }
    if symbol.trim() != symbol {
        return Err(SymbolError::Whitespace(symbol.to_string()));
    }
    if symbol.contains(['/', '\\']) || symbol == "." || symbol == ".." {
        return Err(SymbolError::PathSeparator(symbol.to_string()));
    }
    Ok(())
}
