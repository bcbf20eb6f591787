use thiserror::Error;

/// Common error types for the application.
#[derive(Error, Debug, PartialEq)]
pub enum CommonError {
    /// A currency code that is not exactly three ASCII letters.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// A conversion rate that is zero, negative or not finite.
    #[error("Invalid rate: {0}")]
    InvalidRate(f64),

    /// A quote that is structurally unusable (e.g. converts a currency into itself).
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    /// A cycle that cannot be evaluated (too short, or not closed).
    #[error("Invalid cycle: {0}")]
    InvalidCycle(String),

    /// Represents an error during wire decoding.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Represents an item not being found.
    #[error("Item not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_currency_display() {
        let err = CommonError::InvalidCurrency("US".to_string());
        assert_eq!(format!("{}", err), "Invalid currency code: US");
    }

    #[test]
    fn test_invalid_rate_display() {
        let err = CommonError::InvalidRate(-1.5);
        assert_eq!(format!("{}", err), "Invalid rate: -1.5");
    }

    #[test]
    fn test_parse_error_display() {
        let err = CommonError::ParseError("record is 12 bytes".to_string());
        assert_eq!(format!("{}", err), "Parse error: record is 12 bytes");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = CommonError::NotFound("edge USD -> EUR".to_string());
        assert_eq!(format!("{}", err), "Item not found: edge USD -> EUR");
    }
}
