use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("{source_name} returned a malformed catalog: {message}")]
    MalformedCatalog { source_name: String, message: String },

    #[error("{source_name} returned a malformed response: {message}")]
    MalformedResponse { source_name: String, message: String },

    #[error("Could not extract {field}: {message}")]
    FieldExtraction { field: String, message: String },

    #[error("Could not parse coordinate: {0}")]
    CoordinateParse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl ScraperError {
    pub fn unavailable(source_name: &str, message: impl Into<String>) -> Self {
        ScraperError::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed_catalog(source_name: &str, message: impl Into<String>) -> Self {
        ScraperError::MalformedCatalog {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed_response(source_name: &str, message: impl Into<String>) -> Self {
        ScraperError::MalformedResponse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Errors that abort the whole run instead of a single source or record.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ScraperError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_persistence_is_run_fatal() {
        assert!(ScraperError::Persistence("disk full".into()).is_run_fatal());
        assert!(!ScraperError::unavailable("smhi", "timeout").is_run_fatal());
        assert!(!ScraperError::MissingCredential("TRAFIKVERKET_AUTH_KEY".into()).is_run_fatal());
    }

    #[test]
    fn test_error_messages_name_the_source() {
        let err = ScraperError::malformed_catalog("smhi", "missing field `station`");
        assert_eq!(
            err.to_string(),
            "smhi returned a malformed catalog: missing field `station`"
        );
    }
}
