use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] finboard_core::ConfigError),

    #[error("{message}")]
    Fetch {
        code: &'static str,
        message: String,
    },

    #[error("path '{0}' not found in the response")]
    PathNotFound(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Fetch { .. } => 3,
            Self::PathNotFound(_) => 4,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }

    /// Stable failure code of an unsuccessful fetch.
    pub const fn fetch_code(&self) -> Option<&'static str> {
        match self {
            Self::Fetch { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let config = CliError::from(finboard_core::ConfigError::InvalidValue {
            name: "max retries",
            value: String::from("x"),
        });
        let fetch = CliError::Fetch {
            code: "fetch.server_error",
            message: String::from("down"),
        };

        assert_eq!(config.exit_code(), 2);
        assert_eq!(fetch.exit_code(), 3);
        assert_eq!(CliError::PathNotFound(String::from("a.b")).exit_code(), 4);
        assert_eq!(fetch.to_string(), "down");
        assert_eq!(fetch.fetch_code(), Some("fetch.server_error"));
        assert_eq!(config.fetch_code(), None);
    }
}
