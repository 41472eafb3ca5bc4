use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors from the configuration surface
///
/// Tracking itself never fails; only setup can.
#[derive(Debug)]
pub enum LeakError {
    ConfigRead { path: PathBuf, source: io::Error },
    ConfigParse { source: toml::de::Error },
    InvalidConfig { field: &'static str, reason: String },
    GlobalAlreadyInstalled,
}

impl LeakError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LeakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigRead { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            Self::ConfigParse { source } => {
                write!(f, "Failed to parse config: {}", source)
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "Invalid config value for '{}': {}", field, reason)
            }
            Self::GlobalAlreadyInstalled => {
                write!(f, "Global leak registry is already initialized")
            }
        }
    }
}

impl std::error::Error for LeakError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead { source, .. } => Some(source),
            Self::ConfigParse { source } => Some(source),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for LeakError {
    fn from(source: toml::de::Error) -> Self {
        Self::ConfigParse { source }
    }
}

pub type Result<T> = std::result::Result<T, LeakError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let err = LeakError::invalid("threshold", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'threshold': must be at least 1"
        );
        assert!(err.source().is_none());

        let err = LeakError::ConfigRead {
            path: PathBuf::from("leakwatch.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().starts_with("Failed to read config leakwatch.toml"));
        assert!(err.source().is_some());
    }
}
