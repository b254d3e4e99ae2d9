use thiserror::Error;

/// Errors returned by the field, gateway, crop and simulation layers.
///
/// Every gateway returns either a populated result or one of these
/// variants; nothing is retried at this layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrrigoError {
    /// The drawn boundary is empty, degenerate, self-intersecting or not a polygon.
    #[error("invalid field geometry: {0}")]
    Geometry(String),

    /// The upstream query succeeded but nothing matched.
    #[error("no data available: {0}")]
    DataUnavailable(String),

    /// Network, authentication or parse failure from an external provider.
    #[error("{provider} request failed: {message}")]
    UpstreamFailure {
        provider: &'static str,
        message: String,
    },

    /// Invalid crop profile, efficiency, date range or settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The external crop simulator is not installed, missing its workbook or answered garbage.
    #[error("crop simulation unavailable: {0}")]
    SimulationUnavailable(String),
}

impl IrrigoError {
    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        IrrigoError::UpstreamFailure {
            provider,
            message: message.into(),
        }
    }

    /// True when the provider answered but had nothing for the query.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, IrrigoError::DataUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, IrrigoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_provider() {
        let err = IrrigoError::upstream("NASA POWER", "HTTP 503");
        assert_eq!(err.to_string(), "NASA POWER request failed: HTTP 503");
        assert!(!err.is_data_unavailable());
    }

    #[test]
    fn test_data_unavailable_is_distinct_from_failure() {
        let err = IrrigoError::DataUnavailable("no scenes".to_string());
        assert!(err.is_data_unavailable());
    }
}
