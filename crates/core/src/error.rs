use relay_source::SourceError;

/// Rejected request input. Never causes a state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("applied must be 'on' or 'off'")]
    InvalidApplied,
    #[error("desired must be 'on' or 'off'")]
    InvalidDesired,
    #[error("{0} is required")]
    MissingParameter(&'static str),
}

impl InputError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidApplied => "invalid_applied",
            Self::InvalidDesired => "invalid_desired",
            Self::MissingParameter(_) => "missing_parameter",
        }
    }
}

/// Error type for relay operations. Every variant is scoped to one request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] SourceError),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidInput(e) => e.code(),
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }
}
