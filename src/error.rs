use butane_api::{error::RoutingError, Report};

/// Why a translation produced no output. The accompanying report holds the
/// details.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("failed to parse config")]
    Decode,

    #[error("config is not valid")]
    InvalidSourceConfig,

    #[error("config generated was invalid")]
    InvalidGeneratedConfig,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// A failed translation together with every diagnostic gathered before it
/// stopped.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TranslateFailure {
    pub error: TranslateError,
    pub report: Report,
}

impl TranslateFailure {
    pub fn new(error: impl Into<TranslateError>, report: Report) -> Self {
        Self {
            error: error.into(),
            report,
        }
    }
}
