//! Error types for the fatal, run-aborting class.
//!
//! Data gaps, malformed events, and calendar conflicts are not errors here:
//! they are counted, logged, and the run continues. Only configuration-class
//! problems (bad config values, unknown broker or event source, unreadable
//! input files) terminate a run.

#[derive(Debug, thiserror::Error)]
pub enum EarntraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unsupported broker profile: {0}")]
    UnsupportedBroker(String),

    #[error("unsupported event source: {0}")]
    UnsupportedEventSource(String),

    #[error("bar data error for {ticker}: {reason}")]
    BarData { ticker: String, reason: String },

    #[error("event data error in {file}: {reason}")]
    EventData { file: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EarntraderError> for std::process::ExitCode {
    fn from(err: &EarntraderError) -> Self {
        let code: u8 = match err {
            EarntraderError::Io(_) => 1,
            EarntraderError::ConfigParse { .. }
            | EarntraderError::ConfigMissing { .. }
            | EarntraderError::ConfigInvalid { .. }
            | EarntraderError::UnsupportedBroker(_)
            | EarntraderError::UnsupportedEventSource(_) => 2,
            EarntraderError::BarData { .. } => 3,
            EarntraderError::EventData { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
