/// Errors returned while setting up a Clique runtime.
///
/// Protocol failures never show up here: they end up in the link matrix
/// handed to the check callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CliqueError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid duration in {var}: {reason}")]
    EnvDuration { var: &'static str, reason: String },
}
