use thiserror::Error;

/// Failures surfaced by the round engine and its gateways.
///
/// None of these escape a public action: the application loop turns them into
/// status lines. Stale fetch results are not errors, see
/// [`crate::reconciler::Reconciled`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("at least one account must exist")]
    NoAccount,
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("gateway error: {0}")]
    Gateway(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
