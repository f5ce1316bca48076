use thiserror::Error;

/// Failure kinds surfaced by the ledger.
///
/// The display strings are the user-facing messages shown by the web
/// frontend, so they stay in Dutch.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No password was supplied.
    #[error("Wachtwoord vereist")]
    AuthRequired,

    /// A password was supplied but does not match the stored hash.
    #[error("Onjuist wachtwoord")]
    AuthInvalid,

    #[error("{0}")]
    InvalidInput(String),

    /// Storage or hashing failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

pub(crate) const WEIGHTS_NOT_NUMERIC: &str = "Gewichten moeten nummers zijn";
pub(crate) const WEIGHT_INCREASED: &str = "Gewicht na vullen kan niet hoger zijn dan ervoor";
pub(crate) const LIMIT_NOT_POSITIVE: &str = "Daglimiet moet groter zijn dan 0";
