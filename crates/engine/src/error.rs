//! The module contains the errors the engine can return.
//!
//! Domain violations ([`NotOwner`], [`InviteExpired`], ...) are expected
//! outcomes of user actions and carry a message meant to be shown. The
//! [`Database`] variant wraps infrastructure failures.
//!
//!  [`NotOwner`]: EngineError::NotOwner
//!  [`InviteExpired`]: EngineError::InviteExpired
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("only the budget owner can do this")]
    NotOwner,
    #[error("user is not a member of this budget")]
    NotMember,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("the budget owner cannot be removed")]
    CannotRemoveOwner,
    #[error("user is already a member of this budget")]
    AlreadyMember,
    #[error("user already belongs to a budget")]
    AlreadyHasBudget,
    #[error("budget not found or archived")]
    BudgetUnavailable,
    #[error("invite not found")]
    InviteNotFound,
    #[error("invite expired")]
    InviteExpired,
    #[error("invite already used")]
    InviteExhausted,
    #[error("user not found")]
    UserNotFound,
    #[error("Validation failed: {0}")]
    ValidationFailure(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for rule violations caused by the caller, `false` for storage
    /// failures.
    #[must_use]
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::InvalidId(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ValidationFailure(a), Self::ValidationFailure(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}
