use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Money;
use crate::types::Role;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: String,
    },

    #[error("customer not found: {customer_id}")]
    CustomerNotFound {
        customer_id: String,
    },

    #[error("account not found: {account}")]
    AccountNotFound {
        account: String,
    },

    #[error("loan application rejected: {}", reasons.join("; "))]
    EligibilityRejected {
        reasons: Vec<String>,
    },

    #[error("invalid loan state: current {current}, expected {expected}")]
    InvalidLoanState {
        current: String,
        expected: String,
    },

    #[error("loan {loan_id} already disbursed")]
    AlreadyDisbursed {
        loan_id: String,
    },

    #[error("unauthorized access for role {role:?}: {reason}")]
    UnauthorizedAccess {
        role: Role,
        reason: String,
    },

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Money,
        requested: Money,
    },

    #[error("account inactive: {account}")]
    AccountInactive {
        account: String,
    },

    #[error("lock poisoned: {resource}")]
    LockPoisoned {
        resource: String,
    },

    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
    },
}

/// broad classes callers dispatch on (status codes, retry policy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    BusinessRule,
    Authorization,
    Concurrency,
    Collaborator,
}

impl ErrorKind {
    /// only lock contention is worth retrying, and only by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Concurrency)
    }
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::InvalidInput { .. } | LoanError::Configuration { .. } => ErrorKind::Validation,
            LoanError::LoanNotFound { .. }
            | LoanError::CustomerNotFound { .. }
            | LoanError::AccountNotFound { .. } => ErrorKind::NotFound,
            LoanError::EligibilityRejected { .. }
            | LoanError::InvalidLoanState { .. }
            | LoanError::AlreadyDisbursed { .. }
            | LoanError::InsufficientBalance { .. } => ErrorKind::BusinessRule,
            LoanError::UnauthorizedAccess { .. } => ErrorKind::Authorization,
            LoanError::LockPoisoned { .. } => ErrorKind::Concurrency,
            LoanError::AccountInactive { .. } => ErrorKind::Collaborator,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        LoanError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(current: impl std::fmt::Debug, expected: &str) -> Self {
        LoanError::InvalidLoanState {
            current: format!("{current:?}"),
            expected: expected.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LoanError::LoanNotFound { loan_id: "LN1".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LoanError::AlreadyDisbursed { loan_id: "LN1".into() }.kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(
            LoanError::UnauthorizedAccess {
                role: Role::Customer,
                reason: "not owner".into()
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert!(LoanError::LockPoisoned { resource: "LN1".into() }.kind().is_retryable());
        assert!(!LoanError::invalid_input("bad").kind().is_retryable());
    }

    #[test]
    fn test_rejection_message_lists_reasons() {
        let err = LoanError::EligibilityRejected {
            reasons: vec!["KYC not verified".into(), "Income too low".into()],
        };
        assert_eq!(
            err.to_string(),
            "loan application rejected: KYC not verified; Income too low"
        );
    }
}
