use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bank::Account;
use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::types::{BranchId, Role};

/// identity of the sentinel principal used by scheduled jobs
pub const SYSTEM_PRINCIPAL: &str = "system";

/// resolved caller identity, passed into every operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub principal: String,
    pub role: Role,
    pub customer_id: Option<String>,
    pub branch_id: Option<BranchId>,
}

impl AuthContext {
    pub fn admin(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            role: Role::Admin,
            customer_id: None,
            branch_id: None,
        }
    }

    /// branch-bound staff member
    pub fn staff(principal: impl Into<String>, role: Role, branch_id: BranchId) -> Self {
        Self {
            principal: principal.into(),
            role,
            customer_id: None,
            branch_id: Some(branch_id),
        }
    }

    pub fn customer(customer_id: impl Into<String>) -> Self {
        let customer_id = customer_id.into();
        Self {
            principal: customer_id.clone(),
            role: Role::Customer,
            customer_id: Some(customer_id),
            branch_id: None,
        }
    }

    pub fn system() -> Self {
        Self {
            principal: SYSTEM_PRINCIPAL.to_string(),
            role: Role::System,
            customer_id: None,
            branch_id: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// which loans a role may see and act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanScope {
    All,
    Branch,
    OwnLoans,
    None,
}

impl Role {
    pub fn loan_scope(&self) -> LoanScope {
        match self {
            Role::Admin | Role::System => LoanScope::All,
            Role::BranchManager | Role::LoanOfficer => LoanScope::Branch,
            Role::Customer => LoanScope::OwnLoans,
            Role::CardOfficer | Role::Teller => LoanScope::None,
        }
    }

    /// may take credit decisions and release funds
    pub fn is_loan_staff(&self) -> bool {
        matches!(
            self,
            Role::Admin | Role::BranchManager | Role::LoanOfficer | Role::System
        )
    }
}

/// role and branch scoped access rules for loans and accounts
pub struct BranchAuthorization;

impl BranchAuthorization {
    /// `account` is the loan's linked account, loaded with its branch
    pub fn can_access_loan(auth: &AuthContext, loan: &Loan, account: &Account) -> bool {
        match auth.role.loan_scope() {
            LoanScope::All => true,
            LoanScope::Branch => auth.branch_id == Some(account.branch.id),
            LoanScope::OwnLoans => auth.customer_id.as_deref() == Some(loan.customer_id.as_str()),
            LoanScope::None => false,
        }
    }

    /// same scoping applied to a bare account
    pub fn can_access_account(auth: &AuthContext, account: &Account) -> bool {
        match auth.role.loan_scope() {
            LoanScope::All => true,
            LoanScope::Branch => auth.branch_id == Some(account.branch.id),
            LoanScope::OwnLoans => auth.customer_id.as_deref() == Some(account.customer_id.as_str()),
            LoanScope::None => false,
        }
    }

    pub fn authorize_loan(auth: &AuthContext, loan: &Loan, account: &Account) -> Result<()> {
        if Self::can_access_loan(auth, loan, account) {
            return Ok(());
        }
        warn!(
            loan_id = %loan.loan_id,
            role = ?auth.role,
            principal = %auth.principal,
            caller_branch = ?auth.branch_id,
            caller_customer = ?auth.customer_id,
            loan_branch = account.branch.id,
            "loan access denied"
        );
        Err(LoanError::UnauthorizedAccess {
            role: auth.role,
            reason: format!("no access to loan {}", loan.loan_id),
        })
    }

    pub fn authorize_account(auth: &AuthContext, account: &Account) -> Result<()> {
        if Self::can_access_account(auth, account) {
            return Ok(());
        }
        warn!(
            account = %account.account_number,
            role = ?auth.role,
            principal = %auth.principal,
            caller_branch = ?auth.branch_id,
            account_branch = account.branch.id,
            "account access denied"
        );
        Err(LoanError::UnauthorizedAccess {
            role: auth.role,
            reason: format!("no access to account {}", account.account_number),
        })
    }

    /// credit decisions, disbursement and sweeps
    pub fn require_loan_staff(auth: &AuthContext, operation: &str) -> Result<()> {
        if auth.role.is_loan_staff() {
            return Ok(());
        }
        warn!(
            role = ?auth.role,
            principal = %auth.principal,
            operation,
            "operation restricted to loan staff"
        );
        Err(LoanError::UnauthorizedAccess {
            role: auth.role,
            reason: format!("{operation} requires loan staff"),
        })
    }
}
