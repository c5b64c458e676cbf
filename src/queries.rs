use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::amortization::AmortizationCalculator;
use crate::auth::{AuthContext, BranchAuthorization};
use crate::bank::{Account, AccountDirectory, CustomerDirectory};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::lifecycle::LoanService;
use crate::loan::{ApprovalHistoryEntry, Loan, RepaymentScheduleEntry};
use crate::statement::{ForeclosureQuote, LoanStatement};
use crate::store::LoanRecord;
use crate::types::{ApprovalStatus, BranchId, LoanStatus, LoanType, Role};

/// filters for `search_loans`; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanSearchCriteria {
    pub customer_id: Option<String>,
    pub loan_status: Option<LoanStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub loan_type: Option<LoanType>,
    pub branch_id: Option<BranchId>,
    pub min_principal: Option<Money>,
    pub max_principal: Option<Money>,
}

impl LoanSearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn status(mut self, status: LoanStatus) -> Self {
        self.loan_status = Some(status);
        self
    }

    pub fn approval(mut self, status: ApprovalStatus) -> Self {
        self.approval_status = Some(status);
        self
    }

    pub fn loan_type(mut self, loan_type: LoanType) -> Self {
        self.loan_type = Some(loan_type);
        self
    }

    pub fn branch(mut self, branch_id: BranchId) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn principal_between(mut self, min: Money, max: Money) -> Self {
        self.min_principal = Some(min);
        self.max_principal = Some(max);
        self
    }

    /// every filter except the branch, which needs the account join
    pub fn matches(&self, loan: &Loan) -> bool {
        self.customer_id.as_deref().map_or(true, |c| loan.customer_id == c)
            && self.loan_status.map_or(true, |s| loan.loan_status == s)
            && self.approval_status.map_or(true, |s| loan.approval_status == s)
            && self.loan_type.map_or(true, |t| loan.loan_type == t)
            && self.min_principal.map_or(true, |min| loan.principal >= min)
            && self.max_principal.map_or(true, |max| loan.principal <= max)
    }
}

impl LoanService {
    /// record snapshot after the caller's access has been checked
    fn authorized_record(&self, loan_id: &str, auth: &AuthContext) -> Result<LoanRecord> {
        let record = self.store.get(loan_id)?;
        let account = self.load_account(&record.loan.account_number)?;
        BranchAuthorization::authorize_loan(auth, &record.loan, &account)?;
        Ok(record)
    }

    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn get_loan_by_id(&self, loan_id: &str, auth: &AuthContext) -> Result<Loan> {
        Ok(self.authorized_record(loan_id, auth)?.loan)
    }

    pub fn get_repayment_schedule(&self, loan_id: &str, auth: &AuthContext) -> Result<Vec<RepaymentScheduleEntry>> {
        Ok(self.authorized_record(loan_id, auth)?.schedule)
    }

    pub fn get_approval_history(&self, loan_id: &str, auth: &AuthContext) -> Result<Vec<ApprovalHistoryEntry>> {
        Ok(self.authorized_record(loan_id, auth)?.history)
    }

    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn get_statement(&self, loan_id: &str, auth: &AuthContext) -> Result<LoanStatement> {
        let record = self.authorized_record(loan_id, auth)?;
        Ok(LoanStatement::from_record(&record))
    }

    /// settlement figure as of today
    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn foreclosure_quote(&self, loan_id: &str, auth: &AuthContext) -> Result<ForeclosureQuote> {
        let record = self.authorized_record(loan_id, auth)?;
        let loan = &record.loan;
        if loan.loan_status != LoanStatus::Active {
            return Err(LoanError::invalid_state(loan.loan_status, "ACTIVE"));
        }

        Ok(ForeclosureQuote {
            loan_id: loan.loan_id.clone(),
            quote_date: self.today(),
            outstanding_balance: loan.outstanding_balance,
            suspense_credit: loan.suspense_balance,
            settlement_amount: (loan.outstanding_balance - loan.suspense_balance).max(Money::ZERO),
            prepayment_charge: AmortizationCalculator::calculate_prepayment_charges(
                loan.outstanding_balance,
                self.config.penalty_policy.prepayment_charge_percent,
            ),
            remaining_installments: record.schedule.iter().filter(|e| e.is_outstanding()).count() as u32,
        })
    }

    /// loans matching `criteria` that the caller may see, oldest application first
    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn search_loans(&self, criteria: &LoanSearchCriteria, auth: &AuthContext) -> Result<Vec<Loan>> {
        let candidates = self.store.loans_where(|loan| criteria.matches(loan));
        let loans = self.visible(candidates, auth, criteria.branch_id);
        debug!(found = loans.len(), "loan search complete");
        Ok(loans)
    }

    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn get_loans_by_customer(&self, customer_id: &str, auth: &AuthContext) -> Result<Vec<Loan>> {
        if self.customers.find_by_customer_id(customer_id).is_none() {
            return Err(LoanError::CustomerNotFound {
                customer_id: customer_id.to_string(),
            });
        }
        if auth.role == Role::Customer && auth.customer_id.as_deref() != Some(customer_id) {
            warn!(principal = %auth.principal, customer_id, "customer listed another customer's loans");
            return Err(LoanError::UnauthorizedAccess {
                role: auth.role,
                reason: "customers may only list their own loans".to_string(),
            });
        }
        Ok(self.visible(self.store.find_by_customer(customer_id), auth, None))
    }

    /// applications awaiting a decision in the caller's scope
    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn get_pending_approvals(&self, auth: &AuthContext) -> Result<Vec<Loan>> {
        BranchAuthorization::require_loan_staff(auth, "pending approval queue")?;
        Ok(self.visible(self.store.find_pending_approvals(), auth, None))
    }

    /// keep loans the caller may access, optionally pinned to one branch.
    /// Loans whose account cannot be resolved are dropped.
    pub(crate) fn visible(&self, loans: Vec<Loan>, auth: &AuthContext, branch: Option<BranchId>) -> Vec<Loan> {
        let (visible, unresolved) = self.scope_loans(loans, auth, branch);
        for loan in &unresolved {
            warn!(loan_id = %loan.loan_id, account = %loan.account_number, "loan account not found");
        }
        visible
    }

    /// split `loans` into those the caller may access and those whose
    /// account no longer resolves; inaccessible loans are in neither
    pub(crate) fn scope_loans(
        &self,
        loans: Vec<Loan>,
        auth: &AuthContext,
        branch: Option<BranchId>,
    ) -> (Vec<Loan>, Vec<Loan>) {
        let mut accounts: HashMap<String, Option<Account>> = HashMap::new();
        let mut visible = Vec::new();
        let mut unresolved = Vec::new();
        for loan in loans {
            let account = accounts
                .entry(loan.account_number.clone())
                .or_insert_with(|| self.accounts.find_by_account_number(&loan.account_number));
            match account {
                Some(account) => {
                    if branch.map_or(true, |id| account.branch.id == id)
                        && BranchAuthorization::can_access_loan(auth, &loan, account)
                    {
                        visible.push(loan);
                    }
                }
                None => unresolved.push(loan),
            }
        }
        (visible, unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(customer: &str, principal: i64, loan_type: LoanType) -> Loan {
        use crate::decimal::Rate;
        use chrono::{NaiveDate, TimeZone, Utc};
        Loan::new(
            customer.into(),
            "ACC-1".into(),
            loan_type,
            Money::from_major(principal),
            Rate::from_percentage(10),
            12,
            Money::from_major(100),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        assert!(LoanSearchCriteria::new().matches(&loan("C1", 5_000, LoanType::Car)));
    }

    #[test]
    fn test_criteria_filters() {
        let car = loan("C1", 5_000, LoanType::Car);
        let criteria = LoanSearchCriteria::new()
            .customer("C1")
            .loan_type(LoanType::Car)
            .principal_between(Money::from_major(1_000), Money::from_major(5_000));
        assert!(criteria.matches(&car));

        assert!(!criteria.clone().customer("C2").matches(&car));
        assert!(!criteria.clone().status(LoanStatus::Active).matches(&car));
        assert!(criteria.clone().approval(ApprovalStatus::Pending).matches(&car));
        assert!(!LoanSearchCriteria::new()
            .principal_between(Money::from_major(5_001), Money::from_major(9_000))
            .matches(&car));
    }
}
