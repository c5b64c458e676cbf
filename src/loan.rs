use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::types::{
    ApprovalStage, ApprovalStatus, DisbursementStatus, InstallmentStatus, LoanDetails, LoanKey,
    LoanStatus, LoanType, RiskRating,
};

/// loan state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    // identification
    pub key: LoanKey,
    pub loan_id: String,
    pub customer_id: String,
    pub account_number: String,

    // terms
    pub loan_type: LoanType,
    pub principal: Money,
    pub annual_interest_rate: Rate,
    pub tenure_months: u32,
    pub monthly_emi: Money,

    // status
    pub loan_status: LoanStatus,
    pub approval_status: ApprovalStatus,
    pub disbursement_status: DisbursementStatus,

    // balances
    pub outstanding_balance: Money,
    pub approved_amount: Money,
    pub disbursed_amount: Money,
    /// repayment money not yet large enough to settle the next installment
    pub suspense_balance: Money,

    // payment tracking
    pub total_paid: Money,
    pub total_principal_paid: Money,
    pub total_interest_paid: Money,
    pub penalties_assessed: Money,
    pub last_payment_date: Option<NaiveDate>,

    // underwriting
    pub monthly_income: Money,
    pub eligibility_score: u32,
    pub risk_rating: RiskRating,
    pub approval_conditions: Option<String>,
    pub rejection_reason: Option<String>,

    // dates
    pub application_date: NaiveDate,
    pub approved_date: Option<NaiveDate>,
    pub actual_disbursement_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub last_status_change: DateTime<Utc>,

    pub details: LoanDetails,
    pub disbursements: Vec<DisbursementRecord>,
    pub remarks: Vec<String>,
}

/// one installment of a repayment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentScheduleEntry {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub total_amount: Money,
    /// outstanding principal once this installment is paid on schedule
    pub balance_after_payment: Money,
    pub status: InstallmentStatus,
    pub payment_date: Option<NaiveDate>,
    pub penalty_applied: Option<Money>,
    pub transaction_id: Option<String>,
}

impl RepaymentScheduleEntry {
    pub fn is_outstanding(&self) -> bool {
        self.status.is_outstanding()
    }

    pub fn mark_paid(&mut self, payment_date: NaiveDate, transaction_id: Option<String>) {
        self.status = InstallmentStatus::Paid;
        self.payment_date = Some(payment_date);
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
    }
}

/// append-only decision trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    pub decision: ApprovalStatus,
    pub stage: ApprovalStage,
    pub action_by: String,
    pub action_date: DateTime<Utc>,
    pub comments: Option<String>,
    pub approval_conditions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRecord {
    pub account_number: String,
    pub amount: Money,
    pub transaction_id: String,
    pub disbursement_date: NaiveDate,
    pub disbursed_by: String,
}

impl Loan {
    /// create a loan in APPLICATION / PENDING / PENDING
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: String,
        account_number: String,
        loan_type: LoanType,
        principal: Money,
        annual_interest_rate: Rate,
        tenure_months: u32,
        monthly_emi: Money,
        application_date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let key = Uuid::new_v4();
        Self {
            key,
            loan_id: loan_id_for(&key),
            customer_id,
            account_number,
            loan_type,
            principal,
            annual_interest_rate,
            tenure_months,
            monthly_emi,
            loan_status: LoanStatus::Application,
            approval_status: ApprovalStatus::Pending,
            disbursement_status: DisbursementStatus::Pending,
            outstanding_balance: principal,
            approved_amount: Money::ZERO,
            disbursed_amount: Money::ZERO,
            suspense_balance: Money::ZERO,
            total_paid: Money::ZERO,
            total_principal_paid: Money::ZERO,
            total_interest_paid: Money::ZERO,
            penalties_assessed: Money::ZERO,
            last_payment_date: None,
            monthly_income: Money::ZERO,
            eligibility_score: 0,
            risk_rating: RiskRating::VeryHigh,
            approval_conditions: None,
            rejection_reason: None,
            application_date,
            approved_date: None,
            actual_disbursement_date: None,
            closed_date: None,
            last_status_change: timestamp,
            details: LoanDetails::default(),
            disbursements: Vec::new(),
            remarks: Vec::new(),
        }
    }

    pub fn is_pending_approval(&self) -> bool {
        self.loan_status == LoanStatus::Application && self.approval_status == ApprovalStatus::Pending
    }

    /// still carries a monthly obligation for the borrower
    pub fn is_committed(&self) -> bool {
        matches!(self.loan_status, LoanStatus::Approved | LoanStatus::Active)
    }

    /// update status, returning the previous one
    pub fn update_status(&mut self, new_status: LoanStatus, timestamp: DateTime<Utc>) -> LoanStatus {
        let old = self.loan_status;
        self.loan_status = new_status;
        self.last_status_change = timestamp;
        old
    }

    /// outstanding principal implied by the schedule
    pub fn expected_outstanding(&self, schedule: &[RepaymentScheduleEntry]) -> Money {
        let paid: Money = schedule
            .iter()
            .filter(|e| e.status == InstallmentStatus::Paid)
            .map(|e| e.principal_amount)
            .sum();
        self.principal - paid
    }

    /// outstanding balance agrees with the schedule
    pub fn reconciles_with(&self, schedule: &[RepaymentScheduleEntry]) -> bool {
        self.outstanding_balance == self.expected_outstanding(schedule)
    }

    /// what the borrower must still pay to settle every installment
    pub fn amount_due_to_close(&self, schedule: &[RepaymentScheduleEntry]) -> Money {
        let due: Money = schedule
            .iter()
            .filter(|e| e.is_outstanding())
            .map(|e| e.total_amount)
            .sum();
        (due - self.suspense_balance).max(Money::ZERO)
    }

    /// get loan state as json
    pub fn json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// external loan id: LN followed by ten hex digits of the surrogate key
pub fn loan_id_for(key: &LoanKey) -> String {
    let simple = key.simple().to_string().to_uppercase();
    format!("LN{}", &simple[..10])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_loan() -> Loan {
        Loan::new(
            "CUST-1".into(),
            "ACC-1".into(),
            LoanType::Personal,
            Money::from_major(1_000),
            Rate::from_percentage(12),
            2,
            Money::from_decimal(dec!(507.51)),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn entry(number: u32, principal: Money, total: Money) -> RepaymentScheduleEntry {
        RepaymentScheduleEntry {
            installment_number: number,
            due_date: NaiveDate::from_ymd_opt(2024, 1 + number, 1).unwrap(),
            principal_amount: principal,
            interest_amount: total - principal,
            total_amount: total,
            balance_after_payment: Money::ZERO,
            status: InstallmentStatus::Pending,
            payment_date: None,
            penalty_applied: None,
            transaction_id: None,
        }
    }

    #[test]
    fn test_new_loan_starts_in_application() {
        let loan = sample_loan();
        assert!(loan.is_pending_approval());
        assert!(!loan.is_committed());
        assert_eq!(loan.outstanding_balance, loan.principal);
        assert!(loan.loan_id.starts_with("LN"));
        assert_eq!(loan.loan_id.len(), 12);
    }

    #[test]
    fn test_reconciliation_against_schedule() {
        let mut loan = sample_loan();
        let mut schedule = vec![
            entry(1, Money::from_decimal(dec!(497.51)), Money::from_decimal(dec!(507.51))),
            entry(2, Money::from_decimal(dec!(502.49)), Money::from_decimal(dec!(507.51))),
        ];
        assert!(loan.reconciles_with(&schedule));

        schedule[0].mark_paid(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Some("TX1".into()));
        assert!(!loan.reconciles_with(&schedule));

        loan.outstanding_balance -= schedule[0].principal_amount;
        assert!(loan.reconciles_with(&schedule));
        assert_eq!(loan.amount_due_to_close(&schedule), Money::from_decimal(dec!(507.51)));

        loan.suspense_balance = Money::from_major(7);
        assert_eq!(loan.amount_due_to_close(&schedule), Money::from_decimal(dec!(500.51)));
    }

    #[test]
    fn test_update_status_returns_previous() {
        let mut loan = sample_loan();
        let ts = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let old = loan.update_status(LoanStatus::Approved, ts);
        assert_eq!(old, LoanStatus::Application);
        assert_eq!(loan.last_status_change, ts);
        assert!(loan.is_committed());
    }
}
