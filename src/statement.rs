use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::loan::{ApprovalHistoryEntry, DisbursementRecord, Loan, RepaymentScheduleEntry};
use crate::schedule::next_outstanding;
use crate::store::LoanRecord;
use crate::types::InstallmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextInstallment {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
}

/// consolidated view of one loan for the borrower or staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanStatement {
    pub loan: Loan,
    pub total_paid: Money,
    pub total_principal_paid: Money,
    pub total_interest_paid: Money,
    pub installments_paid: u32,
    pub installments_pending: u32,
    pub installments_overdue: u32,
    pub next_installment: Option<NextInstallment>,
    pub penalties_assessed: Money,
    pub suspense_balance: Money,
    pub schedule: Vec<RepaymentScheduleEntry>,
    pub disbursements: Vec<DisbursementRecord>,
    pub approval_history: Vec<ApprovalHistoryEntry>,
}

impl LoanStatement {
    pub fn from_record(record: &LoanRecord) -> Self {
        let count = |status: InstallmentStatus| {
            record.schedule.iter().filter(|e| e.status == status).count() as u32
        };
        let next_installment = next_outstanding(&record.schedule).map(|entry| NextInstallment {
            installment_number: entry.installment_number,
            due_date: entry.due_date,
            amount: entry.total_amount,
        });

        Self {
            total_paid: record.loan.total_paid,
            total_principal_paid: record.loan.total_principal_paid,
            total_interest_paid: record.loan.total_interest_paid,
            installments_paid: count(InstallmentStatus::Paid),
            installments_pending: count(InstallmentStatus::Pending),
            installments_overdue: count(InstallmentStatus::Overdue),
            next_installment,
            penalties_assessed: record.loan.penalties_assessed,
            suspense_balance: record.loan.suspense_balance,
            schedule: record.schedule.clone(),
            disbursements: record.loan.disbursements.clone(),
            approval_history: record.history.clone(),
            loan: record.loan.clone(),
        }
    }

    /// get statement as json
    pub fn json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// what an early settlement would cost today
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeclosureQuote {
    pub loan_id: String,
    pub quote_date: NaiveDate,
    pub outstanding_balance: Money,
    pub suspense_credit: Money,
    /// amount `foreclose` would withdraw
    pub settlement_amount: Money,
    /// informational; never collected
    pub prepayment_charge: Money,
    pub remaining_installments: u32,
}
