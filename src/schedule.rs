use chrono::{Months, NaiveDate};

use crate::amortization::AmortizationCalculator;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::loan::{Loan, RepaymentScheduleEntry};
use crate::types::InstallmentStatus;

/// builds the installment plan for a disbursed loan
pub struct RepaymentScheduleGenerator;

impl RepaymentScheduleGenerator {
    /// generate a fresh schedule anchored on the disbursement date, or on
    /// `today` when the loan has none yet. Callers replace any previous
    /// schedule with the result.
    pub fn generate(loan: &Loan, today: NaiveDate) -> Result<Vec<RepaymentScheduleEntry>> {
        if loan.tenure_months == 0 {
            return Err(LoanError::invalid_input("tenure must be at least one month"));
        }
        if !loan.monthly_emi.is_positive() {
            return Err(LoanError::invalid_input("monthly EMI has not been computed"));
        }

        let anchor = loan.actual_disbursement_date.unwrap_or(today);
        let mut remaining = loan.principal;
        let mut entries = Vec::with_capacity(loan.tenure_months as usize);

        for i in 1..=loan.tenure_months {
            let due_date = anchor
                .checked_add_months(Months::new(i))
                .ok_or_else(|| LoanError::invalid_input("due date out of range"))?;
            let interest =
                AmortizationCalculator::calculate_period_interest(remaining, loan.annual_interest_rate);

            // last installment absorbs the rounding residue
            let (principal, total) = if i == loan.tenure_months {
                (remaining, remaining + interest)
            } else {
                (
                    AmortizationCalculator::calculate_period_principal(loan.monthly_emi, interest),
                    loan.monthly_emi,
                )
            };

            remaining = AmortizationCalculator::calculate_outstanding_after_payment(remaining, principal);

            entries.push(RepaymentScheduleEntry {
                installment_number: i,
                due_date,
                principal_amount: principal,
                interest_amount: interest,
                total_amount: total,
                balance_after_payment: remaining,
                status: InstallmentStatus::Pending,
                payment_date: None,
                penalty_applied: None,
                transaction_id: None,
            });
        }

        Ok(entries)
    }
}

/// sum of principal across a schedule
pub fn total_principal(schedule: &[RepaymentScheduleEntry]) -> Money {
    schedule.iter().map(|e| e.principal_amount).sum()
}

/// sum of interest across a schedule
pub fn total_interest(schedule: &[RepaymentScheduleEntry]) -> Money {
    schedule.iter().map(|e| e.interest_amount).sum()
}

/// first installment still owed, in installment order
pub fn next_outstanding(schedule: &[RepaymentScheduleEntry]) -> Option<&RepaymentScheduleEntry> {
    schedule
        .iter()
        .filter(|e| e.is_outstanding())
        .min_by_key(|e| e.installment_number)
}
