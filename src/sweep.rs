//! Periodic default detection. Active loans with an installment unpaid past
//! the configured threshold move to DEFAULTED and the late installments are
//! flagged OVERDUE. Each loan is handled in its own unit of work, so one
//! failure never stops the sweep.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::auth::{AuthContext, BranchAuthorization, LoanScope};
use crate::errors::{LoanError, Result};
use crate::events::LoanEvent;
use crate::lifecycle::LoanService;
use crate::store::LoanRecord;
use crate::types::{InstallmentStatus, LoanStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_at: DateTime<Utc>,
    pub cutoff: NaiveDate,
    pub examined: u32,
    pub defaulted: u32,
    pub skipped: u32,
    pub failed: u32,
    pub defaulted_loans: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepOutcome {
    Defaulted(u32),
    Current,
}

impl LoanService {
    /// mark long-overdue active loans as defaulted.
    ///
    /// Staff see their own branch only; admin and the system principal see
    /// every loan.
    #[instrument(skip(self, auth), fields(role = ?auth.role, principal = %auth.principal))]
    pub fn run_default_sweep(&self, auth: &AuthContext) -> Result<SweepReport> {
        BranchAuthorization::require_loan_staff(auth, "default sweep")?;

        let now = self.now();
        let cutoff = now.date_naive()
            - Duration::days(i64::from(self.config.default_policy.overdue_days_threshold));

        let active = self.store.find_by_status(LoanStatus::Active);
        let (candidates, unresolved) = match auth.role.loan_scope() {
            LoanScope::All => (active, Vec::new()),
            _ => self.scope_loans(active, auth, None),
        };

        let mut report = SweepReport {
            run_at: now,
            cutoff,
            examined: 0,
            defaulted: 0,
            skipped: 0,
            failed: 0,
            defaulted_loans: Vec::new(),
        };

        // branch cannot be decided without the account
        for loan in unresolved {
            error!(loan_id = %loan.loan_id, account = %loan.account_number, "loan account not found, cannot scope loan for default sweep");
            report.examined += 1;
            report.failed += 1;
        }

        for loan in candidates {
            report.examined += 1;
            let outcome = self
                .store
                .update(&loan.loan_id, |record| default_if_overdue(record, cutoff, now));
            match outcome {
                Ok(SweepOutcome::Defaulted(overdue)) => {
                    info!(loan_id = %loan.loan_id, overdue, %cutoff, "loan defaulted");
                    report.defaulted += 1;
                    report.defaulted_loans.push(loan.loan_id);
                }
                Ok(SweepOutcome::Current) => report.skipped += 1,
                Err(e) => {
                    error!(loan_id = %loan.loan_id, error = %e, "default sweep failed for loan");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            defaulted = report.defaulted,
            skipped = report.skipped,
            failed = report.failed,
            "default sweep complete"
        );
        Ok(report)
    }
}

/// installments due before `cutoff` and still pending
fn overdue_before(record: &LoanRecord, cutoff: NaiveDate) -> Vec<usize> {
    record
        .schedule
        .iter()
        .enumerate()
        .filter(|(_, e)| e.status == InstallmentStatus::Pending && e.due_date < cutoff)
        .map(|(i, _)| i)
        .collect()
}

fn default_if_overdue(record: &mut LoanRecord, cutoff: NaiveDate, now: DateTime<Utc>) -> Result<SweepOutcome> {
    // status may have moved since the candidate list was read
    if record.loan.loan_status != LoanStatus::Active {
        return Ok(SweepOutcome::Current);
    }
    let overdue = overdue_before(record, cutoff);
    if overdue.is_empty() {
        return Ok(SweepOutcome::Current);
    }
    if !record.loan.reconciles_with(&record.schedule) {
        return Err(LoanError::InvalidLoanState {
            current: format!("outstanding {}", record.loan.outstanding_balance),
            expected: format!(
                "outstanding {}",
                record.loan.expected_outstanding(&record.schedule)
            ),
        });
    }

    for &index in &overdue {
        record.schedule[index].status = InstallmentStatus::Overdue;
    }
    let count = overdue.len() as u32;
    let loan_id = record.loan.loan_id.clone();
    let old = record.loan.update_status(LoanStatus::Defaulted, now);
    record.loan.remarks.push(format!(
        "Defaulted on {}: {count} installment(s) overdue before {cutoff}",
        now.date_naive()
    ));
    record.events.emit(LoanEvent::StatusChanged {
        loan_id: loan_id.clone(),
        old_status: old,
        new_status: LoanStatus::Defaulted,
        timestamp: now,
    });
    record.events.emit(LoanEvent::Defaulted {
        loan_id,
        overdue_installments: count,
        cutoff,
        timestamp: now,
    });
    Ok(SweepOutcome::Defaulted(count))
}
