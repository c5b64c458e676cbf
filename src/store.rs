use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{LoanError, Result};
use crate::events::EventStore;
use crate::loan::{ApprovalHistoryEntry, Loan, RepaymentScheduleEntry};
use crate::types::LoanStatus;

/// a loan together with everything it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan: Loan,
    pub schedule: Vec<RepaymentScheduleEntry>,
    pub history: Vec<ApprovalHistoryEntry>,
    pub events: EventStore,
}

impl LoanRecord {
    pub fn new(loan: Loan) -> Self {
        Self {
            loan,
            schedule: Vec::new(),
            history: Vec::new(),
            events: EventStore::new(),
        }
    }
}

type Row = Arc<Mutex<LoanRecord>>;

/// loan records, each behind its own row lock
#[derive(Debug, Default)]
pub struct LoanStore {
    rows: RwLock<HashMap<String, Row>>,
}

impl LoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: LoanRecord) -> Result<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let loan_id = record.loan.loan_id.clone();
        if rows.contains_key(&loan_id) {
            return Err(LoanError::invalid_input(format!("duplicate loan id {loan_id}")));
        }
        rows.insert(loan_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    /// run one unit of work under the loan's exclusive lock.
    ///
    /// `work` gets a working copy of the record; the copy replaces the stored
    /// record only when `work` returns `Ok`, so a failed operation leaves the
    /// loan exactly as it was. The lock is held until the copy is written back.
    pub fn update<T>(
        &self,
        loan_id: &str,
        work: impl FnOnce(&mut LoanRecord) -> Result<T>,
    ) -> Result<T> {
        let row = self.row(loan_id)?;
        let mut guard = row.lock().map_err(|_| LoanError::LockPoisoned {
            resource: loan_id.to_string(),
        })?;

        let mut working = guard.clone();
        let outcome = work(&mut working)?;
        *guard = working;
        debug!(loan_id, "loan record committed");
        Ok(outcome)
    }

    /// consistent copy of one record
    pub fn get(&self, loan_id: &str) -> Result<LoanRecord> {
        let row = self.row(loan_id)?;
        let record = snapshot(&row);
        Ok(record)
    }

    pub fn contains(&self, loan_id: &str) -> bool {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(loan_id)
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_by_customer(&self, customer_id: &str) -> Vec<Loan> {
        self.loans_where(|loan| loan.customer_id == customer_id)
    }

    pub fn find_by_status(&self, status: LoanStatus) -> Vec<Loan> {
        self.loans_where(|loan| loan.loan_status == status)
    }

    /// loans linked to any of the given accounts (the branch join)
    pub fn find_by_accounts(&self, account_numbers: &HashSet<String>) -> Vec<Loan> {
        self.loans_where(|loan| account_numbers.contains(&loan.account_number))
    }

    pub fn find_pending_approvals(&self) -> Vec<Loan> {
        self.loans_where(Loan::is_pending_approval)
    }

    pub fn all(&self) -> Vec<Loan> {
        self.loans_where(|_| true)
    }

    /// snapshot of matching loans, ordered by application date then id
    pub fn loans_where(&self, predicate: impl Fn(&Loan) -> bool) -> Vec<Loan> {
        let rows: Vec<Row> = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut loans: Vec<Loan> = rows
            .iter()
            .map(|row| snapshot(row).loan)
            .filter(|loan| predicate(loan))
            .collect();
        loans.sort_by(|a, b| {
            a.application_date
                .cmp(&b.application_date)
                .then_with(|| a.loan_id.cmp(&b.loan_id))
        });
        loans
    }

    fn row(&self, loan_id: &str) -> Result<Row> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(loan_id)
            .cloned()
            .ok_or_else(|| LoanError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })
    }
}

// records are only ever replaced whole, so a poisoned row still holds a
// committed state
fn snapshot(row: &Row) -> LoanRecord {
    row.lock().unwrap_or_else(PoisonError::into_inner).clone()
}
