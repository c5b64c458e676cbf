use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{LoanStatus, PaymentMode};

/// all events a loan emits over its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoanEvent {
    // lifecycle events
    Applied {
        loan_id: String,
        principal: Money,
        monthly_emi: Money,
        eligibility_score: u32,
        timestamp: DateTime<Utc>,
    },
    Approved {
        loan_id: String,
        approved_by: String,
        approved_amount: Money,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        loan_id: String,
        rejected_by: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    Disbursed {
        loan_id: String,
        account_number: String,
        amount: Money,
        transaction_id: String,
        installments: u32,
        timestamp: DateTime<Utc>,
    },

    // repayment events
    RepaymentReceived {
        loan_id: String,
        amount: Money,
        mode: PaymentMode,
        transaction_id: String,
        outstanding_after: Money,
        timestamp: DateTime<Utc>,
    },
    InstallmentPaid {
        loan_id: String,
        installment_number: u32,
        payment_date: NaiveDate,
        penalty: Option<Money>,
    },
    Foreclosed {
        loan_id: String,
        settlement_amount: Money,
        installments_settled: u32,
        foreclosure_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // status events
    Closed {
        loan_id: String,
        timestamp: DateTime<Utc>,
    },
    Defaulted {
        loan_id: String,
        overdue_installments: u32,
        cutoff: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: String,
        old_status: LoanStatus,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    },
}

/// append-only event log kept with each loan record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStore {
    events: Vec<LoanEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: LoanEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[LoanEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// most recent status transition, if any
    pub fn last_status_change(&self) -> Option<(LoanStatus, LoanStatus)> {
        self.events.iter().rev().find_map(|event| match event {
            LoanEvent::StatusChanged {
                old_status,
                new_status,
                ..
            } => Some((*old_status, *new_status)),
            _ => None,
        })
    }
}
