pub mod amortization;
pub mod auth;
pub mod bank;
pub mod config;
pub mod decimal;
pub mod eligibility;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod loan;
pub mod queries;
pub mod schedule;
pub mod statement;
pub mod store;
pub mod sweep;
pub mod types;

// re-export key types
pub use amortization::AmortizationCalculator;
pub use auth::{AuthContext, BranchAuthorization, LoanScope};
pub use bank::{
    Account, AccountDirectory, Branch, Customer, CustomerDirectory, InMemoryBank,
    TransactionProcessor, TransactionResult,
};
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use eligibility::{EligibilityEvaluator, EligibilityResult, LoanApplication};
pub use errors::{ErrorKind, LoanError, Result};
pub use events::{EventStore, LoanEvent};
pub use lifecycle::{ForeclosureReceipt, LoanService, LoanServiceBuilder, RepaymentReceipt};
pub use loan::{Loan, RepaymentScheduleEntry};
pub use queries::LoanSearchCriteria;
pub use schedule::RepaymentScheduleGenerator;
pub use statement::{ForeclosureQuote, LoanStatement};
pub use store::{LoanRecord, LoanStore};
pub use sweep::SweepReport;
pub use types::{
    ApprovalStatus, DisbursementStatus, InstallmentStatus, LoanDetails, LoanStatus, LoanType,
    PaymentMode, Role,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
