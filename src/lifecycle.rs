use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::amortization::AmortizationCalculator;
use crate::auth::{AuthContext, BranchAuthorization};
use crate::bank::{Account, AccountDirectory, CustomerDirectory, InMemoryBank, TransactionProcessor, TransactionResult};
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::eligibility::{EligibilityEvaluator, EligibilityInputs, EligibilityResult, LoanApplication};
use crate::errors::{LoanError, Result};
use crate::events::LoanEvent;
use crate::loan::{ApprovalHistoryEntry, DisbursementRecord, Loan};
use crate::schedule::RepaymentScheduleGenerator;
use crate::store::{LoanRecord, LoanStore};
use crate::types::{
    ApprovalStage, ApprovalStatus, CustomerStatus, DisbursementStatus, LoanStatus, PaymentMode, Role,
};

/// result of a repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub loan_id: String,
    pub transaction: TransactionResult,
    pub installments_paid: Vec<u32>,
    pub outstanding_balance: Money,
    pub suspense_balance: Money,
    pub loan_status: LoanStatus,
}

/// result of a foreclosure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeclosureReceipt {
    pub loan_id: String,
    pub settlement_amount: Money,
    /// absent when suspense credit already covered the balance
    pub transaction: Option<TransactionResult>,
    pub installments_settled: u32,
    pub foreclosure_date: NaiveDate,
}

/// loan lifecycle orchestration over the store and the bank collaborators
pub struct LoanService {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<LoanStore>,
    pub(crate) customers: Arc<dyn CustomerDirectory>,
    pub(crate) accounts: Arc<dyn AccountDirectory>,
    pub(crate) transactions: Arc<dyn TransactionProcessor>,
    pub(crate) time: Arc<SafeTimeProvider>,
}

impl LoanService {
    pub fn builder() -> LoanServiceBuilder {
        LoanServiceBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LoanStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// the loan's linked account with its branch
    pub(crate) fn load_account(&self, account_number: &str) -> Result<Account> {
        self.accounts
            .find_by_account_number(account_number)
            .ok_or_else(|| LoanError::AccountNotFound {
                account: account_number.to_string(),
            })
    }

    /// score an application without creating a loan
    #[instrument(skip(self, application, auth), fields(customer_id = %application.customer_id))]
    pub fn check_eligibility(
        &self,
        application: &LoanApplication,
        auth: &AuthContext,
    ) -> Result<EligibilityResult> {
        application.validate()?;
        let customer = self
            .customers
            .find_by_customer_id(&application.customer_id)
            .ok_or_else(|| LoanError::CustomerNotFound {
                customer_id: application.customer_id.clone(),
            })?;
        let account = self.load_account(&application.account_number)?;
        authorize_applicant(auth, application, &account)?;

        let existing = self.store.find_by_customer(&customer.customer_id);
        EligibilityEvaluator::new(&self.config.eligibility, &self.config.rate_tiers).check_eligibility(
            application,
            &EligibilityInputs {
                customer: &customer,
                account: &account,
                existing_loans: &existing,
                today: self.today(),
            },
        )
    }

    /// submit a loan application
    #[instrument(skip(self, application, auth), fields(customer_id = %application.customer_id, loan_type = ?application.loan_type))]
    pub fn apply(&self, application: LoanApplication, auth: &AuthContext) -> Result<Loan> {
        application.validate()?;
        let customer = self
            .customers
            .find_by_customer_id(&application.customer_id)
            .ok_or_else(|| LoanError::CustomerNotFound {
                customer_id: application.customer_id.clone(),
            })?;
        if customer.status != CustomerStatus::Active {
            return Err(LoanError::EligibilityRejected {
                reasons: vec!["Customer account is not active".to_string()],
            });
        }

        let eligibility = self.check_eligibility(&application, auth)?;
        if !eligibility.is_eligible {
            info!(
                score = eligibility.score,
                reasons = eligibility.reasons.len(),
                "loan application rejected by eligibility rules"
            );
            return Err(LoanError::EligibilityRejected {
                reasons: eligibility.reasons,
            });
        }

        let emi = AmortizationCalculator::calculate_emi(
            application.requested_amount,
            application.annual_interest_rate,
            application.tenure_months,
        )?;
        let now = self.now();
        let mut loan = Loan::new(
            application.customer_id,
            application.account_number,
            application.loan_type,
            application.requested_amount,
            application.annual_interest_rate,
            application.tenure_months,
            emi,
            now.date_naive(),
            now,
        );
        loan.monthly_income = application.monthly_income;
        loan.eligibility_score = eligibility.score;
        loan.risk_rating = eligibility.risk_rating;
        loan.details = application.details;

        let mut record = LoanRecord::new(loan);
        record.history.push(ApprovalHistoryEntry {
            decision: ApprovalStatus::Pending,
            stage: ApprovalStage::ApplicationReview,
            action_by: auth.principal.clone(),
            action_date: now,
            comments: Some("Loan application submitted".to_string()),
            approval_conditions: None,
        });
        record.events.emit(LoanEvent::Applied {
            loan_id: record.loan.loan_id.clone(),
            principal: record.loan.principal,
            monthly_emi: emi,
            eligibility_score: eligibility.score,
            timestamp: now,
        });

        let loan = record.loan.clone();
        self.store.insert(record)?;
        info!(
            loan_id = %loan.loan_id,
            principal = %loan.principal,
            emi = %loan.monthly_emi,
            score = loan.eligibility_score,
            "loan application submitted"
        );
        Ok(loan)
    }

    /// approve a pending application; the schedule is built at disbursement
    #[instrument(skip(self, conditions, comments, auth), fields(role = ?auth.role))]
    pub fn approve(
        &self,
        loan_id: &str,
        conditions: Option<String>,
        comments: Option<String>,
        auth: &AuthContext,
    ) -> Result<Loan> {
        BranchAuthorization::require_loan_staff(auth, "loan approval")?;
        let now = self.now();

        let loan = self.store.update(loan_id, |record| {
            let account = self.load_account(&record.loan.account_number)?;
            BranchAuthorization::authorize_loan(auth, &record.loan, &account)?;
            require_pending(&record.loan)?;

            let loan = &mut record.loan;
            let old = loan.update_status(LoanStatus::Approved, now);
            loan.approval_status = ApprovalStatus::Approved;
            loan.approved_amount = loan.principal;
            loan.approved_date = Some(now.date_naive());
            loan.approval_conditions = conditions.clone();

            record.history.push(ApprovalHistoryEntry {
                decision: ApprovalStatus::Approved,
                stage: ApprovalStage::FinalApproval,
                action_by: auth.principal.clone(),
                action_date: now,
                comments,
                approval_conditions: conditions,
            });
            record.events.emit(LoanEvent::StatusChanged {
                loan_id: loan.loan_id.clone(),
                old_status: old,
                new_status: LoanStatus::Approved,
                timestamp: now,
            });
            record.events.emit(LoanEvent::Approved {
                loan_id: loan.loan_id.clone(),
                approved_by: auth.principal.clone(),
                approved_amount: loan.approved_amount,
                timestamp: now,
            });
            Ok(record.loan.clone())
        })?;

        info!(loan_id, approved_by = %auth.principal, "loan approved");
        Ok(loan)
    }

    /// reject a pending application; the loan stays in APPLICATION
    #[instrument(skip(self, reason, comments, auth), fields(role = ?auth.role))]
    pub fn reject(
        &self,
        loan_id: &str,
        reason: &str,
        comments: Option<String>,
        auth: &AuthContext,
    ) -> Result<Loan> {
        if reason.trim().is_empty() {
            return Err(LoanError::invalid_input("rejection reason is required"));
        }
        BranchAuthorization::require_loan_staff(auth, "loan rejection")?;
        let now = self.now();

        let loan = self.store.update(loan_id, |record| {
            let account = self.load_account(&record.loan.account_number)?;
            BranchAuthorization::authorize_loan(auth, &record.loan, &account)?;
            require_pending(&record.loan)?;

            record.loan.approval_status = ApprovalStatus::Rejected;
            record.loan.rejection_reason = Some(reason.to_string());
            record.history.push(ApprovalHistoryEntry {
                decision: ApprovalStatus::Rejected,
                stage: ApprovalStage::FinalApproval,
                action_by: auth.principal.clone(),
                action_date: now,
                comments: comments.or_else(|| Some(reason.to_string())),
                approval_conditions: None,
            });
            record.events.emit(LoanEvent::Rejected {
                loan_id: record.loan.loan_id.clone(),
                rejected_by: auth.principal.clone(),
                reason: reason.to_string(),
                timestamp: now,
            });
            Ok(record.loan.clone())
        })?;

        info!(loan_id, rejected_by = %auth.principal, "loan rejected");
        Ok(loan)
    }

    /// release approved funds into the borrower's account and build the schedule
    #[instrument(skip(self, auth), fields(role = ?auth.role, amount = %amount))]
    pub fn disburse(
        &self,
        loan_id: &str,
        account_number: &str,
        amount: Money,
        auth: &AuthContext,
    ) -> Result<Loan> {
        if !amount.is_positive() {
            return Err(LoanError::invalid_input("disbursement amount must be positive"));
        }
        BranchAuthorization::require_loan_staff(auth, "loan disbursement")?;
        let now = self.now();
        let today = now.date_naive();

        let loan = self.store.update(loan_id, |record| {
            let loan_account = self.load_account(&record.loan.account_number)?;
            BranchAuthorization::authorize_loan(auth, &record.loan, &loan_account)?;

            if record.loan.disbursement_status == DisbursementStatus::Completed {
                return Err(LoanError::AlreadyDisbursed {
                    loan_id: record.loan.loan_id.clone(),
                });
            }
            if record.loan.loan_status != LoanStatus::Approved {
                return Err(LoanError::invalid_state(record.loan.loan_status, "APPROVED"));
            }

            let target = self.load_account(account_number)?;
            if target.customer_id != record.loan.customer_id {
                return Err(LoanError::invalid_input(format!(
                    "account {account_number} does not belong to the borrower"
                )));
            }
            let available = record.loan.approved_amount - record.loan.disbursed_amount;
            if amount > available {
                return Err(LoanError::invalid_input(format!(
                    "disbursement {amount} exceeds undisbursed approval {available}"
                )));
            }

            // prepare the new state before any money moves
            let loan = &mut record.loan;
            let old = loan.update_status(LoanStatus::Active, now);
            loan.disbursed_amount += amount;
            loan.disbursement_status = DisbursementStatus::Completed;
            loan.actual_disbursement_date = Some(today);
            record.schedule = RepaymentScheduleGenerator::generate(loan, today)?;
            ensure_reconciled(record)?;

            let transaction = self.transactions.deposit(
                account_number,
                amount,
                PaymentMode::Transfer,
                &format!("Loan disbursement {loan_id}"),
                auth,
            )?;

            record.loan.disbursements.push(DisbursementRecord {
                account_number: account_number.to_string(),
                amount,
                transaction_id: transaction.transaction_id.clone(),
                disbursement_date: today,
                disbursed_by: auth.principal.clone(),
            });
            record.events.emit(LoanEvent::StatusChanged {
                loan_id: loan_id.to_string(),
                old_status: old,
                new_status: LoanStatus::Active,
                timestamp: now,
            });
            record.events.emit(LoanEvent::Disbursed {
                loan_id: loan_id.to_string(),
                account_number: account_number.to_string(),
                amount,
                transaction_id: transaction.transaction_id,
                installments: record.schedule.len() as u32,
                timestamp: now,
            });
            Ok(record.loan.clone())
        })?;

        info!(
            loan_id,
            amount = %amount,
            installments = loan.tenure_months,
            "loan disbursed"
        );
        Ok(loan)
    }

    /// take a repayment from the loan's account and settle installments in order
    #[instrument(skip(self, auth), fields(role = ?auth.role, amount = %amount))]
    pub fn repay(
        &self,
        loan_id: &str,
        amount: Money,
        payment_date: NaiveDate,
        mode: PaymentMode,
        auth: &AuthContext,
    ) -> Result<RepaymentReceipt> {
        if !amount.is_positive() {
            return Err(LoanError::invalid_input("repayment amount must be positive"));
        }
        let now = self.now();
        let penalty_rate = self.config.penalty_policy.late_penalty_rate_percent;

        let receipt = self.store.update(loan_id, |record| {
            let account = self.load_account(&record.loan.account_number)?;
            BranchAuthorization::authorize_loan(auth, &record.loan, &account)?;

            if record.loan.loan_status != LoanStatus::Active {
                return Err(LoanError::invalid_state(record.loan.loan_status, "ACTIVE"));
            }
            let due = record.loan.amount_due_to_close(&record.schedule);
            if amount > due {
                return Err(LoanError::invalid_input(format!(
                    "repayment {amount} exceeds amount due {due}"
                )));
            }
            if let Some(disbursed_on) = record.loan.actual_disbursement_date {
                if payment_date < disbursed_on {
                    return Err(LoanError::invalid_input("payment date precedes disbursement"));
                }
            }

            let mut available = record.loan.suspense_balance + amount;
            let mut settled = Vec::new();
            let mut partial = None;
            for (index, entry) in record.schedule.iter_mut().enumerate() {
                if !entry.is_outstanding() {
                    continue;
                }
                if available < entry.total_amount {
                    partial = Some(index);
                    break;
                }
                available -= entry.total_amount;
                entry.mark_paid(payment_date, None);

                let days_late = (payment_date - entry.due_date).num_days();
                if days_late > 0 {
                    let penalty = AmortizationCalculator::calculate_late_penalty(
                        entry.total_amount,
                        penalty_rate,
                        days_late as u32,
                    );
                    entry.penalty_applied = Some(penalty);
                    record.loan.penalties_assessed += penalty;
                }

                record.loan.outstanding_balance = AmortizationCalculator::calculate_outstanding_after_payment(
                    record.loan.outstanding_balance,
                    entry.principal_amount,
                );
                record.loan.total_principal_paid += entry.principal_amount;
                record.loan.total_interest_paid += entry.interest_amount;
                settled.push(index);
            }

            let loan = &mut record.loan;
            loan.suspense_balance = available;
            loan.total_paid += amount;
            loan.last_payment_date = Some(payment_date);
            let closed = loan.outstanding_balance.is_zero();
            if closed {
                let old = loan.update_status(LoanStatus::Closed, now);
                loan.closed_date = Some(payment_date);
                record.events.emit(LoanEvent::StatusChanged {
                    loan_id: loan_id.to_string(),
                    old_status: old,
                    new_status: LoanStatus::Closed,
                    timestamp: now,
                });
            }
            ensure_reconciled(record)?;

            let transaction = self.transactions.withdraw(
                &record.loan.account_number,
                amount,
                mode,
                &format!("Loan repayment {loan_id}"),
                auth,
            )?;

            let mut installments_paid = Vec::with_capacity(settled.len());
            for index in settled.iter().copied().chain(partial) {
                let entry = &mut record.schedule[index];
                entry.transaction_id = Some(transaction.transaction_id.clone());
                if entry.is_outstanding() {
                    continue;
                }
                installments_paid.push(entry.installment_number);
                record.events.emit(LoanEvent::InstallmentPaid {
                    loan_id: loan_id.to_string(),
                    installment_number: entry.installment_number,
                    payment_date,
                    penalty: entry.penalty_applied,
                });
            }
            record.events.emit(LoanEvent::RepaymentReceived {
                loan_id: loan_id.to_string(),
                amount,
                mode,
                transaction_id: transaction.transaction_id.clone(),
                outstanding_after: record.loan.outstanding_balance,
                timestamp: now,
            });
            if closed {
                record.events.emit(LoanEvent::Closed {
                    loan_id: loan_id.to_string(),
                    timestamp: now,
                });
            }

            Ok(RepaymentReceipt {
                loan_id: loan_id.to_string(),
                transaction,
                installments_paid,
                outstanding_balance: record.loan.outstanding_balance,
                suspense_balance: record.loan.suspense_balance,
                loan_status: record.loan.loan_status,
            })
        })?;

        info!(
            loan_id,
            amount = %amount,
            installments = receipt.installments_paid.len(),
            outstanding = %receipt.outstanding_balance,
            status = ?receipt.loan_status,
            "repayment applied"
        );
        Ok(receipt)
    }

    /// settle the whole outstanding balance early and close the loan.
    /// No prepayment charge is collected here.
    #[instrument(skip(self, auth), fields(role = ?auth.role))]
    pub fn foreclose(
        &self,
        loan_id: &str,
        settlement_account: &str,
        foreclosure_date: NaiveDate,
        auth: &AuthContext,
    ) -> Result<ForeclosureReceipt> {
        let now = self.now();

        let receipt = self.store.update(loan_id, |record| {
            let account = self.load_account(&record.loan.account_number)?;
            BranchAuthorization::authorize_loan(auth, &record.loan, &account)?;

            if record.loan.loan_status != LoanStatus::Active {
                return Err(LoanError::invalid_state(record.loan.loan_status, "ACTIVE"));
            }
            let settlement = self.load_account(settlement_account)?;
            if settlement.customer_id != record.loan.customer_id {
                return Err(LoanError::invalid_input(format!(
                    "account {settlement_account} does not belong to the borrower"
                )));
            }

            let loan = &mut record.loan;
            let settlement_amount = (loan.outstanding_balance - loan.suspense_balance).max(Money::ZERO);
            let mut settled = Vec::new();
            for (index, entry) in record.schedule.iter_mut().enumerate() {
                if entry.is_outstanding() {
                    entry.mark_paid(foreclosure_date, None);
                    loan.total_principal_paid += entry.principal_amount;
                    settled.push(index);
                }
            }
            loan.total_paid += settlement_amount;
            loan.outstanding_balance = Money::ZERO;
            loan.suspense_balance = Money::ZERO;
            loan.last_payment_date = Some(foreclosure_date);
            loan.closed_date = Some(foreclosure_date);
            let old = loan.update_status(LoanStatus::Closed, now);
            loan.remarks.push(format!(
                "Foreclosed on {foreclosure_date} with settlement {settlement_amount}"
            ));
            ensure_reconciled(record)?;

            let transaction = if settlement_amount.is_positive() {
                Some(self.transactions.withdraw(
                    settlement_account,
                    settlement_amount,
                    PaymentMode::Transfer,
                    &format!("Loan foreclosure {loan_id}"),
                    auth,
                )?)
            } else {
                None
            };

            if let Some(tx) = &transaction {
                for index in &settled {
                    record.schedule[*index].transaction_id = Some(tx.transaction_id.clone());
                }
            }
            record.events.emit(LoanEvent::StatusChanged {
                loan_id: loan_id.to_string(),
                old_status: old,
                new_status: LoanStatus::Closed,
                timestamp: now,
            });
            record.events.emit(LoanEvent::Foreclosed {
                loan_id: loan_id.to_string(),
                settlement_amount,
                installments_settled: settled.len() as u32,
                foreclosure_date,
                timestamp: now,
            });
            record.events.emit(LoanEvent::Closed {
                loan_id: loan_id.to_string(),
                timestamp: now,
            });

            Ok(ForeclosureReceipt {
                loan_id: loan_id.to_string(),
                settlement_amount,
                transaction,
                installments_settled: settled.len() as u32,
                foreclosure_date,
            })
        })?;

        info!(
            loan_id,
            settlement = %receipt.settlement_amount,
            installments = receipt.installments_settled,
            "loan foreclosed"
        );
        Ok(receipt)
    }
}

fn require_pending(loan: &Loan) -> Result<()> {
    if loan.approval_status != ApprovalStatus::Pending {
        return Err(LoanError::invalid_state(loan.approval_status, "PENDING"));
    }
    if loan.loan_status != LoanStatus::Application {
        return Err(LoanError::invalid_state(loan.loan_status, "APPLICATION"));
    }
    Ok(())
}

/// outstanding balance must agree with the PAID schedule entries
fn ensure_reconciled(record: &LoanRecord) -> Result<()> {
    if record.loan.reconciles_with(&record.schedule) {
        return Ok(());
    }
    let expected = record.loan.expected_outstanding(&record.schedule);
    warn!(
        loan_id = %record.loan.loan_id,
        outstanding = %record.loan.outstanding_balance,
        expected = %expected,
        "outstanding balance does not reconcile with schedule"
    );
    Err(LoanError::InvalidLoanState {
        current: format!("outstanding {}", record.loan.outstanding_balance),
        expected: format!("outstanding {expected}"),
    })
}

/// customers apply for themselves; staff within their branch
fn authorize_applicant(auth: &AuthContext, application: &LoanApplication, account: &Account) -> Result<()> {
    if auth.role == Role::Customer && auth.customer_id.as_deref() != Some(application.customer_id.as_str()) {
        warn!(
            principal = %auth.principal,
            applicant = %application.customer_id,
            "customer applied on behalf of another customer"
        );
        return Err(LoanError::UnauthorizedAccess {
            role: auth.role,
            reason: "customers may only apply for their own loans".to_string(),
        });
    }
    BranchAuthorization::authorize_account(auth, account)
}

/// builder for the loan service
pub struct LoanServiceBuilder {
    config: Option<EngineConfig>,
    store: Option<Arc<LoanStore>>,
    customers: Option<Arc<dyn CustomerDirectory>>,
    accounts: Option<Arc<dyn AccountDirectory>>,
    transactions: Option<Arc<dyn TransactionProcessor>>,
    time: Option<Arc<SafeTimeProvider>>,
}

impl LoanServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            customers: None,
            accounts: None,
            transactions: None,
            time: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<LoanStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn customers(mut self, customers: Arc<dyn CustomerDirectory>) -> Self {
        self.customers = Some(customers);
        self
    }

    pub fn accounts(mut self, accounts: Arc<dyn AccountDirectory>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn transactions(mut self, transactions: Arc<dyn TransactionProcessor>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// use one in-memory bank for all three collaborators
    pub fn bank(self, bank: Arc<InMemoryBank>) -> Self {
        self.customers(bank.clone())
            .accounts(bank.clone())
            .transactions(bank)
    }

    pub fn set_time(mut self, time: Arc<SafeTimeProvider>) -> Self {
        self.time = Some(time);
        self
    }

    /// build; system time is used when no time provider was set
    pub fn build(self) -> Result<LoanService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(LoanService {
            config,
            store: self.store.unwrap_or_default(),
            customers: self.customers.ok_or_else(|| missing("customer directory"))?,
            accounts: self.accounts.ok_or_else(|| missing("account directory"))?,
            transactions: self.transactions.ok_or_else(|| missing("transaction processor"))?,
            time: self
                .time
                .unwrap_or_else(|| Arc::new(SafeTimeProvider::new(TimeSource::System))),
        })
    }
}

impl Default for LoanServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> LoanError {
    LoanError::Configuration {
        message: format!("{what} not set"),
    }
}
