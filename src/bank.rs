//! Collaborators the loan engine consumes: customer and account directories
//! and the transaction processor that moves money. `InMemoryBank` implements
//! all three for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthContext, BranchAuthorization};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::{AccountStatus, BranchId, CustomerStatus, KycStatus, PaymentMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub status: CustomerStatus,
    pub kyc_status: KycStatus,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
}

/// account projection, loaded together with its branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: u64,
    pub account_number: String,
    pub customer_id: String,
    pub status: AccountStatus,
    pub branch: Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub transaction_id: String,
    pub account_number: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub balance_after: Money,
    pub mode: PaymentMode,
    pub description: String,
}

pub trait CustomerDirectory: Send + Sync {
    fn find_by_customer_id(&self, customer_id: &str) -> Option<Customer>;
}

pub trait AccountDirectory: Send + Sync {
    fn find_by_account_number(&self, account_number: &str) -> Option<Account>;
    fn find_by_id(&self, account_id: u64) -> Option<Account>;
}

/// money movement; each call is atomic and enforces its own authorization
pub trait TransactionProcessor: Send + Sync {
    fn deposit(
        &self,
        account_number: &str,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        auth: &AuthContext,
    ) -> Result<TransactionResult>;

    fn withdraw(
        &self,
        account_number: &str,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        auth: &AuthContext,
    ) -> Result<TransactionResult>;
}

#[derive(Debug, Clone)]
struct AccountEntry {
    account: Account,
    balance: Money,
}

/// in-memory customers, accounts and ledger
#[derive(Debug, Default)]
pub struct InMemoryBank {
    customers: RwLock<HashMap<String, Customer>>,
    accounts: RwLock<HashMap<String, AccountEntry>>,
    journal: RwLock<Vec<TransactionResult>>,
    next_transaction: AtomicU64,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, customer: Customer) {
        self.customers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(customer.customer_id.clone(), customer);
    }

    pub fn open_account(&self, account: Account, opening_balance: Money) {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                account.account_number.clone(),
                AccountEntry {
                    account,
                    balance: opening_balance,
                },
            );
    }

    pub fn balance(&self, account_number: &str) -> Option<Money> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_number)
            .map(|entry| entry.balance)
    }

    pub fn set_account_status(&self, account_number: &str, status: AccountStatus) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = accounts
            .get_mut(account_number)
            .ok_or_else(|| LoanError::AccountNotFound {
                account: account_number.to_string(),
            })?;
        entry.account.status = status;
        Ok(())
    }

    pub fn set_customer_status(&self, customer_id: &str, status: CustomerStatus) -> Result<()> {
        let mut customers = self.customers.write().unwrap_or_else(PoisonError::into_inner);
        let customer = customers
            .get_mut(customer_id)
            .ok_or_else(|| LoanError::CustomerNotFound {
                customer_id: customer_id.to_string(),
            })?;
        customer.status = status;
        Ok(())
    }

    /// every transaction posted so far, oldest first
    pub fn transactions(&self) -> Vec<TransactionResult> {
        self.journal.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn post(
        &self,
        account_number: &str,
        amount: Money,
        kind: TransactionKind,
        mode: PaymentMode,
        description: &str,
        auth: &AuthContext,
    ) -> Result<TransactionResult> {
        if !amount.is_positive() {
            return Err(LoanError::invalid_input(format!(
                "transaction amount must be positive, got {amount}"
            )));
        }

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = accounts
            .get_mut(account_number)
            .ok_or_else(|| LoanError::AccountNotFound {
                account: account_number.to_string(),
            })?;

        BranchAuthorization::authorize_account(auth, &entry.account)?;

        if entry.account.status != AccountStatus::Active {
            return Err(LoanError::AccountInactive {
                account: account_number.to_string(),
            });
        }

        let balance_after = match kind {
            TransactionKind::Deposit => entry.balance + amount,
            TransactionKind::Withdrawal => {
                if entry.balance < amount {
                    return Err(LoanError::InsufficientBalance {
                        available: entry.balance,
                        requested: amount,
                    });
                }
                entry.balance - amount
            }
        };
        entry.balance = balance_after;

        let sequence = self.next_transaction.fetch_add(1, Ordering::SeqCst) + 1;
        let result = TransactionResult {
            transaction_id: format!("TXN{sequence:08}"),
            account_number: account_number.to_string(),
            kind,
            amount,
            balance_after,
            mode,
            description: description.to_string(),
        };
        debug!(
            transaction_id = %result.transaction_id,
            account = account_number,
            kind = ?kind,
            amount = %amount,
            "transaction posted"
        );

        self.journal
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(result)
    }
}

impl CustomerDirectory for InMemoryBank {
    fn find_by_customer_id(&self, customer_id: &str) -> Option<Customer> {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(customer_id)
            .cloned()
    }
}

impl AccountDirectory for InMemoryBank {
    fn find_by_account_number(&self, account_number: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_number)
            .map(|entry| entry.account.clone())
    }

    fn find_by_id(&self, account_id: u64) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|entry| entry.account.account_id == account_id)
            .map(|entry| entry.account.clone())
    }
}

impl TransactionProcessor for InMemoryBank {
    fn deposit(
        &self,
        account_number: &str,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        auth: &AuthContext,
    ) -> Result<TransactionResult> {
        self.post(account_number, amount, TransactionKind::Deposit, mode, description, auth)
    }

    fn withdraw(
        &self,
        account_number: &str,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        auth: &AuthContext,
    ) -> Result<TransactionResult> {
        self.post(account_number, amount, TransactionKind::Withdrawal, mode, description, auth)
    }
}
