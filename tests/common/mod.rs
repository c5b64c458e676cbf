#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use retail_loan_engine::types::{AccountStatus, CustomerStatus, KycStatus};
use retail_loan_engine::{
    Account, AuthContext, Branch, Customer, InMemoryBank, Loan, LoanApplication, LoanDetails,
    LoanService, LoanType, Money, Rate, Role, SafeTimeProvider, TimeSource,
};

pub struct Harness {
    pub service: LoanService,
    pub bank: Arc<InMemoryBank>,
    pub time: Arc<SafeTimeProvider>,
}

/// two branches, one verified customer in each
pub fn harness() -> Harness {
    let bank = Arc::new(InMemoryBank::new());
    for (n, branch) in [(1_u64, "Motijheel"), (2, "Agrabad")] {
        bank.add_customer(Customer {
            customer_id: format!("CUST-{n}"),
            name: format!("Customer {n}"),
            status: CustomerStatus::Active,
            kyc_status: KycStatus::Verified,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 6, 20),
        });
        bank.open_account(
            Account {
                account_id: n,
                account_number: format!("ACC-{n}"),
                customer_id: format!("CUST-{n}"),
                status: AccountStatus::Active,
                branch: Branch {
                    id: n,
                    name: branch.to_string(),
                },
            },
            Money::from_major(100_000),
        );
    }

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
    )));
    let service = LoanService::builder()
        .bank(bank.clone())
        .set_time(time.clone())
        .build()
        .unwrap();
    Harness { service, bank, time }
}

pub fn application(customer: u64, amount: i64, rate_percent: u32, months: u32) -> LoanApplication {
    LoanApplication {
        customer_id: format!("CUST-{customer}"),
        account_number: format!("ACC-{customer}"),
        loan_type: LoanType::Personal,
        requested_amount: Money::from_major(amount),
        annual_interest_rate: Rate::from_percentage(rate_percent),
        tenure_months: months,
        monthly_income: Money::from_major(10_000),
        details: LoanDetails::default(),
    }
}

pub fn manager(branch: u64) -> AuthContext {
    AuthContext::staff(format!("manager-{branch}"), Role::BranchManager, branch)
}

pub fn officer(branch: u64) -> AuthContext {
    AuthContext::staff(format!("officer-{branch}"), Role::LoanOfficer, branch)
}

pub fn customer(n: u64) -> AuthContext {
    AuthContext::customer(format!("CUST-{n}"))
}

/// apply, approve and disburse the full amount
pub fn active_loan(h: &Harness, customer_no: u64, amount: i64, rate_percent: u32, months: u32) -> Loan {
    let loan = h
        .service
        .apply(application(customer_no, amount, rate_percent, months), &customer(customer_no))
        .unwrap();
    h.service
        .approve(&loan.loan_id, None, None, &manager(customer_no))
        .unwrap();
    h.service
        .disburse(
            &loan.loan_id,
            &format!("ACC-{customer_no}"),
            Money::from_major(amount),
            &officer(customer_no),
        )
        .unwrap()
}
