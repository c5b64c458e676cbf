/// default sweep - missed installments push a loan into default
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use retail_loan_engine::types::{AccountStatus, CustomerStatus, KycStatus};
use retail_loan_engine::{
    Account, AuthContext, Branch, Customer, InMemoryBank, LoanApplication, LoanDetails, LoanService,
    LoanType, Money, Rate, Role, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();
    println!("=== default sweep ===\n");

    let bank = Arc::new(InMemoryBank::new());
    bank.add_customer(Customer {
        customer_id: "CUST-200".into(),
        name: "Rafiq Hasan".into(),
        status: CustomerStatus::Active,
        kyc_status: KycStatus::Verified,
        date_of_birth: NaiveDate::from_ymd_opt(1979, 11, 2),
    });
    bank.open_account(
        Account {
            account_id: 200,
            account_number: "CUR-200".into(),
            customer_id: "CUST-200".into(),
            status: AccountStatus::Active,
            branch: Branch { id: 3, name: "Sylhet".into() },
        },
        Money::ZERO,
    );

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let service = LoanService::builder().bank(bank).set_time(time.clone()).build()?;
    let officer = AuthContext::staff("officer-3", Role::LoanOfficer, 3);

    let loan = service.apply(
        LoanApplication {
            customer_id: "CUST-200".into(),
            account_number: "CUR-200".into(),
            loan_type: LoanType::Car,
            requested_amount: Money::from_major(40_000),
            annual_interest_rate: Rate::from_percentage(9),
            tenure_months: 24,
            monthly_income: Money::from_major(6_000),
            details: LoanDetails {
                collateral: Some(retail_loan_engine::types::Collateral {
                    collateral_type: "vehicle".into(),
                    value: Money::from_major(60_000),
                    description: Some("2023 sedan".into()),
                }),
                ..LoanDetails::default()
            },
        },
        &officer,
    )?;
    service.approve(&loan.loan_id, None, None, &officer)?;
    service.disburse(&loan.loan_id, "CUR-200", Money::from_major(40_000), &officer)?;
    println!("loan {} disbursed on {}", loan.loan_id, time.now().format("%Y-%m-%d"));

    // nobody pays; sweep every month
    for _ in 0..5 {
        controller.advance(Duration::days(30));
        let report = service.run_default_sweep(&AuthContext::system())?;
        println!(
            "{}: examined {} defaulted {} (cutoff {})",
            time.now().format("%Y-%m-%d"),
            report.examined,
            report.defaulted,
            report.cutoff
        );
    }

    let statement = service.get_statement(&loan.loan_id, &officer)?;
    println!("\nstatus: {:?}", statement.loan.loan_status);
    println!("overdue installments: {}", statement.installments_overdue);
    for remark in &statement.loan.remarks {
        println!("remark: {remark}");
    }

    Ok(())
}
