/// eligibility - scoring applications against the default rules
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use retail_loan_engine::types::{AccountStatus, Collateral, CustomerStatus, KycStatus};
use retail_loan_engine::{
    Account, AuthContext, Branch, Customer, EngineConfig, InMemoryBank, LoanApplication, LoanDetails,
    LoanService, LoanType, Money, Rate, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();
    println!("=== eligibility ===\n");

    let bank = Arc::new(InMemoryBank::new());
    bank.add_customer(Customer {
        customer_id: "CUST-300".into(),
        name: "Tania Akter".into(),
        status: CustomerStatus::Active,
        kyc_status: KycStatus::Pending,
        date_of_birth: NaiveDate::from_ymd_opt(1995, 8, 30),
    });
    bank.open_account(
        Account {
            account_id: 300,
            account_number: "SAV-300".into(),
            customer_id: "CUST-300".into(),
            status: AccountStatus::Active,
            branch: Branch { id: 1, name: "Gulshan".into() },
        },
        Money::from_major(1_000),
    );

    let config = EngineConfig::default();
    println!("rules:\n{}\n", config.to_json());

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    )));
    let service = LoanService::builder()
        .config(config)
        .bank(bank)
        .set_time(time)
        .build()?;
    let borrower = AuthContext::customer("CUST-300");

    let cases = [
        ("unsecured personal", LoanType::Personal, 80_000, None),
        ("home with thin collateral", LoanType::Home, 400_000, Some(420_000)),
        ("home without collateral", LoanType::Home, 400_000, None),
    ];

    for (label, loan_type, amount, collateral) in cases {
        let application = LoanApplication {
            customer_id: "CUST-300".into(),
            account_number: "SAV-300".into(),
            loan_type,
            requested_amount: Money::from_major(amount),
            annual_interest_rate: Rate::from_percentage(10),
            tenure_months: 120,
            monthly_income: Money::from_major(4_500),
            details: LoanDetails {
                collateral: collateral.map(|value| Collateral {
                    collateral_type: "property".into(),
                    value: Money::from_major(value),
                    description: None,
                }),
                ..LoanDetails::default()
            },
        };
        let result = service.check_eligibility(&application, &borrower)?;
        println!("{label}:");
        println!("  eligible: {} score {} ({:?})", result.is_eligible, result.score, result.risk_rating);
        println!("  emi {} dti {}% ltv {}%", result.proposed_emi, result.dti_ratio, result.ltv_ratio);
        println!("  recommended {} at {}", result.recommended_amount, result.recommended_rate);
        for reason in &result.reasons {
            println!("  - {reason}");
        }
        println!();
    }

    Ok(())
}
