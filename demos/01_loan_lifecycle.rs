/// loan lifecycle - apply, approve, disburse, repay and foreclose
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use retail_loan_engine::types::{AccountStatus, CustomerStatus, KycStatus};
use retail_loan_engine::{
    Account, AuthContext, Branch, Customer, InMemoryBank, LoanApplication, LoanDetails, LoanService,
    LoanType, Money, PaymentMode, Rate, Role, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();
    println!("=== loan lifecycle ===\n");

    let bank = Arc::new(InMemoryBank::new());
    bank.add_customer(Customer {
        customer_id: "CUST-100".into(),
        name: "Nadia Karim".into(),
        status: CustomerStatus::Active,
        kyc_status: KycStatus::Verified,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 3, 12),
    });
    bank.open_account(
        Account {
            account_id: 100,
            account_number: "SAV-100".into(),
            customer_id: "CUST-100".into(),
            status: AccountStatus::Active,
            branch: Branch { id: 7, name: "Dhanmondi".into() },
        },
        Money::from_major(25_000),
    );

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let service = LoanService::builder().bank(bank.clone()).set_time(time.clone()).build()?;

    let borrower = AuthContext::customer("CUST-100");
    let manager = AuthContext::staff("manager-7", Role::BranchManager, 7);

    // 1. application
    let loan = service.apply(
        LoanApplication {
            customer_id: "CUST-100".into(),
            account_number: "SAV-100".into(),
            loan_type: LoanType::Personal,
            requested_amount: Money::from_major(120_000),
            annual_interest_rate: Rate::from_percentage(11),
            tenure_months: 36,
            monthly_income: Money::from_major(9_000),
            details: LoanDetails::default(),
        },
        &borrower,
    )?;
    println!("applied: {} emi {} score {}", loan.loan_id, loan.monthly_emi, loan.eligibility_score);

    // 2. approval and disbursement
    service.approve(&loan.loan_id, Some("salary account lien".into()), None, &manager)?;
    service.disburse(&loan.loan_id, "SAV-100", Money::from_major(120_000), &manager)?;
    println!("disbursed, account balance {}", bank.balance("SAV-100").unwrap_or_default());

    // 3. six months of on-time payments
    for _ in 0..6 {
        controller.advance(Duration::days(31));
        let statement = service.get_statement(&loan.loan_id, &borrower)?;
        if let Some(next) = statement.next_installment {
            let receipt = service.repay(&loan.loan_id, next.amount, next.due_date, PaymentMode::AutoDebit, &borrower)?;
            println!(
                "  paid #{} on {}: outstanding {}",
                next.installment_number, next.due_date, receipt.outstanding_balance
            );
        }
    }

    // 4. early settlement
    let quote = service.foreclosure_quote(&loan.loan_id, &borrower)?;
    println!(
        "\nforeclosure quote: settle {} (prepayment charge {} waived)",
        quote.settlement_amount, quote.prepayment_charge
    );
    let receipt = service.foreclose(&loan.loan_id, "SAV-100", time.now().date_naive(), &borrower)?;
    println!("foreclosed {} installments", receipt.installments_settled);

    let statement = service.get_statement(&loan.loan_id, &borrower)?;
    println!("\nfinal status: {:?}", statement.loan.loan_status);
    println!("total paid: {}", statement.total_paid);
    println!("interest paid: {}", statement.total_interest_paid);

    Ok(())
}
