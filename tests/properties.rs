mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;
use retail_loan_engine::schedule::{total_principal, RepaymentScheduleGenerator};
use retail_loan_engine::{AmortizationCalculator, Loan, LoanType, Money, PaymentMode, Rate};

use common::{active_loan, customer, harness};

fn loan_with(principal: i64, rate_percent: u32, months: u32) -> Loan {
    let rate = Rate::from_percentage(rate_percent);
    let principal = Money::from_major(principal);
    let emi = AmortizationCalculator::calculate_emi(principal, rate, months).unwrap();
    let mut loan = Loan::new(
        "CUST-1".into(),
        "ACC-1".into(),
        LoanType::Home,
        principal,
        rate,
        months,
        emi,
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
    );
    loan.actual_disbursement_date = NaiveDate::from_ymd_opt(2024, 1, 31);
    loan
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn schedule_amortizes_exactly(
        principal in 10_000_i64..5_000_000_i64,
        rate_percent in 1_u32..=18_u32,
        months in 1_u32..=120_u32
    ) {
        let loan = loan_with(principal, rate_percent, months);
        let schedule = RepaymentScheduleGenerator::generate(&loan, loan.application_date).unwrap();

        prop_assert_eq!(schedule.len(), months as usize);
        prop_assert_eq!(total_principal(&schedule), loan.principal);
        prop_assert_eq!(schedule[schedule.len() - 1].balance_after_payment, Money::ZERO);

        let (last, rest) = schedule.split_last().unwrap();
        for entry in rest {
            prop_assert_eq!(entry.total_amount, loan.monthly_emi);
            prop_assert_eq!(entry.principal_amount + entry.interest_amount, entry.total_amount);
        }
        prop_assert!(last.principal_amount.is_positive());
        prop_assert!((last.total_amount - loan.monthly_emi).abs() < Money::from_major(5));

        // month-end anchor clamps and never drifts
        for pair in schedule.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn emi_covers_principal(
        principal in 1_000_i64..10_000_000_i64,
        rate_percent in 1_u32..=30_u32,
        months in 1_u32..=360_u32
    ) {
        let rate = Rate::from_percentage(rate_percent);
        let principal = Money::from_major(principal);
        let emi = AmortizationCalculator::calculate_emi(principal, rate, months).unwrap();
        let total = AmortizationCalculator::calculate_total_amount(emi, months);
        prop_assert!(total >= principal);
        prop_assert!(emi <= principal + AmortizationCalculator::calculate_period_interest(principal, rate) + Money::CENT);

        let dearer = AmortizationCalculator::calculate_emi(principal, Rate::from_percentage(rate_percent + 1), months).unwrap();
        prop_assert!(dearer >= emi);
    }
}

proptest! {
    #![proptest_config(Config::with_cases(24))]
    #[test]
    fn repayments_keep_balance_reconciled(amounts in prop::collection::vec(1_i64..3_000_i64, 1..20)) {
        let h = harness();
        let loan = active_loan(&h, 1, 10_000, 12, 12);
        let pay_day = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let mut paid = Money::ZERO;

        for amount in amounts {
            let statement = h.service.get_statement(&loan.loan_id, &customer(1)).unwrap();
            let due = statement.loan.amount_due_to_close(&statement.schedule);
            if due.is_zero() {
                break;
            }
            let amount = Money::from_major(amount).min(due);
            h.service
                .repay(&loan.loan_id, amount, pay_day, PaymentMode::Online, &customer(1))
                .unwrap();
            paid += amount;

            let statement = h.service.get_statement(&loan.loan_id, &customer(1)).unwrap();
            prop_assert!(statement.loan.reconciles_with(&statement.schedule));
            prop_assert_eq!(statement.total_paid, paid);
            if let Some(next) = &statement.next_installment {
                prop_assert!(statement.suspense_balance < next.amount);
            }
        }
    }
}
