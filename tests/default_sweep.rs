mod common;

use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;
use retail_loan_engine::events::LoanEvent;
use retail_loan_engine::{AuthContext, InstallmentStatus, LoanStatus, Money, PaymentMode};

use common::{active_loan, customer, harness, officer};

#[test]
fn sweep_defaults_loans_past_threshold() {
    let h = harness();
    let late = active_loan(&h, 1, 20_000, 10, 12);
    let current = active_loan(&h, 2, 20_000, 10, 12);

    // the second borrower keeps up with the first installment
    let first = h.service.store().get(&current.loan_id).unwrap().schedule[0].clone();
    h.service
        .repay(&current.loan_id, first.total_amount, first.due_date, PaymentMode::AutoDebit, &customer(2))
        .unwrap();

    // 2024-01-15 + 130 days, cutoff 2024-02-24
    h.time.test_control().unwrap().advance(Duration::days(130));
    let report = h.service.run_default_sweep(&AuthContext::system()).unwrap();

    assert_eq!(report.cutoff, NaiveDate::from_ymd_opt(2024, 2, 24).unwrap());
    assert_eq!(report.examined, 2);
    assert_eq!(report.defaulted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.defaulted_loans, vec![late.loan_id.clone()]);

    let record = h.service.store().get(&late.loan_id).unwrap();
    assert_eq!(record.loan.loan_status, LoanStatus::Defaulted);
    assert_eq!(record.schedule[0].status, InstallmentStatus::Overdue);
    assert_eq!(record.schedule[1].status, InstallmentStatus::Pending);
    assert_eq!(record.loan.remarks.len(), 1);
    assert!(matches!(
        record.events.events().last(),
        Some(LoanEvent::Defaulted { overdue_installments: 1, .. })
    ));

    let untouched = h.service.store().get(&current.loan_id).unwrap();
    assert_eq!(untouched.loan.loan_status, LoanStatus::Active);

    // defaulted loans no longer take repayments
    let next_due = record.schedule[0].due_date;
    assert!(h
        .service
        .repay(&late.loan_id, late.monthly_emi, next_due, PaymentMode::Cash, &customer(1))
        .is_err());
}

#[test]
fn sweep_is_idempotent() {
    let h = harness();
    active_loan(&h, 1, 20_000, 10, 12);
    h.time.test_control().unwrap().advance(Duration::days(200));

    let first = h.service.run_default_sweep(&AuthContext::system()).unwrap();
    assert_eq!(first.defaulted, 1);

    let second = h.service.run_default_sweep(&AuthContext::system()).unwrap();
    assert_eq!(second.examined, 0);
    assert_eq!(second.defaulted, 0);
}

#[test]
fn branch_staff_sweep_only_their_branch() {
    let h = harness();
    let branch_one = active_loan(&h, 1, 20_000, 10, 12);
    let branch_two = active_loan(&h, 2, 20_000, 10, 12);
    h.time.test_control().unwrap().advance(Duration::days(200));

    let report = h.service.run_default_sweep(&officer(2)).unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.defaulted_loans, vec![branch_two.loan_id]);

    let record = h.service.store().get(&branch_one.loan_id).unwrap();
    assert_eq!(record.loan.loan_status, LoanStatus::Active);
}

#[test]
fn unreconciled_loan_fails_without_stopping_the_sweep() {
    let h = harness();
    let broken = active_loan(&h, 1, 20_000, 10, 12);
    let good = active_loan(&h, 2, 20_000, 10, 12);

    h.service
        .store()
        .update(&broken.loan_id, |record| {
            record.loan.outstanding_balance = Money::ONE;
            Ok(())
        })
        .unwrap();
    h.time.test_control().unwrap().advance(Duration::days(200));

    let report = h.service.run_default_sweep(&AuthContext::system()).unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.defaulted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.defaulted_loans, vec![good.loan_id.clone()]);

    let record = h.service.store().get(&good.loan_id).unwrap();
    assert_eq!(record.loan.loan_status, LoanStatus::Defaulted);

    // the failed loan was rolled back untouched
    let record = h.service.store().get(&broken.loan_id).unwrap();
    assert_eq!(record.loan.loan_status, LoanStatus::Active);
    assert!(record.schedule.iter().all(|e| e.status == InstallmentStatus::Pending));
}

#[test]
fn branch_sweep_counts_loans_with_missing_accounts_as_failed() {
    let h = harness();
    let orphan = active_loan(&h, 1, 20_000, 10, 12);
    active_loan(&h, 2, 20_000, 10, 12);

    h.service
        .store()
        .update(&orphan.loan_id, |record| {
            record.loan.account_number = "ACC-404".into();
            Ok(())
        })
        .unwrap();
    h.time.test_control().unwrap().advance(Duration::days(200));

    let report = h.service.run_default_sweep(&officer(1)).unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.defaulted, 0);

    let record = h.service.store().get(&orphan.loan_id).unwrap();
    assert_eq!(record.loan.loan_status, LoanStatus::Active);

    // the system principal does not need the account to scope the loan
    let report = h.service.run_default_sweep(&AuthContext::system()).unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.defaulted, 2);
}
