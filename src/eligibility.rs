use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::AmortizationCalculator;
use crate::bank::{Account, Customer};
use crate::config::{EligibilityRules, RateTiers};
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::types::{AccountStatus, CustomerStatus, KycStatus, LoanDetails, LoanStatus, LoanType, RiskRating};

const MAX_TENURE_MONTHS: u32 = 480;

// deductions per failed rule
const INACTIVE_CUSTOMER: i32 = 100;
const KYC_NOT_VERIFIED: i32 = 30;
const AGE_OUT_OF_RANGE: i32 = 25;
const LOW_INCOME: i32 = 20;
const HIGH_DTI: i32 = 30;
const MISSING_COLLATERAL: i32 = 40;
const HIGH_LTV: i32 = 25;
const THIN_COLLATERAL: i32 = 20;
const PRIOR_DEFAULT: i32 = 50;
const FOREIGN_ACCOUNT: i32 = 100;
const INACTIVE_ACCOUNT: i32 = 30;

/// a request for a new loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub customer_id: String,
    pub account_number: String,
    pub loan_type: LoanType,
    pub requested_amount: Money,
    pub annual_interest_rate: Rate,
    pub tenure_months: u32,
    pub monthly_income: Money,
    pub details: LoanDetails,
}

impl LoanApplication {
    /// shape checks done before anything is looked up
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(LoanError::invalid_input("customer id is required"));
        }
        if self.account_number.trim().is_empty() {
            return Err(LoanError::invalid_input("account number is required"));
        }
        if !self.requested_amount.is_positive() {
            return Err(LoanError::invalid_input("requested amount must be positive"));
        }
        if !self.annual_interest_rate.is_positive() {
            return Err(LoanError::invalid_input("interest rate must be positive"));
        }
        if self.tenure_months == 0 || self.tenure_months > MAX_TENURE_MONTHS {
            return Err(LoanError::invalid_input(format!(
                "tenure must be between 1 and {MAX_TENURE_MONTHS} months"
            )));
        }
        if self.monthly_income.is_negative() {
            return Err(LoanError::invalid_input("monthly income cannot be negative"));
        }
        if self.details.collateral_value().is_negative() {
            return Err(LoanError::invalid_input("collateral value cannot be negative"));
        }
        Ok(())
    }
}

/// outcome of scoring an application; not persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub is_eligible: bool,
    pub score: u32,
    pub reasons: Vec<String>,
    pub recommended_amount: Money,
    pub recommended_rate: Rate,
    pub risk_rating: RiskRating,
    pub proposed_emi: Money,
    pub dti_ratio: Decimal,
    pub ltv_ratio: Decimal,
}

/// what the evaluator reads about the applicant
#[derive(Debug, Clone, Copy)]
pub struct EligibilityInputs<'a> {
    pub customer: &'a Customer,
    pub account: &'a Account,
    /// every loan the customer holds, any status
    pub existing_loans: &'a [Loan],
    pub today: NaiveDate,
}

/// scores applications against the fixed rule set
pub struct EligibilityEvaluator<'a> {
    rules: &'a EligibilityRules,
    rate_tiers: &'a RateTiers,
}

impl<'a> EligibilityEvaluator<'a> {
    pub fn new(rules: &'a EligibilityRules, rate_tiers: &'a RateTiers) -> Self {
        Self { rules, rate_tiers }
    }

    pub fn check_eligibility(
        &self,
        application: &LoanApplication,
        inputs: &EligibilityInputs<'_>,
    ) -> Result<EligibilityResult> {
        application.validate()?;

        let mut scorecard = Scorecard::new();
        let customer = inputs.customer;
        let account = inputs.account;
        let amount = application.requested_amount;
        let income = application.monthly_income;

        if customer.status != CustomerStatus::Active {
            scorecard.fail(INACTIVE_CUSTOMER, "Customer account is not active");
        }

        if customer.kyc_status != KycStatus::Verified {
            scorecard.fail(KYC_NOT_VERIFIED, "KYC verification is not complete");
        }

        match customer.date_of_birth.map(|dob| age_on(dob, inputs.today)) {
            Some(age) if (self.rules.min_age..=self.rules.max_age).contains(&age) => {}
            Some(age) => scorecard.fail(
                AGE_OUT_OF_RANGE,
                format!(
                    "Age {age} is outside the eligible range of {}-{} years",
                    self.rules.min_age, self.rules.max_age
                ),
            ),
            None => scorecard.fail(AGE_OUT_OF_RANGE, "Date of birth is not on record"),
        }

        if income < self.rules.min_monthly_income {
            scorecard.fail(
                LOW_INCOME,
                format!(
                    "Monthly income {income} is below the minimum of {}",
                    self.rules.min_monthly_income
                ),
            );
        }

        let proposed_emi = AmortizationCalculator::calculate_emi(
            amount,
            application.annual_interest_rate,
            application.tenure_months,
        )?;
        let existing_emi: Money = inputs
            .existing_loans
            .iter()
            .filter(|loan| loan.is_committed())
            .map(|loan| loan.monthly_emi)
            .sum();
        let dti_ratio = AmortizationCalculator::calculate_dti(existing_emi + proposed_emi, income);
        if dti_ratio > self.rules.max_dti_percent {
            scorecard.fail(
                HIGH_DTI,
                format!(
                    "Debt-to-income ratio {dti_ratio}% exceeds {}%",
                    self.rules.max_dti_percent
                ),
            );
        }

        let collateral_value = application.details.collateral_value();
        let secured = self.rules.is_secured(application.loan_type);
        let ltv_ratio = AmortizationCalculator::calculate_ltv(amount, collateral_value);
        if secured && collateral_value.is_zero() {
            scorecard.fail(
                MISSING_COLLATERAL,
                format!("{:?} loans require collateral", application.loan_type),
            );
        }
        if ltv_ratio > self.rules.max_ltv_percent {
            scorecard.fail(
                HIGH_LTV,
                format!(
                    "Loan-to-value ratio {ltv_ratio}% exceeds {}%",
                    self.rules.max_ltv_percent
                ),
            );
        }
        if secured && collateral_value.is_positive() {
            let required = amount.percentage(self.rules.min_collateral_coverage_percent);
            if collateral_value < required {
                scorecard.fail(
                    THIN_COLLATERAL,
                    format!(
                        "Collateral value {collateral_value} is below the required {required}"
                    ),
                );
            }
        }

        if inputs
            .existing_loans
            .iter()
            .any(|loan| loan.loan_status == LoanStatus::Defaulted)
        {
            scorecard.fail(PRIOR_DEFAULT, "Customer has a defaulted loan");
        }

        if account.customer_id != customer.customer_id {
            scorecard.fail(FOREIGN_ACCOUNT, "Account does not belong to the customer");
        }

        if account.status != AccountStatus::Active {
            scorecard.fail(INACTIVE_ACCOUNT, "Linked account is not active");
        }

        let score = scorecard.score();
        let is_eligible = score >= self.rules.passing_score && scorecard.reasons.is_empty();

        Ok(EligibilityResult {
            is_eligible,
            score,
            recommended_amount: self.recommended_amount(application, existing_emi)?,
            recommended_rate: Rate::from_percent(self.rate_tiers.rate_for_score(score)),
            risk_rating: risk_rating(score),
            proposed_emi,
            dti_ratio,
            ltv_ratio,
            reasons: scorecard.reasons,
        })
    }

    /// principal whose EMI fits the affordable share of income
    fn recommended_amount(&self, application: &LoanApplication, existing_emi: Money) -> Result<Money> {
        let affordable_emi =
            application.monthly_income.percentage(self.rules.affordability_percent) - existing_emi;
        if !affordable_emi.is_positive() {
            return Ok(Money::ZERO);
        }
        AmortizationCalculator::principal_for_emi(
            affordable_emi,
            application.annual_interest_rate,
            application.tenure_months,
        )
    }
}

pub fn risk_rating(score: u32) -> RiskRating {
    match score {
        90.. => RiskRating::Low,
        75..=89 => RiskRating::Moderate,
        60..=74 => RiskRating::High,
        _ => RiskRating::VeryHigh,
    }
}

/// completed years between birth and `on`
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

struct Scorecard {
    score: i32,
    reasons: Vec<String>,
}

impl Scorecard {
    fn new() -> Self {
        Self {
            score: 100,
            reasons: Vec::new(),
        }
    }

    fn fail(&mut self, deduction: i32, reason: impl Into<String>) {
        self.score -= deduction;
        self.reasons.push(reason.into());
    }

    fn score(&self) -> u32 {
        self.score.max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Branch;
    use crate::types::Collateral;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn customer() -> Customer {
        Customer {
            customer_id: "CUST-1".into(),
            name: "Test Customer".into(),
            status: CustomerStatus::Active,
            kyc_status: KycStatus::Verified,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 15),
        }
    }

    fn account() -> Account {
        Account {
            account_id: 1,
            account_number: "ACC-1".into(),
            customer_id: "CUST-1".into(),
            status: AccountStatus::Active,
            branch: Branch {
                id: 1,
                name: "Main".into(),
            },
        }
    }

    fn application(loan_type: LoanType, amount: i64, collateral: Option<i64>) -> LoanApplication {
        LoanApplication {
            customer_id: "CUST-1".into(),
            account_number: "ACC-1".into(),
            loan_type,
            requested_amount: Money::from_major(amount),
            annual_interest_rate: Rate::from_percentage(9),
            tenure_months: 60,
            monthly_income: Money::from_major(10_000),
            details: LoanDetails {
                collateral: collateral.map(|value| Collateral {
                    collateral_type: "property".into(),
                    value: Money::from_major(value),
                    description: None,
                }),
                ..LoanDetails::default()
            },
        }
    }

    fn evaluate(app: &LoanApplication, customer: &Customer, account: &Account, loans: &[Loan]) -> EligibilityResult {
        let rules = EligibilityRules::default();
        let tiers = RateTiers::default();
        EligibilityEvaluator::new(&rules, &tiers)
            .check_eligibility(
                app,
                &EligibilityInputs {
                    customer,
                    account,
                    existing_loans: loans,
                    today: today(),
                },
            )
            .unwrap()
    }

    fn existing_loan(status: LoanStatus, emi: i64) -> Loan {
        let mut loan = Loan::new(
            "CUST-1".into(),
            "ACC-1".into(),
            LoanType::Personal,
            Money::from_major(10_000),
            Rate::from_percentage(10),
            12,
            Money::from_major(emi),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        );
        loan.loan_status = status;
        loan
    }

    #[test]
    fn test_clean_application_is_eligible() {
        let result = evaluate(&application(LoanType::Personal, 100_000, None), &customer(), &account(), &[]);
        assert!(result.is_eligible);
        assert_eq!(result.score, 100);
        assert!(result.reasons.is_empty());
        assert_eq!(result.risk_rating, RiskRating::Low);
        assert_eq!(result.recommended_rate, Rate::from_percent(dec!(7.5)));
        assert_eq!(result.proposed_emi, Money::from_decimal(dec!(2075.84)));
    }

    #[test]
    fn test_inactive_customer_always_fails() {
        let mut c = customer();
        c.status = CustomerStatus::Suspended;
        let result = evaluate(&application(LoanType::Personal, 100_000, None), &c, &account(), &[]);
        assert!(!result.is_eligible);
        assert_eq!(result.score, 0);
        assert_eq!(result.reasons.len(), 1);
        assert_eq!(result.risk_rating, RiskRating::VeryHigh);
        assert_eq!(result.recommended_rate, Rate::from_percent(dec!(11.5)));
    }

    #[test]
    fn test_single_soft_failure_still_disqualifies() {
        // kyc alone leaves a passing score of 70 but records a reason
        let mut c = customer();
        c.kyc_status = KycStatus::Pending;
        let result = evaluate(&application(LoanType::Personal, 100_000, None), &c, &account(), &[]);
        assert_eq!(result.score, 70);
        assert!(!result.is_eligible);
        assert_eq!(result.reasons, vec!["KYC verification is not complete".to_string()]);
    }

    #[test]
    fn test_age_window() {
        let mut c = customer();
        c.date_of_birth = NaiveDate::from_ymd_opt(2004, 6, 2);
        let result = evaluate(&application(LoanType::Personal, 50_000, None), &c, &account(), &[]);
        assert_eq!(result.score, 75);
        assert!(result.reasons[0].contains("Age 19"));

        c.date_of_birth = None;
        let result = evaluate(&application(LoanType::Personal, 50_000, None), &c, &account(), &[]);
        assert_eq!(result.score, 75);
    }

    #[test]
    fn test_dti_counts_existing_obligations() {
        // proposed emi ~2075.84 on 10k income; 3000 of existing emi pushes past 50%
        let loans = vec![existing_loan(LoanStatus::Active, 3_000), existing_loan(LoanStatus::Closed, 9_000)];
        let result = evaluate(&application(LoanType::Personal, 100_000, None), &customer(), &account(), &loans);
        assert_eq!(result.dti_ratio, dec!(50.76));
        assert_eq!(result.score, 70);
        assert!(!result.is_eligible);
    }

    #[test]
    fn test_secured_loan_collateral_rules() {
        let no_collateral = evaluate(&application(LoanType::Home, 100_000, None), &customer(), &account(), &[]);
        assert_eq!(no_collateral.score, 60);
        assert_eq!(no_collateral.reasons.len(), 1);

        // 110k of collateral: ltv 90.91% and coverage below 120%
        let thin = evaluate(&application(LoanType::Home, 100_000, Some(110_000)), &customer(), &account(), &[]);
        assert_eq!(thin.ltv_ratio, dec!(90.91));
        assert_eq!(thin.score, 55);
        assert_eq!(thin.reasons.len(), 2);

        let ample = evaluate(&application(LoanType::Home, 100_000, Some(150_000)), &customer(), &account(), &[]);
        assert!(ample.is_eligible);
        assert_eq!(ample.ltv_ratio, dec!(66.67));
    }

    #[test]
    fn test_unsecured_loan_ignores_missing_collateral() {
        let result = evaluate(&application(LoanType::Personal, 100_000, None), &customer(), &account(), &[]);
        assert_eq!(result.ltv_ratio, Decimal::ZERO);
        assert!(result.is_eligible);
    }

    #[test]
    fn test_prior_default_and_account_checks() {
        let loans = vec![existing_loan(LoanStatus::Defaulted, 500)];
        let mut acc = account();
        acc.status = AccountStatus::Frozen;
        let result = evaluate(&application(LoanType::Personal, 10_000, None), &customer(), &acc, &loans);
        assert_eq!(result.score, 20);
        assert_eq!(result.reasons.len(), 2);

        let mut foreign = account();
        foreign.customer_id = "CUST-2".into();
        let result = evaluate(&application(LoanType::Personal, 10_000, None), &customer(), &foreign, &[]);
        assert_eq!(result.score, 0);
        assert!(!result.is_eligible);
    }

    #[test]
    fn test_recommended_amount_fits_affordable_emi() {
        let loans = vec![existing_loan(LoanStatus::Active, 1_000)];
        let app = application(LoanType::Personal, 100_000, None);
        let result = evaluate(&app, &customer(), &account(), &loans);

        // 40% of 10k less 1k existing leaves 3k of emi headroom
        let emi = AmortizationCalculator::calculate_emi(result.recommended_amount, app.annual_interest_rate, 60).unwrap();
        assert!((emi - Money::from_major(3_000)).abs() <= Money::CENT);

        let broke = vec![existing_loan(LoanStatus::Active, 5_000)];
        assert_eq!(evaluate(&app, &customer(), &account(), &broke).recommended_amount, Money::ZERO);
    }

    #[test]
    fn test_invalid_application_shape() {
        let rules = EligibilityRules::default();
        let tiers = RateTiers::default();
        let mut app = application(LoanType::Personal, 10_000, None);
        app.tenure_months = 0;
        let c = customer();
        let a = account();
        let err = EligibilityEvaluator::new(&rules, &tiers)
            .check_eligibility(
                &app,
                &EligibilityInputs {
                    customer: &c,
                    account: &a,
                    existing_loans: &[],
                    today: today(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidInput { .. }));
    }

    #[test]
    fn test_risk_rating_steps() {
        assert_eq!(risk_rating(100), RiskRating::Low);
        assert_eq!(risk_rating(90), RiskRating::Low);
        assert_eq!(risk_rating(89), RiskRating::Moderate);
        assert_eq!(risk_rating(75), RiskRating::Moderate);
        assert_eq!(risk_rating(74), RiskRating::High);
        assert_eq!(risk_rating(60), RiskRating::High);
        assert_eq!(risk_rating(59), RiskRating::VeryHigh);
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = NaiveDate::from_ymd_opt(2000, 6, 1).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2021, 5, 31).unwrap()), 20);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()), 21);
    }
}
