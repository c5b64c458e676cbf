use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::LoanType;

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub eligibility: EligibilityRules,
    pub rate_tiers: RateTiers,
    pub default_policy: DefaultPolicy,
    pub penalty_policy: PenaltyPolicy,
}

/// thresholds the eligibility rule set checks against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRules {
    /// minimum score for an application to pass
    pub passing_score: u32,
    pub min_age: u32,
    pub max_age: u32,
    pub min_monthly_income: Money,
    /// maximum debt-to-income ratio, in percent
    pub max_dti_percent: Decimal,
    /// maximum loan-to-value ratio, in percent
    pub max_ltv_percent: Decimal,
    /// minimum collateral value as a percent of the loan, secured types only
    pub min_collateral_coverage_percent: Decimal,
    /// share of income that may go to EMI when sizing the recommended amount
    pub affordability_percent: Decimal,
    pub secured_types: Vec<LoanType>,
}

/// score to recommended annual rate step function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTiers {
    /// (minimum score, annual rate percent), highest score first
    pub tiers: Vec<(u32, Decimal)>,
    /// rate for scores below every tier
    pub fallback_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultPolicy {
    /// installments unpaid longer than this push the loan into default
    pub overdue_days_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// monthly late penalty, in percent of the overdue installment
    pub late_penalty_rate_percent: Decimal,
    /// reported on foreclosure quotes only
    pub prepayment_charge_percent: Decimal,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            passing_score: 70,
            min_age: 21,
            max_age: 65,
            min_monthly_income: Money::from_major(1_000),
            max_dti_percent: dec!(50),
            max_ltv_percent: dec!(80),
            min_collateral_coverage_percent: dec!(120),
            affordability_percent: dec!(40),
            secured_types: vec![LoanType::Home, LoanType::Car, LoanType::Gold, LoanType::Industrial],
        }
    }
}

impl EligibilityRules {
    pub fn is_secured(&self, loan_type: LoanType) -> bool {
        self.secured_types.contains(&loan_type)
    }
}

impl Default for RateTiers {
    fn default() -> Self {
        Self {
            tiers: vec![(90, dec!(7.5)), (80, dec!(8.5)), (70, dec!(9.5))],
            fallback_percent: dec!(11.5),
        }
    }
}

impl RateTiers {
    /// recommended annual rate percent for a score
    pub fn rate_for_score(&self, score: u32) -> Decimal {
        self.tiers
            .iter()
            .find(|(min_score, _)| score >= *min_score)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.fallback_percent)
    }
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            overdue_days_threshold: 90,
        }
    }
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            late_penalty_rate_percent: dec!(2),
            prepayment_charge_percent: dec!(2),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            eligibility: EligibilityRules::default(),
            rate_tiers: RateTiers::default(),
            default_policy: DefaultPolicy::default(),
            penalty_policy: PenaltyPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// parse and validate a json configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| LoanError::Configuration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let rules = &self.eligibility;
        if rules.passing_score > 100 {
            return Err(config_error("passing score must be within 0..=100"));
        }
        if rules.min_age > rules.max_age {
            return Err(config_error("minimum age exceeds maximum age"));
        }
        if rules.affordability_percent <= Decimal::ZERO || rules.affordability_percent > dec!(100) {
            return Err(config_error("affordability percent must be within (0, 100]"));
        }
        if self
            .rate_tiers
            .tiers
            .windows(2)
            .any(|pair| pair[0].0 <= pair[1].0)
        {
            return Err(config_error("rate tiers must be ordered by descending score"));
        }
        if self.default_policy.overdue_days_threshold == 0 {
            return Err(config_error("overdue days threshold must be positive"));
        }
        if self.penalty_policy.late_penalty_rate_percent < Decimal::ZERO
            || self.penalty_policy.prepayment_charge_percent < Decimal::ZERO
        {
            return Err(config_error("penalty rates cannot be negative"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> LoanError {
    LoanError::Configuration {
        message: message.to_string(),
    }
}
