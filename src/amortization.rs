use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decimal::{round_half_up, Money, Rate};
use crate::errors::{LoanError, Result};

/// scale for ratios reported in percent
const RATIO_SCALE: u32 = 2;

/// days in the flat penalty month
const PENALTY_DAYS_PER_MONTH: u32 = 30;

/// reduce-balance amortization math; stateless
pub struct AmortizationCalculator;

impl AmortizationCalculator {
    /// EMI = P * r * (1 + r)^n / ((1 + r)^n - 1), r = annual percent / 1200
    pub fn calculate_emi(principal: Money, annual_rate: Rate, months: u32) -> Result<Money> {
        if !principal.is_positive() {
            return Err(LoanError::invalid_input("principal must be positive"));
        }
        if !annual_rate.is_positive() {
            return Err(LoanError::invalid_input("interest rate must be positive"));
        }
        if months == 0 {
            return Err(LoanError::invalid_input("tenure must be at least one month"));
        }

        let r = annual_rate.monthly_rate();
        let compound = compound_factor(r, months)?;
        let numerator = principal
            .as_decimal()
            .checked_mul(r)
            .and_then(|pr| pr.checked_mul(compound))
            .ok_or_else(out_of_range)?;
        let denominator = compound - Decimal::ONE;

        let emi = Money::from_decimal(numerator / denominator);
        if !emi.is_positive() {
            return Err(LoanError::invalid_input(format!(
                "principal {principal} is too small to amortize over {months} months"
            )));
        }
        Ok(emi)
    }

    /// largest principal an EMI can service; inverse of `calculate_emi`
    pub fn principal_for_emi(emi: Money, annual_rate: Rate, months: u32) -> Result<Money> {
        if !emi.is_positive() || months == 0 {
            return Ok(Money::ZERO);
        }
        let r = annual_rate.monthly_rate();
        if r.is_zero() {
            return Ok(emi * Decimal::from(months));
        }

        let compound = compound_factor(r, months)?;
        let numerator = emi
            .as_decimal()
            .checked_mul(compound - Decimal::ONE)
            .ok_or_else(out_of_range)?;
        let denominator = r.checked_mul(compound).ok_or_else(out_of_range)?;
        Ok(Money::from_decimal(numerator / denominator))
    }

    pub fn calculate_total_interest(emi: Money, months: u32, principal: Money) -> Money {
        Self::calculate_total_amount(emi, months) - principal
    }

    pub fn calculate_total_amount(emi: Money, months: u32) -> Money {
        emi * Decimal::from(months)
    }

    /// one month of interest on the outstanding balance
    pub fn calculate_period_interest(outstanding_balance: Money, annual_rate: Rate) -> Money {
        Money::from_decimal(outstanding_balance.as_decimal() * annual_rate.monthly_rate())
    }

    pub fn calculate_period_principal(emi: Money, period_interest: Money) -> Money {
        emi - period_interest
    }

    pub fn calculate_prepayment_charges(outstanding_balance: Money, charge_percent: Decimal) -> Money {
        outstanding_balance.percentage(charge_percent)
    }

    /// penalty_rate_percent is a monthly rate spread over a flat 30-day month
    pub fn calculate_late_penalty(
        overdue_amount: Money,
        penalty_rate_percent: Decimal,
        days_overdue: u32,
    ) -> Money {
        let monthly = overdue_amount.as_decimal() * penalty_rate_percent / dec!(100);
        let daily = monthly / Decimal::from(PENALTY_DAYS_PER_MONTH);
        Money::from_decimal(daily * Decimal::from(days_overdue))
    }

    pub fn calculate_outstanding_after_payment(current_outstanding: Money, principal_paid: Money) -> Money {
        current_outstanding - principal_paid
    }

    /// loan-to-value in percent; zero when there is no collateral
    pub fn calculate_ltv(loan_amount: Money, collateral_value: Money) -> Decimal {
        if collateral_value.is_zero() {
            return Decimal::ZERO;
        }
        round_half_up(
            loan_amount.as_decimal() * dec!(100) / collateral_value.as_decimal(),
            RATIO_SCALE,
        )
    }

    /// debt-to-income in percent; 100 when income is unknown
    pub fn calculate_dti(total_emi: Money, monthly_income: Money) -> Decimal {
        if monthly_income.is_zero() {
            return dec!(100);
        }
        round_half_up(
            total_emi.as_decimal() * dec!(100) / monthly_income.as_decimal(),
            RATIO_SCALE,
        )
    }
}

/// (1 + r)^n at full decimal precision
fn compound_factor(r: Decimal, months: u32) -> Result<Decimal> {
    let base = Decimal::ONE + r;
    let mut compound = Decimal::ONE;
    for _ in 0..months {
        compound = compound.checked_mul(base).ok_or_else(out_of_range)?;
    }
    Ok(compound)
}

fn out_of_range() -> LoanError {
    LoanError::invalid_input("rate and tenure compound beyond the supported range")
}
