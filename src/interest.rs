use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::account::AccountSnapshot;
use crate::decimal::{Money, Rate};
use crate::types::PaymentMode;

/// per-period interest and fines formulas, injected so the schedule loop
/// stays independent of the rate policy in force
pub trait InterestPolicy: Send + Sync {
    /// one period's interest on the given base amount
    fn interest(&self, base: Money, rate: Rate, mode: PaymentMode) -> Money;

    /// fines for a period that skipped `days_skipped` days
    fn fines(
        &self,
        principal: Money,
        account: &AccountSnapshot,
        days_skipped: u32,
        mode: PaymentMode,
    ) -> Money;
}

/// production rate policy: a 30-day month underlies every sub-monthly
/// divisor, and modes longer than a month scale the monthly rate
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPolicy;

impl StandardPolicy {
    /// per-period multiplier for a monthly percentage rate
    fn period_fraction(rate: Rate, mode: PaymentMode) -> Decimal {
        let monthly = rate.as_fraction();
        match mode {
            PaymentMode::Monthly | PaymentMode::Lumpsum => monthly,
            PaymentMode::Daily | PaymentMode::FixedDays => monthly / dec!(30),
            PaymentMode::SemiMonthly => monthly / dec!(30) * dec!(15),
            PaymentMode::Weekly => monthly / dec!(30) * dec!(7),
            PaymentMode::Quarterly => monthly * dec!(3),
            PaymentMode::SemiAnnual => monthly * dec!(6),
        }
    }

    /// days skipped expressed in the mode's period length
    fn periods_skipped(days_skipped: u32, mode: PaymentMode) -> Decimal {
        let days = Decimal::from(days_skipped);
        match mode {
            PaymentMode::Daily | PaymentMode::FixedDays => days,
            PaymentMode::Weekly => days / dec!(7),
            PaymentMode::SemiMonthly => days / dec!(15),
            PaymentMode::Monthly => days / dec!(30),
            PaymentMode::Quarterly => days / dec!(90),
            PaymentMode::SemiAnnual => days / dec!(180),
            PaymentMode::Lumpsum => Decimal::ONE,
        }
    }
}

impl InterestPolicy for StandardPolicy {
    fn interest(&self, base: Money, rate: Rate, mode: PaymentMode) -> Money {
        (base * Self::period_fraction(rate, mode)).round_centavos()
    }

    fn fines(
        &self,
        principal: Money,
        account: &AccountSnapshot,
        days_skipped: u32,
        mode: PaymentMode,
    ) -> Money {
        if days_skipped == 0 {
            return Money::ZERO;
        }

        // amortization rate within the first 30 skipped days, maturity after
        let mut fines_rate = if days_skipped > 30 {
            account.fines_maturity
        } else {
            account.fines_amortization
        };
        if mode == PaymentMode::Lumpsum {
            fines_rate = if account.fines_maturity.is_chargeable() {
                account.fines_maturity
            } else {
                account.fines_amortization
            };
        }
        if !fines_rate.is_chargeable() {
            return Money::ZERO;
        }

        if !account.no_grace_period_daily {
            let grace = account.grace_periods.percentage_for(mode);
            if grace >= dec!(100) {
                return Money::ZERO;
            }
            if grace > Decimal::ZERO {
                let discounted = fines_rate.as_percentage() * (Decimal::ONE - grace / dec!(100));
                fines_rate = Rate::from_percentage(discounted);
            }
        }

        let periods = Self::periods_skipped(days_skipped, mode);
        (principal * fines_rate.as_fraction() * periods).round_centavos()
    }
}
