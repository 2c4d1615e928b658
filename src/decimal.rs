use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};
use std::str::FromStr;

/// Money type with 8 decimal places of working precision; financial results
/// are rounded to centavos (2 places) at computation boundaries only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(8))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s)?.round_dp(8)))
    }

    /// create from integer amount (pesos, dollars, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// round to specified decimal places
    pub fn round_dp(&self, dp: u32) -> Self {
        Money(self.0.round_dp(dp))
    }

    /// round to centavos, the precision persisted on ledger lines
    pub fn round_centavos(&self) -> Self {
        Money(self.0.round_dp(2))
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative()
    }

    /// absolute value
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// clamp into [low, high]
    pub fn clamp(self, low: Self, high: Self) -> Self {
        Money(self.0.max(low.0).min(high.0))
    }

    /// calculate percentage (e.g., 5% of 100)
    pub fn percentage(&self, rate: Decimal) -> Self {
        Money((self.0 * rate / Decimal::from(100)).round_dp(8))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(8))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(8);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(8))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = (self.0 - other.0).round_dp(8);
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money((self.0 * other).round_dp(8))
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, other: Decimal) -> Money {
        Money((self.0 / other).round_dp(8))
    }
}

/// rate type for interest and fines percentages (5 means 5%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from a percentage figure (e.g., 5 for 5%)
    pub fn from_percentage(p: Decimal) -> Self {
        Rate(p)
    }

    /// get the raw percentage figure
    pub fn as_percentage(&self) -> Decimal {
        self.0
    }

    /// get as a fraction (5% -> 0.05)
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::from(100)
    }

    /// check if the rate has no effect
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// true when the rate is usable for charging
    pub fn is_chargeable(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_percentage(d)
    }
}
