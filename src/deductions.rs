use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountSnapshot;
use crate::decimal::{Money, Rate};
use crate::types::{
    AutomaticDeductionId, ChargesRateSchemeId, ComputationSheetId, PaymentMode,
};

/// loan facts a charge computation runs against
#[derive(Debug, Clone, Copy)]
pub struct ChargeContext {
    pub applied: Money,
    pub terms: u32,
    pub mode: PaymentMode,
    pub member_type_id: Option<Uuid>,
}

/// automatic deduction rule attached to a computation sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticDeduction {
    pub id: AutomaticDeductionId,
    pub computation_sheet_id: ComputationSheetId,
    pub name: String,
    pub account: AccountSnapshot,
    pub add_on: bool,
    pub charges_rate_scheme_id: Option<ChargesRateSchemeId>,
    pub min_amount: Money,
    pub max_amount: Money,
    pub charges_percentage_1: Rate,
    pub charges_percentage_2: Rate,
    pub charges_divisor: Decimal,
    pub charges_amount: Money,
    /// divide by twelve when no month count applies
    pub annum: bool,
    /// 0: no spread, -1: spread over terms/12, n: spread over terms/n
    pub number_of_months: i32,
}

impl AutomaticDeduction {
    pub fn new(
        id: AutomaticDeductionId,
        computation_sheet_id: ComputationSheetId,
        name: impl Into<String>,
        account: AccountSnapshot,
    ) -> Self {
        Self {
            id,
            computation_sheet_id,
            name: name.into(),
            account,
            add_on: false,
            charges_rate_scheme_id: None,
            min_amount: Money::ZERO,
            max_amount: Money::ZERO,
            charges_percentage_1: Rate::ZERO,
            charges_percentage_2: Rate::ZERO,
            charges_divisor: Decimal::ZERO,
            charges_amount: Money::ZERO,
            annum: false,
            number_of_months: 0,
        }
    }

    /// flat-rate charge for a loan, applied when no rate scheme matches
    pub fn flat_charge(&self, ctx: &ChargeContext) -> Money {
        let mut result = ctx.applied;

        if self.min_amount.is_positive() && result < self.min_amount {
            return Money::ZERO;
        }
        if self.max_amount.is_positive() && result > self.max_amount {
            return Money::ZERO;
        }

        let pct1 = self.charges_percentage_1;
        let pct2 = self.charges_percentage_2;
        if pct1.is_chargeable() || pct2.is_chargeable() {
            let rate = if pct1.is_chargeable() && pct2.is_chargeable() {
                // add-on rules charge the second percentage
                if self.add_on {
                    pct2
                } else {
                    pct1
                }
            } else if pct1.is_chargeable() {
                pct1
            } else {
                pct2
            };
            result = result.percentage(rate.as_percentage());
        }

        if self.charges_divisor > Decimal::ZERO && result.is_positive() {
            result = result / self.charges_divisor * self.charges_amount.as_decimal();
        }

        if self.number_of_months == 0 && self.annum {
            result = result / dec!(12);
        }

        if self.number_of_months == -1 {
            result = result * Decimal::from(ctx.terms) / dec!(12);
        } else if self.number_of_months > 0 {
            result = result * Decimal::from(ctx.terms) / Decimal::from(self.number_of_months);
        }

        // nothing in the rule touched the amount: the flat charge applies
        if result == ctx.applied {
            return self.charges_amount;
        }

        result.round_centavos()
    }
}

/// resolve a rule's credit: the rate scheme computes first, the flat
/// computation is the fallback when the scheme yields nothing
pub fn rule_credit(
    rule: &AutomaticDeduction,
    scheme: Option<&ChargesRateScheme>,
    ctx: &ChargeContext,
) -> Money {
    let mut credit = Money::ZERO;
    if let Some(scheme) = scheme {
        credit = scheme.charge_for(ctx);
    }
    if !credit.is_positive() {
        credit = rule.flat_charge(ctx);
    }
    credit
}

/// applied-amount bracket of a by-range scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBracket {
    pub from: Money,
    pub to: Money,
    pub charge: Rate,
    pub amount: Money,
    pub minimum: Money,
}

/// per-mode rate row of a by-term scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRates {
    pub mode: PaymentMode,
    pub rates: Vec<Rate>,
}

/// applied-amount bracket of a by-mode-of-payment scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBracket {
    pub from: Money,
    pub to: Money,
    pub rates: Vec<Rate>,
}

/// tiered or ranged charge computation referenced by deduction rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargesRateScheme {
    pub id: ChargesRateSchemeId,
    pub name: String,
    pub kind: SchemeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeKind {
    ByRange {
        brackets: Vec<RangeBracket>,
    },
    ByTerm {
        term_headers: Vec<u32>,
        rows: Vec<TermRates>,
    },
    ByModeOfPayment {
        member_type_id: Option<Uuid>,
        mode: Option<PaymentMode>,
        mode_headers: Vec<u32>,
        brackets: Vec<ModeBracket>,
    },
}

impl ChargesRateScheme {
    /// charge for a loan under this scheme; zero means no match
    pub fn charge_for(&self, ctx: &ChargeContext) -> Money {
        match &self.kind {
            SchemeKind::ByRange { brackets } => {
                for bracket in brackets {
                    if ctx.applied < bracket.from || ctx.applied > bracket.to {
                        continue;
                    }
                    let charge = if bracket.charge.is_chargeable() {
                        ctx.applied.percentage(bracket.charge.as_percentage())
                    } else if bracket.amount.is_positive() {
                        bracket.amount
                    } else {
                        Money::ZERO
                    };
                    if charge.is_positive() {
                        // the bracket minimum caps the computed charge
                        if bracket.minimum.is_positive() && charge >= bracket.minimum {
                            return bracket.minimum;
                        }
                        return charge;
                    }
                }
                Money::ZERO
            }
            SchemeKind::ByTerm { term_headers, rows } => {
                if ctx.terms < 1 {
                    return Money::ZERO;
                }
                for row in rows {
                    if row.mode != ctx.mode {
                        continue;
                    }
                    let rate = last_applicable_rate(&row.rates, term_headers, ctx.terms);
                    if !rate.is_chargeable() {
                        continue;
                    }
                    let charge = periodic_charge(ctx.applied, rate, ctx.mode);
                    if charge.is_positive() {
                        return charge;
                    }
                }
                Money::ZERO
            }
            SchemeKind::ByModeOfPayment {
                member_type_id,
                mode,
                mode_headers,
                brackets,
            } => {
                if member_type_id.is_some() && *member_type_id != ctx.member_type_id {
                    return Money::ZERO;
                }
                if let Some(required_mode) = mode {
                    if *required_mode != ctx.mode {
                        return Money::ZERO;
                    }
                }
                for bracket in brackets {
                    if ctx.applied < bracket.from || ctx.applied > bracket.to {
                        continue;
                    }
                    let rate = last_applicable_rate(&bracket.rates, mode_headers, ctx.terms);
                    if !rate.is_chargeable() {
                        continue;
                    }
                    let charge = periodic_charge(ctx.applied, rate, ctx.mode);
                    if charge.is_positive() {
                        return charge;
                    }
                }
                Money::ZERO
            }
        }
    }
}

/// walk header/rate pairs and keep the last one still applicable; the walk
/// stops at the first header above the term count or non-positive rate
fn last_applicable_rate(rates: &[Rate], headers: &[u32], terms: u32) -> Rate {
    let mut last = Rate::ZERO;
    for (rate, header) in rates.iter().zip(headers.iter()) {
        if *header > terms || !rate.is_chargeable() {
            break;
        }
        last = *rate;
    }
    last
}

/// scale a monthly percentage charge to the loan's payment mode
fn periodic_charge(applied: Money, rate: Rate, mode: PaymentMode) -> Money {
    if !rate.is_chargeable() {
        return Money::ZERO;
    }
    let base = applied.percentage(rate.as_percentage());
    match mode {
        PaymentMode::Daily => base / dec!(30),
        PaymentMode::Weekly => base * dec!(7) / dec!(30),
        PaymentMode::SemiMonthly => base * dec!(15) / dec!(30),
        PaymentMode::Monthly => base,
        PaymentMode::Quarterly => base * dec!(3),
        PaymentMode::SemiAnnual => base * dec!(6),
        PaymentMode::Lumpsum | PaymentMode::FixedDays => Money::ZERO,
    }
}
