use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::types::{BranchId, Currency, CurrencyId, OrganizationId};

/// non-business day scoped to a branch and currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    pub branch_id: BranchId,
    pub currency_id: CurrencyId,
    pub date: NaiveDate,
    pub name: String,
}

/// which calendar days a loan's schedule must not land on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkipRules {
    pub exclude_saturday: bool,
    pub exclude_sunday: bool,
    pub exclude_holiday: bool,
}

impl SkipRules {
    pub fn none() -> Self {
        Self::default()
    }

    /// true when no rule can ever fire
    pub fn is_empty(&self) -> bool {
        !self.exclude_saturday && !self.exclude_sunday && !self.exclude_holiday
    }
}

/// evaluates business days in the currency's local timezone; pure and
/// deterministic so the same inputs always resolve the same dates
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    timezone: Tz,
    rules: SkipRules,
    holidays: Vec<NaiveDate>,
}

impl BusinessCalendar {
    /// build a calendar for a currency, resolving its IANA timezone name
    pub fn for_currency(
        currency: &Currency,
        rules: SkipRules,
        holidays: &[Holiday],
    ) -> Result<Self> {
        let timezone = Tz::from_str(&currency.timezone).map_err(|_| LedgerError::Timezone {
            name: currency.timezone.clone(),
        })?;
        Ok(Self {
            timezone,
            rules,
            holidays: holidays.iter().map(|h| h.date).collect(),
        })
    }

    /// check a single instant against the exclusion rules, in order:
    /// saturday, sunday, holiday calendar-date match
    pub fn is_non_business_day(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.timezone);
        if self.rules.exclude_saturday && local.weekday() == Weekday::Sat {
            return true;
        }
        if self.rules.exclude_sunday && local.weekday() == Weekday::Sun {
            return true;
        }
        if self.rules.exclude_holiday {
            let date = local.date_naive();
            if self.holidays.iter().any(|h| *h == date) {
                return true;
            }
        }
        false
    }

    /// count the consecutive days to skip before a business day is reached,
    /// advancing one day at a time and re-evaluating after every advance
    pub fn skipped_days(&self, instant: DateTime<Utc>) -> u32 {
        let mut current = instant;
        let mut skipped = 0;
        while self.is_non_business_day(current) {
            current += Duration::days(1);
            skipped += 1;
        }
        skipped
    }

    /// resolve an instant to the first business day at or after it
    pub fn resolve(&self, instant: DateTime<Utc>) -> (DateTime<Utc>, u32) {
        let skipped = self.skipped_days(instant);
        (instant + Duration::days(i64::from(skipped)), skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn currency(timezone: &str) -> Currency {
        Currency {
            id: Uuid::new_v4(),
            code: "PHP".to_string(),
            timezone: timezone.to_string(),
        }
    }

    fn holiday_on(date: NaiveDate) -> Holiday {
        Holiday {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            currency_id: Uuid::new_v4(),
            date,
            name: "Branch Holiday".to_string(),
        }
    }

    fn weekend_rules() -> SkipRules {
        SkipRules {
            exclude_saturday: true,
            exclude_sunday: true,
            exclude_holiday: false,
        }
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let err =
            BusinessCalendar::for_currency(&currency("Mars/Olympus_Mons"), SkipRules::none(), &[])
                .unwrap_err();
        assert!(matches!(err, LedgerError::Timezone { .. }));
    }

    #[test]
    fn test_weekend_saturday_resolves_to_monday() {
        let calendar =
            BusinessCalendar::for_currency(&currency("Asia/Manila"), weekend_rules(), &[]).unwrap();
        // 2024-06-01 is a saturday in manila
        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let (resolved, skipped) = calendar.resolve(saturday);
        assert_eq!(skipped, 2); // saturday and sunday both skip
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
        assert!(!calendar.is_non_business_day(resolved));
    }

    #[test]
    fn test_skip_reevaluates_after_each_advance() {
        // monday after the weekend is itself a holiday, so the loop must
        // keep walking to tuesday
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let rules = SkipRules {
            exclude_saturday: true,
            exclude_sunday: true,
            exclude_holiday: true,
        };
        let calendar =
            BusinessCalendar::for_currency(&currency("Asia/Manila"), rules, &[holiday_on(monday)])
                .unwrap();

        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let (resolved, skipped) = calendar.resolve(saturday);
        assert_eq!(skipped, 3);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rules_disabled_never_skip() {
        let calendar =
            BusinessCalendar::for_currency(&currency("Asia/Manila"), SkipRules::none(), &[])
                .unwrap();
        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(calendar.skipped_days(saturday), 0);
    }

    #[test]
    fn test_holiday_matches_in_local_timezone() {
        // 2024-06-12 manila time; 16:01 UTC the evening before is already
        // june 12 locally and must match the holiday
        let independence_day = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let rules = SkipRules {
            exclude_saturday: false,
            exclude_sunday: false,
            exclude_holiday: true,
        };
        let calendar = BusinessCalendar::for_currency(
            &currency("Asia/Manila"),
            rules,
            &[holiday_on(independence_day)],
        )
        .unwrap();

        let utc_evening_before = Utc.with_ymd_and_hms(2024, 6, 11, 16, 1, 0).unwrap();
        assert!(calendar.is_non_business_day(utc_evening_before));

        let utc_same_day = Utc.with_ymd_and_hms(2024, 6, 12, 2, 0, 0).unwrap();
        assert!(calendar.is_non_business_day(utc_same_day));
    }

    #[test]
    fn test_skipped_days_is_deterministic() {
        let calendar =
            BusinessCalendar::for_currency(&currency("Asia/Manila"), weekend_rules(), &[]).unwrap();
        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(calendar.skipped_days(saturday), calendar.skipped_days(saturday));
    }
}
