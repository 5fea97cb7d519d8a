use chrono::{Days, Local, NaiveDate};
use tracing::warn;

use crate::models::MealPlan;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the reference date. The only place wall-clock time enters.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Stamps day `i` with `reference + i` days, replacing whatever date the
/// generator wrote.
pub fn assign_dates(plan: &mut MealPlan, reference: NaiveDate) {
    for (offset, day) in plan.days.iter_mut().enumerate() {
        let date = u64::try_from(offset)
            .ok()
            .and_then(|offset| reference.checked_add_days(Days::new(offset)));
        match date {
            Some(date) => day.date = date.format(DATE_FORMAT).to_string(),
            None => {
                warn!(offset, "date out of range, leaving day undated");
                day.date.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Day;

    fn plan_with_dates(dates: &[&str]) -> MealPlan {
        MealPlan {
            days: dates
                .iter()
                .map(|date| Day {
                    date: date.to_string(),
                    meals: vec![],
                })
                .collect(),
            shopping_list: None,
        }
    }

    #[test]
    fn consecutive_dates_replace_generator_dates() {
        let mut plan = plan_with_dates(&["Monday", "", "2001-01-01"]);
        let reference = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assign_dates(&mut plan, reference);
        let dates: Vec<_> = plan.days.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-10", "2024-01-11", "2024-01-12"]);
    }

    #[test]
    fn dates_cross_month_and_leap_day() {
        let mut plan = plan_with_dates(&["", ""]);
        assign_dates(&mut plan, NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(plan.days[0].date, "2024-02-28");
        assert_eq!(plan.days[1].date, "2024-02-29");
    }

    #[test]
    fn fixed_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        assert_eq!(FixedClock(date).today(), date);
    }
}
