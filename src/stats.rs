use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};

use crate::categories::CategoryLookup;
use crate::domain::{Granularity, Slot};
use crate::history::HistoryStore;
use crate::storage::BlobStore;

/// Slot count per category id.
pub type CategoryCounts = HashMap<String, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatsPeriod {
    #[default]
    Day,
    Week,
    Month,
}

impl Display for StatsPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StatsPeriod::Day => "day",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
        };
        f.write_str(label)
    }
}

impl FromStr for StatsPeriod {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(StatsPeriod::Day),
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            other => Err(format!("unknown period: {other} (expected day, week or month)")),
        }
    }
}

/// Counts slots per category. Unassigned slots and ids that no longer resolve
/// to a category are left out.
pub fn day_stats<L: CategoryLookup + ?Sized>(slots: &[Slot], categories: &L) -> CategoryCounts {
    let mut counts = CategoryCounts::new();
    for category_id in slots.iter().filter_map(|slot| slot.category_id.as_deref()) {
        if categories.contains(category_id) {
            *counts.entry(category_id.to_string()).or_default() += 1;
        }
    }
    counts
}

/// Dates making up the window around `anchor`. Weeks start on Monday. Dates
/// outside chrono's range are left out.
pub fn window_dates(anchor: NaiveDate, period: StatsPeriod) -> Vec<NaiveDate> {
    match period {
        StatsPeriod::Day => vec![anchor],
        StatsPeriod::Week => {
            let days_from_monday = anchor.weekday().num_days_from_monday() as i64;
            (-days_from_monday..7 - days_from_monday)
                .filter_map(|offset| anchor.checked_add_signed(Duration::days(offset)))
                .collect()
        }
        StatsPeriod::Month => (1..=days_in_month(anchor.year(), anchor.month()))
            .filter_map(|day| NaiveDate::from_ymd_opt(anchor.year(), anchor.month(), day))
            .collect(),
    }
}

/// Sums per-day counts over the window. Days that were never opened add
/// nothing and are not generated.
pub fn window_stats<S: BlobStore, L: CategoryLookup + ?Sized>(
    history: &HistoryStore<S>,
    categories: &L,
    anchor: NaiveDate,
    period: StatsPeriod,
) -> CategoryCounts {
    let mut totals = CategoryCounts::new();
    for date in window_dates(anchor, period) {
        let Some(ledger) = history.existing(date) else {
            continue;
        };

        for (category_id, count) in day_stats(ledger.slots(), categories) {
            *totals.entry(category_id).or_default() += count;
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSummary {
    pub period: StatsPeriod,
    pub anchor: NaiveDate,
    pub granularity: Granularity,
    pub counts: CategoryCounts,
    /// Slots the window holds under the current granularity.
    pub capacity: usize,
}

impl PeriodSummary {
    pub fn total_assigned(&self) -> usize {
        self.counts.values().sum()
    }

    /// Capacity minus assigned slots. Computed with the current granularity, so
    /// it drifts for windows recorded under another one.
    pub fn unassigned(&self) -> usize {
        self.capacity.saturating_sub(self.total_assigned())
    }

    pub fn minutes_for(&self, count: usize) -> u64 {
        self.granularity.minutes_for(count)
    }

    /// Percentage of assigned slots that went to a category with `count` slots.
    pub fn share(&self, count: usize) -> f64 {
        let total = self.total_assigned();
        if total == 0 {
            return 0.0;
        }
        count as f64 * 100.0 / total as f64
    }

    pub fn assigned_percentage(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.total_assigned() as f64 * 100.0 / self.capacity as f64
    }

    /// Categories ordered by count, largest first, ties broken by id.
    pub fn ranked(&self) -> Vec<(String, usize)> {
        let mut rows = self
            .counts
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        rows
    }
}

pub fn summarize<S: BlobStore, L: CategoryLookup + ?Sized>(
    history: &HistoryStore<S>,
    categories: &L,
    anchor: NaiveDate,
    period: StatsPeriod,
) -> PeriodSummary {
    let granularity = history.granularity();
    PeriodSummary {
        period,
        anchor,
        granularity,
        counts: window_stats(history, categories, anchor, period),
        capacity: granularity.slots_per_day() * window_dates(anchor, period).len(),
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last_day| last_day.day())
        .unwrap_or(31)
}

/// Monday of the week containing `day`, or `None` when it falls before the
/// first representable date.
pub fn start_of_week(day: NaiveDate) -> Option<NaiveDate> {
    let days_from_monday = day.weekday().num_days_from_monday() as i64;
    day.checked_sub_signed(Duration::days(days_from_monday))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use crate::categories::CategoryStore;
    use crate::domain::{Category, Granularity};
    use crate::history::HistoryStore;
    use crate::storage::MemoryStore;

    use super::{
        StatsPeriod, day_stats, days_in_month, start_of_week, summarize, window_dates,
        window_stats,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture() -> (HistoryStore<MemoryStore>, CategoryStore<MemoryStore>) {
        let store = MemoryStore::new();
        let history = HistoryStore::open(store.clone(), Granularity::Thirty);
        let categories = CategoryStore::open(store).expect("categories");
        (history, categories)
    }

    fn assign_at(
        history: &mut HistoryStore<MemoryStore>,
        day: NaiveDate,
        hour: u32,
        category: &str,
    ) {
        let slot_id = history
            .ledger(day)
            .expect("ledger")
            .slot_at(hour, 0)
            .expect("slot")
            .id
            .clone();
        history
            .assign_category(day, &slot_id, Some(category))
            .expect("assign");
    }

    #[test]
    fn counts_a_single_assignment() {
        let (mut history, categories) = fixture();
        let new_year = date(2025, 1, 1);
        let slot_id = history.ledger(new_year).expect("ledger").slots()[18].id.clone();
        history
            .assign_category(new_year, &slot_id, Some("work"))
            .expect("assign");

        let ledger = history.existing(new_year).expect("ledger");
        let counts = day_stats(ledger.slots(), &categories);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("work"), Some(&1));
    }

    #[test]
    fn day_totals_never_exceed_slot_count() {
        let (mut history, categories) = fixture();
        let day = date(2025, 3, 10);
        let ids = history
            .ledger(day)
            .expect("ledger")
            .slots()
            .iter()
            .map(|slot| slot.id.clone())
            .collect();
        history
            .assign_category_batch(day, &ids, Some("sleep"))
            .expect("batch");

        let ledger = history.existing(day).expect("ledger");
        let total: usize = day_stats(ledger.slots(), &categories).values().sum();
        assert_eq!(total, ledger.len());
    }

    #[test]
    fn deleted_categories_count_as_unassigned() {
        let (mut history, mut categories) = fixture();
        let reading = Category::new("Reading", "📖", "#AA5500");
        categories.add(reading.clone()).expect("add");

        let day = date(2025, 1, 1);
        assign_at(&mut history, day, 8, &reading.id);
        assign_at(&mut history, day, 9, &reading.id);
        assign_at(&mut history, day, 10, "work");

        categories.delete(&reading.id).expect("delete");
        assert!(categories.lookup(&reading.id).is_none());

        let ledger = history.existing(day).expect("ledger");
        let counts = day_stats(ledger.slots(), &categories);
        assert_eq!(counts.get(&reading.id), None);
        assert_eq!(counts.get("work"), Some(&1));
    }

    #[test]
    fn week_skips_unvisited_days_without_generating_them() {
        let (mut history, categories) = fixture();
        let monday = date(2025, 1, 6);
        for offset in [0, 1, 2, 4, 6] {
            let day = monday + chrono::Duration::days(offset);
            assign_at(&mut history, day, 9, "work");
        }
        assign_at(&mut history, monday, 22, "sleep");
        // outside the week
        assign_at(&mut history, date(2025, 1, 13), 9, "work");

        let thursday = date(2025, 1, 9);
        let counts = window_stats(&history, &categories, thursday, StatsPeriod::Week);
        assert_eq!(counts.get("work"), Some(&5));
        assert_eq!(counts.get("sleep"), Some(&1));
        assert!(history.existing(date(2025, 1, 9)).is_none());
        assert!(history.existing(date(2025, 1, 11)).is_none());
    }

    #[test]
    fn month_sums_every_visited_day() {
        let (mut history, categories) = fixture();
        assign_at(&mut history, date(2024, 2, 1), 9, "work");
        assign_at(&mut history, date(2024, 2, 29), 9, "work");
        assign_at(&mut history, date(2024, 3, 1), 9, "work");

        let summary = summarize(&history, &categories, date(2024, 2, 15), StatsPeriod::Month);
        assert_eq!(summary.counts.get("work"), Some(&2));
        assert_eq!(summary.capacity, 29 * 48);
        assert_eq!(summary.total_assigned(), 2);
        assert_eq!(summary.unassigned(), 29 * 48 - 2);
        assert_eq!(summary.minutes_for(2), 60);
    }

    #[test]
    fn summary_ranks_and_shares() {
        let (mut history, categories) = fixture();
        let day = date(2025, 5, 5);
        assign_at(&mut history, day, 1, "sleep");
        assign_at(&mut history, day, 2, "sleep");
        assign_at(&mut history, day, 3, "sleep");
        assign_at(&mut history, day, 9, "work");

        let summary = summarize(&history, &categories, day, StatsPeriod::Day);
        assert_eq!(summary.capacity, 48);
        assert_eq!(
            summary.ranked(),
            vec![("sleep".to_string(), 3), ("work".to_string(), 1)]
        );
        assert_eq!(summary.share(3), 75.0);
        assert!((summary.assigned_percentage() - 4.0 * 100.0 / 48.0).abs() < 1e-9);

        let week = summarize(&history, &categories, day, StatsPeriod::Week);
        assert_eq!(week.capacity, 7 * 48);
    }

    #[test]
    fn unassigned_saturates_after_granularity_shrinks_capacity() {
        let (mut history, categories) = fixture();
        let day = date(2025, 1, 1);
        let ids = history
            .ledger(day)
            .expect("ledger")
            .slots()
            .iter()
            .map(|slot| slot.id.clone())
            .collect();
        history
            .assign_category_batch(day, &ids, Some("work"))
            .expect("batch");
        history
            .change_granularity(Granularity::Sixty, date(2025, 1, 2))
            .expect("change");

        let summary = summarize(&history, &categories, day, StatsPeriod::Day);
        assert_eq!(summary.total_assigned(), 48);
        assert_eq!(summary.capacity, 24);
        assert_eq!(summary.unassigned(), 0);
    }

    #[test]
    fn week_window_stops_at_the_ends_of_the_calendar() {
        let (history, categories) = fixture();

        let first = NaiveDate::MIN;
        let days_from_monday = first.weekday().num_days_from_monday() as usize;
        let dates = window_dates(first, StatsPeriod::Week);
        assert_eq!(dates.len(), 7 - days_from_monday);
        assert_eq!(dates.first(), Some(&first));
        let summary = summarize(&history, &categories, first, StatsPeriod::Week);
        assert_eq!(summary.capacity, 48 * (7 - days_from_monday));
        assert_eq!(summary.total_assigned(), 0);
        assert_eq!(start_of_week(first), (days_from_monday == 0).then_some(first));

        let last = NaiveDate::MAX;
        let days_from_monday = last.weekday().num_days_from_monday() as usize;
        let dates = window_dates(last, StatsPeriod::Week);
        assert_eq!(dates.len(), days_from_monday + 1);
        assert_eq!(dates.last(), Some(&last));
        let summary = summarize(&history, &categories, last, StatsPeriod::Week);
        assert_eq!(summary.capacity, 48 * (days_from_monday + 1));

        let month = summarize(&history, &categories, last, StatsPeriod::Month);
        assert_eq!(month.capacity, 48 * last.day() as usize);
    }

    #[test]
    fn calendar_helpers() {
        assert_eq!(start_of_week(date(2025, 1, 1)), Some(date(2024, 12, 30)));
        assert_eq!(start_of_week(date(2025, 1, 5)), Some(date(2024, 12, 30)));
        assert_eq!(start_of_week(date(2025, 1, 6)), Some(date(2025, 1, 6)));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(window_dates(date(2025, 4, 10), StatsPeriod::Month).len(), 30);
        assert_eq!("Week".parse::<StatsPeriod>(), Ok(StatsPeriod::Week));
        assert!("year".parse::<StatsPeriod>().is_err());
    }
}
