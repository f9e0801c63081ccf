use std::collections::HashSet;

use chrono::{Duration, Local, NaiveDate};
use tracing::debug;

use crate::categories::CategoryStore;
use crate::domain::{Category, Granularity};
use crate::history::{DayLedger, HistoryStore};
use crate::stats::{PeriodSummary, StatsPeriod, summarize};
use crate::storage::{BlobStore, StorageError};

/// Source of "today", so date-dependent behavior can be tested.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Fixed date, mostly for tests.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Everything a front-end needs: the selected date, its ledger, categories and statistics.
pub struct Tracker<S: BlobStore + Clone> {
    history: HistoryStore<S>,
    categories: CategoryStore<S>,
    clock: Box<dyn Clock>,
    selected_date: NaiveDate,
}

impl<S: BlobStore + Clone> Tracker<S> {
    pub fn open(store: S, default_granularity: Granularity) -> Result<Self, StorageError> {
        Self::with_clock(store, default_granularity, Box::new(SystemClock))
    }

    /// Opens both stores on `store` and selects today, materializing its ledger.
    pub fn with_clock(
        store: S,
        default_granularity: Granularity,
        clock: Box<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let categories = CategoryStore::open(store.clone())?;
        let history = HistoryStore::open(store, default_granularity);
        let selected_date = clock.today();

        let mut tracker = Self {
            history,
            categories,
            clock,
            selected_date,
        };
        tracker.history.ledger(selected_date)?;
        Ok(tracker)
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn granularity(&self) -> Granularity {
        self.history.granularity()
    }

    pub fn is_viewing_today(&self) -> bool {
        self.selected_date == self.clock.today()
    }

    pub fn current_ledger(&mut self) -> Result<&DayLedger, StorageError> {
        self.history.ledger(self.selected_date)
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn categories(&self) -> &[Category] {
        self.categories.all()
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.lookup(id)
    }

    pub fn stats_for(&self, period: StatsPeriod) -> PeriodSummary {
        summarize(&self.history, &self.categories, self.selected_date, period)
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), StorageError> {
        debug!(date = %date, "selecting date");
        self.selected_date = date;
        self.history.ledger(date)?;
        Ok(())
    }

    pub fn step_date(&mut self, days: i64) -> Result<(), StorageError> {
        let Some(date) = self.selected_date.checked_add_signed(Duration::days(days)) else {
            return Ok(());
        };
        self.select_date(date)
    }

    pub fn assign_category(
        &mut self,
        slot_id: &str,
        category_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        self.history
            .assign_category(self.selected_date, slot_id, category_id)
    }

    pub fn assign_category_batch(
        &mut self,
        slot_ids: &HashSet<String>,
        category_id: Option<&str>,
    ) -> Result<usize, StorageError> {
        self.history
            .assign_category_batch(self.selected_date, slot_ids, category_id)
    }

    pub fn reset_current_day(&mut self) -> Result<(), StorageError> {
        self.history.reset_day(self.selected_date)
    }

    pub fn change_granularity(&mut self, granularity: Granularity) -> Result<(), StorageError> {
        self.history
            .change_granularity(granularity, self.selected_date)
    }

    pub fn add_category(&mut self, category: Category) -> Result<(), StorageError> {
        self.categories.add(category)
    }

    pub fn update_category(&mut self, category: Category) -> Result<(), StorageError> {
        self.categories.update(category)
    }

    pub fn delete_category(&mut self, id: &str) -> Result<(), StorageError> {
        self.categories.delete(id)
    }

    pub fn reset_categories_to_default(&mut self) -> Result<(), StorageError> {
        self.categories.reset_to_defaults()
    }
}
