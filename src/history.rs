use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{DayPeriod, Granularity, Slot, date_key, generate_slots, parse_date_key};
use crate::storage::{
    BlobStore, GRANULARITY_KEY, HISTORY_KEY, StorageError, load_or_default, save_json,
};

/// All slots of one calendar day, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLedger {
    date: NaiveDate,
    slots: Vec<Slot>,
}

impl DayLedger {
    pub fn generate(date: NaiveDate, granularity: Granularity) -> Self {
        Self {
            date,
            slots: generate_slots(date, granularity),
        }
    }

    pub fn from_slots(date: NaiveDate, slots: Vec<Slot>) -> Self {
        Self { date, slots }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot covering the given time of day.
    pub fn slot_at(&self, hour: u32, minute: u32) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.covers(hour, minute))
    }

    pub fn slots_in_period(&self, period: DayPeriod) -> impl Iterator<Item = &Slot> {
        let hours = period.hours();
        self.slots
            .iter()
            .filter(move |slot| hours.contains(&slot.hour))
    }

    /// True when the ledger was generated under a different granularity.
    pub fn is_stale(&self, granularity: Granularity) -> bool {
        self.slots.len() != granularity.slots_per_day()
    }

    /// Sets the category of one slot. Returns false when the id is unknown.
    pub fn assign(&mut self, slot_id: &str, category_id: Option<&str>) -> bool {
        match self.slots.iter_mut().find(|slot| slot.id == slot_id) {
            Some(slot) => {
                slot.category_id = category_id.map(str::to_string);
                true
            }
            None => false,
        }
    }
}

/// Every day ledger the user has opened, plus the granularity new ledgers are cut with.
pub struct HistoryStore<S: BlobStore> {
    store: S,
    granularity: Granularity,
    days: BTreeMap<NaiveDate, DayLedger>,
}

impl<S: BlobStore> HistoryStore<S> {
    /// Loads granularity and history. Unreadable blobs fall back to
    /// `default_granularity` and an empty history.
    pub fn open(store: S, default_granularity: Granularity) -> Self {
        let granularity = load_or_default(&store, GRANULARITY_KEY).unwrap_or(default_granularity);
        let raw: BTreeMap<String, Vec<Slot>> = load_or_default(&store, HISTORY_KEY).unwrap_or_default();

        let mut days = BTreeMap::new();
        for (key, slots) in raw {
            match parse_date_key(&key) {
                Some(date) => {
                    days.insert(date, DayLedger::from_slots(date, slots));
                }
                None => warn!(key = %key, "skipping history entry with invalid date key"),
            }
        }

        debug!(days = days.len(), %granularity, "loaded history");
        Self {
            store,
            granularity,
            days,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Ledger for `date`, generating it when missing or cut with another granularity.
    pub fn ledger(&mut self, date: NaiveDate) -> Result<&DayLedger, StorageError> {
        let granularity = self.granularity;
        let needs_generation = self
            .days
            .get(&date)
            .is_none_or(|ledger| ledger.is_stale(granularity));

        if needs_generation {
            debug!(date = %date, %granularity, "generating day ledger");
            self.days.insert(date, DayLedger::generate(date, granularity));
            self.persist()?;
        }

        Ok(self
            .days
            .entry(date)
            .or_insert_with(|| DayLedger::generate(date, granularity)))
    }

    /// Ledger for `date` if one was ever materialized. Never generates.
    pub fn existing(&self, date: NaiveDate) -> Option<&DayLedger> {
        self.days.get(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Returns whether a slot was updated. Unknown dates and slot ids are a no-op.
    pub fn assign_category(
        &mut self,
        date: NaiveDate,
        slot_id: &str,
        category_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        let Some(ledger) = self.days.get_mut(&date) else {
            return Ok(false);
        };

        if !ledger.assign(slot_id, category_id) {
            debug!(date = %date, slot_id, "ignoring assignment to unknown slot");
            return Ok(false);
        }

        self.persist()?;
        Ok(true)
    }

    /// Applies one category to every known slot id, persisting once. Returns the number updated.
    pub fn assign_category_batch(
        &mut self,
        date: NaiveDate,
        slot_ids: &HashSet<String>,
        category_id: Option<&str>,
    ) -> Result<usize, StorageError> {
        let Some(ledger) = self.days.get_mut(&date) else {
            return Ok(0);
        };

        let updated = slot_ids
            .iter()
            .filter(|slot_id| ledger.assign(slot_id, category_id))
            .count();

        if updated > 0 {
            self.persist()?;
        }
        Ok(updated)
    }

    /// Drops every assignment for `date` by cutting a fresh ledger.
    pub fn reset_day(&mut self, date: NaiveDate) -> Result<(), StorageError> {
        info!(date = %date, "resetting day");
        self.days
            .insert(date, DayLedger::generate(date, self.granularity));
        self.persist()
    }

    /// Switches granularity and regenerates `active_date` right away. Other
    /// days keep their old slots until their next `ledger` call.
    pub fn change_granularity(
        &mut self,
        granularity: Granularity,
        active_date: NaiveDate,
    ) -> Result<(), StorageError> {
        info!(from = %self.granularity, to = %granularity, "changing granularity");
        self.granularity = granularity;
        save_json(&mut self.store, GRANULARITY_KEY, &granularity)?;

        self.days
            .insert(active_date, DayLedger::generate(active_date, granularity));
        self.persist()
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let encoded: BTreeMap<String, &[Slot]> = self
            .days
            .iter()
            .map(|(date, ledger)| (date_key(*date), ledger.slots()))
            .collect();
        save_json(&mut self.store, HISTORY_KEY, &encoded)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::LazyLock;

    use chrono::NaiveDate;

    use crate::domain::{DayPeriod, Granularity};
    use crate::logging::TEST_LOGGING;
    use crate::storage::{BlobStore, GRANULARITY_KEY, HISTORY_KEY, MemoryStore};

    use super::HistoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn open(store: &MemoryStore) -> HistoryStore<MemoryStore> {
        LazyLock::force(&TEST_LOGGING);
        HistoryStore::open(store.clone(), Granularity::Thirty)
    }

    #[test]
    fn materializes_missing_days_once() {
        let store = MemoryStore::new();
        let mut history = open(&store);
        assert!(history.existing(day(1)).is_none());

        let first = history.ledger(day(1)).expect("ledger").clone();
        let second = history.ledger(day(1)).expect("ledger").clone();
        assert_eq!(first.len(), 48);
        assert_eq!(first, second);
        assert!(store.contains(HISTORY_KEY));
    }

    #[test]
    fn assignment_touches_only_the_target_slot() {
        let mut history = open(&MemoryStore::new());
        let before = history.ledger(day(1)).expect("ledger").clone();
        let target = before.slot_at(9, 0).expect("09:00 slot").id.clone();

        let updated = history
            .assign_category(day(1), &target, Some("work"))
            .expect("assign");
        assert!(updated);

        let after = history.existing(day(1)).expect("ledger");
        for (old, new) in before.slots().iter().zip(after.slots()) {
            if old.id == target {
                assert_eq!(new.category_id.as_deref(), Some("work"));
                assert_eq!((new.hour, new.minute, new.date), (old.hour, old.minute, old.date));
                assert_eq!(new.duration_minutes, old.duration_minutes);
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn unknown_slot_or_date_is_ignored() {
        let mut history = open(&MemoryStore::new());
        let before = history.ledger(day(1)).expect("ledger").clone();

        assert!(!history.assign_category(day(1), "nope", Some("work")).expect("assign"));
        assert!(!history.assign_category(day(2), "nope", Some("work")).expect("assign"));
        assert_eq!(history.existing(day(1)), Some(&before));
        assert!(history.existing(day(2)).is_none());
    }

    #[test]
    fn batch_assignment_skips_unknown_ids() {
        let mut history = open(&MemoryStore::new());
        let ledger = history.ledger(day(1)).expect("ledger").clone();
        let morning: HashSet<String> = ledger
            .slots_in_period(DayPeriod::Morning)
            .map(|slot| slot.id.clone())
            .chain(["missing".to_string()])
            .collect();

        let updated = history
            .assign_category_batch(day(1), &morning, Some("work"))
            .expect("batch");
        assert_eq!(updated, 12);

        let ledger = history.existing(day(1)).expect("ledger");
        let assigned = ledger
            .slots()
            .iter()
            .filter(|slot| slot.category_id.as_deref() == Some("work"))
            .count();
        assert_eq!(assigned, 12);
        assert!(
            ledger
                .slots_in_period(DayPeriod::Morning)
                .all(|slot| slot.category_id.is_some())
        );
    }

    #[test]
    fn reset_day_clears_assignments() {
        let mut history = open(&MemoryStore::new());
        let slot_id = history.ledger(day(1)).expect("ledger").slots()[0].id.clone();
        history
            .assign_category(day(1), &slot_id, Some("sleep"))
            .expect("assign");

        history.reset_day(day(1)).expect("reset");
        let ledger = history.existing(day(1)).expect("ledger");
        assert_eq!(ledger.len(), 48);
        assert!(ledger.slots().iter().all(|slot| slot.category_id.is_none()));
    }

    #[test]
    fn granularity_change_repairs_other_days_lazily() {
        let store = MemoryStore::new();
        let mut history = open(&store);
        let active_slot = history.ledger(day(1)).expect("ledger").slots()[10].id.clone();
        history
            .assign_category(day(1), &active_slot, Some("work"))
            .expect("assign");
        history.ledger(day(2)).expect("ledger");

        history
            .change_granularity(Granularity::Fifteen, day(1))
            .expect("change");

        let active = history.existing(day(1)).expect("active ledger");
        assert_eq!(active.len(), 96);
        assert!(active.slots().iter().all(|slot| slot.category_id.is_none()));
        assert!(active.slots().iter().all(|slot| slot.duration_minutes == 15));

        assert_eq!(history.existing(day(2)).expect("stale ledger").len(), 48);
        assert_eq!(history.ledger(day(2)).expect("ledger").len(), 96);
        assert_eq!(store.get(GRANULARITY_KEY).unwrap().as_deref(), Some("15"));
    }

    #[test]
    fn reopening_restores_the_same_history() {
        let store = MemoryStore::new();
        let mut history = open(&store);
        let slot_id = history.ledger(day(3)).expect("ledger").slots()[5].id.clone();
        history
            .assign_category(day(3), &slot_id, Some("email"))
            .expect("assign");
        history.ledger(day(4)).expect("ledger");
        history
            .change_granularity(Granularity::Sixty, day(5))
            .expect("change");

        let reopened = open(&store);
        assert_eq!(reopened.granularity(), Granularity::Sixty);
        assert_eq!(reopened.dates().collect::<Vec<_>>(), history.dates().collect::<Vec<_>>());
        for date in history.dates() {
            assert_eq!(reopened.existing(date), history.existing(date));
        }
    }

    #[test]
    fn corrupt_blobs_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "{\"2025-01-01\": 12").expect("set");
        store.set(GRANULARITY_KEY, "45").expect("set");

        let history = HistoryStore::open(store, Granularity::Sixty);
        assert_eq!(history.granularity(), Granularity::Sixty);
        assert_eq!(history.dates().count(), 0);
    }

    #[test]
    fn invalid_date_keys_are_skipped() {
        let mut store = MemoryStore::new();
        store
            .set(HISTORY_KEY, "{\"yesterday\": [], \"2025-01-02\": []}")
            .expect("set");

        let history = open(&store);
        assert_eq!(history.dates().collect::<Vec<_>>(), vec![day(2)]);
    }
}
