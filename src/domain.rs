use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 8;
const MINUTES_PER_DAY: u32 = 24 * 60;
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Length of one slot in minutes. Only values that divide an hour evenly are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Granularity {
    Fifteen,
    #[default]
    Thirty,
    Sixty,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Fifteen, Granularity::Thirty, Granularity::Sixty];

    pub fn minutes(self) -> u32 {
        match self {
            Granularity::Fifteen => 15,
            Granularity::Thirty => 30,
            Granularity::Sixty => 60,
        }
    }

    pub fn slots_per_day(self) -> usize {
        (MINUTES_PER_DAY / self.minutes()) as usize
    }

    /// Minute offsets inside one hour at which a slot starts.
    pub fn minute_offsets(self) -> impl Iterator<Item = u32> {
        (0..60).step_by(self.minutes() as usize)
    }

    /// Total minutes covered by `count` slots of this size.
    pub fn minutes_for(self, count: usize) -> u64 {
        count as u64 * u64::from(self.minutes())
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} minutes", self.minutes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidGranularity(pub u32);

impl Display for InvalidGranularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "granularity must be 15, 30 or 60 minutes, got {}", self.0)
    }
}

impl std::error::Error for InvalidGranularity {}

impl TryFrom<u32> for Granularity {
    type Error = InvalidGranularity;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            15 => Ok(Granularity::Fifteen),
            30 => Ok(Granularity::Thirty),
            60 => Ok(Granularity::Sixty),
            other => Err(InvalidGranularity(other)),
        }
    }
}

impl From<Granularity> for u32 {
    fn from(granularity: Granularity) -> Self {
        granularity.minutes()
    }
}

/// Wall-clock time of day, used for slot boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime {
    pub hour: u32,
    pub minute: u32,
}

impl SlotTime {
    fn from_minute_of_day(minute_of_day: u32) -> Self {
        let wrapped = minute_of_day % MINUTES_PER_DAY;
        Self {
            hour: wrapped / 60,
            minute: wrapped % 60,
        }
    }
}

impl Display for SlotTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub hour: u32,
    pub minute: u32,
    pub category_id: Option<String>,
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

impl Slot {
    pub fn start(&self) -> SlotTime {
        SlotTime {
            hour: self.hour,
            minute: self.minute,
        }
    }

    /// End of the slot; a slot that finishes at midnight ends at 00:00.
    pub fn end(&self) -> SlotTime {
        SlotTime::from_minute_of_day(self.start_minute() + self.duration_minutes)
    }

    pub fn start_minute(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn covers(&self, hour: u32, minute: u32) -> bool {
        let at = hour * 60 + minute;
        at >= self.start_minute() && at < self.start_minute() + self.duration_minutes
    }

    pub fn display_range(&self) -> String {
        format!("{} - {}", self.start(), self.end())
    }
}

/// Builds the empty slot partition of `date` for the given granularity.
pub fn generate_slots(date: NaiveDate, granularity: Granularity) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(granularity.slots_per_day());
    for hour in 0..24 {
        for minute in granularity.minute_offsets() {
            slots.push(Slot {
                id: generate_id(),
                hour,
                minute,
                category_id: None,
                date,
                duration_minutes: granularity.minutes(),
            });
        }
    }
    slots
}

/// Coarse sections of the day used to group slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPeriod {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    pub const ALL: [DayPeriod; 4] = [
        DayPeriod::Night,
        DayPeriod::Morning,
        DayPeriod::Afternoon,
        DayPeriod::Evening,
    ];

    pub fn hours(self) -> RangeInclusive<u32> {
        match self {
            DayPeriod::Night => 0..=5,
            DayPeriod::Morning => 6..=11,
            DayPeriod::Afternoon => 12..=17,
            DayPeriod::Evening => 18..=23,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayPeriod::Night => "night",
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Evening => "evening",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub glyph: String,
    pub color: String,
    #[serde(default)]
    pub is_built_in: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, glyph: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            glyph: glyph.into(),
            color: color.into(),
            is_built_in: false,
        }
    }

    fn built_in(id: &str, name: &str, glyph: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            glyph: glyph.to_string(),
            color: color.to_string(),
            is_built_in: true,
        }
    }

    /// Parses `#RRGGBB` or `#AARRGGBB` into an RGB triple, ignoring alpha.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let value = u32::from_str_radix(hex, 16).ok()?;
        Some(((value >> 16) as u8, (value >> 8) as u8, value as u8))
    }
}

/// Seed list installed on first run and by a reset. Ids are stable so that
/// assignments survive a reset.
pub fn default_categories() -> Vec<Category> {
    [
        ("work", "Work", "💼", "#007AFF"),
        ("admin", "Administration", "📋", "#5856D6"),
        ("email", "Email", "📧", "#34C759"),
        ("creative", "Creative", "🎨", "#FF9500"),
        ("commute", "Commute", "🚗", "#FF3B30"),
        ("break", "Break", "☕️", "#8E8E93"),
        ("sleep", "Sleep", "😴", "#1C1C1E"),
        ("health", "Health", "❤️", "#FF2D55"),
        ("family", "Family", "👨‍👩‍👧‍👦", "#AF52DE"),
        ("leisure", "Leisure", "🎮", "#5AC8FA"),
        ("learning", "Learning", "📚", "#FFCC00"),
        ("chores", "Chores", "🧹", "#32ADE6"),
        ("urgent", "Urgent", "🚨", "#FF3B30"),
        ("procrastination", "Procrastination", "📱", "#FF9500"),
        ("meals", "Meals", "🍽️", "#FF6B6B"),
        ("social", "Social", "👥", "#4ECDC4"),
        ("games", "Games", "🎯", "#95E1D3"),
        ("dev", "Development", "💻", "#00D4AA"),
        ("other", "Other", "📌", "#8E8E93"),
    ]
    .into_iter()
    .map(|(id, name, glyph, color)| Category::built_in(id, name, glyph, color))
    .collect()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT).ok()
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn format_minutes(total_minutes: u64) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours:02}:{minutes:02}")
}
