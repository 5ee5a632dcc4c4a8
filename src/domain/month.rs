use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar month, ordered chronologically by `(year, month)`.
///
/// Month keys are structural; the localized label ("ene 2024") is only
/// produced at the presentation boundary via [`Locale::month_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    /// 1-based month index (January = 1).
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    pub fn of(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp.year(), timestamp.month())
    }

    /// The month `count` months before this one.
    pub fn months_back(self, count: u32) -> Self {
        let zero_based = self.year * 12 + self.month as i32 - 1 - count as i32;
        Self::new(zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1)
    }

    /// First instant of the month, in UTC.
    pub fn start(self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// The trailing window of `months` calendar months ending at the month of `now`.
///
/// A timestamp is inside the window when it falls in one of the window's
/// months and in `[now - months, now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindow {
    pub now: DateTime<Utc>,
    pub months: u32,
}

impl TrailingWindow {
    pub fn new(now: DateTime<Utc>, months: u32) -> Self {
        Self { now, months }
    }

    /// Months of the window, oldest first.
    pub fn month_keys(&self) -> Vec<MonthKey> {
        let current = MonthKey::of(self.now);
        (0..self.months)
            .rev()
            .map(|back| current.months_back(back))
            .collect()
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.now
            .checked_sub_months(Months::new(self.months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if self.months == 0 || timestamp < self.cutoff() || timestamp >= self.now {
            return false;
        }
        let key = MonthKey::of(timestamp);
        let current = MonthKey::of(self.now);
        key <= current && key > current.months_back(self.months)
    }
}

/// Locale used for labels rendered at the presentation boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

const MONTHS_ES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];
const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Es => "es",
            Locale::En => "en",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "es" | "es-es" => Some(Locale::Es),
            "en" | "en-us" | "en-gb" => Some(Locale::En),
            _ => None,
        }
    }

    pub fn short_month_name(&self, month: u32) -> &'static str {
        let names = match self {
            Locale::Es => &MONTHS_ES,
            Locale::En => &MONTHS_EN,
        };
        names[(month.clamp(1, 12) - 1) as usize]
    }

    pub fn month_label(&self, key: MonthKey) -> String {
        format!("{} {}", self.short_month_name(key.month), key.year)
    }

    /// Label for records whose student cannot be resolved.
    pub fn unassigned_label(&self) -> &'static str {
        match self {
            Locale::Es => "Sin asignar",
            Locale::En => "Unassigned",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
