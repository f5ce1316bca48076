use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Remaining grams below which the day is flagged as nearly used up.
pub const LOW_REMAINING_GRAMS: f64 = 10.0;

/// Values used to seed a record the first time the store is read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordDefaults {
    pub daily_limit: f64,
    pub full_bag_weight: f64,
    pub empty_bag_weight: f64,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            daily_limit: 50.0,
            full_bag_weight: 810.0,
            empty_bag_weight: 10.0,
        }
    }
}

/// The single persisted record of a deployment.
///
/// Field names on the wire match the JSON layout of existing `data.json`
/// files, so a record written by an older install loads unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    #[serde(rename = "password", default)]
    pub password_hash: Option<String>,
    pub daily_limit: f64,
    pub full_bag_weight: f64,
    pub empty_bag_weight: f64,
    pub current_bag_weight: f64,
    #[serde(default)]
    pub feedings: Vec<FeedingEvent>,
}

impl AppRecord {
    #[must_use]
    pub fn new(defaults: &RecordDefaults) -> Self {
        Self {
            password_hash: None,
            daily_limit: defaults.daily_limit,
            full_bag_weight: defaults.full_bag_weight,
            empty_bag_weight: defaults.empty_bag_weight,
            current_bag_weight: defaults.full_bag_weight,
            feedings: Vec::new(),
        }
    }

    /// Feedings recorded on `date`, in log order.
    pub fn feedings_on(&self, date: NaiveDate) -> impl Iterator<Item = &FeedingEvent> {
        self.feedings.iter().filter(move |f| f.date == date)
    }

    /// Unrounded sum of the amounts recorded on `date`.
    #[must_use]
    pub fn eaten_on(&self, date: NaiveDate) -> f64 {
        self.feedings_on(date).map(|f| f.amount).sum()
    }

    /// Append a feeding and move the bag weight to its post-feeding reading.
    pub fn push_feeding(&mut self, feeding: FeedingEvent) {
        self.current_bag_weight = feeding.weight_after;
        self.feedings.push(feeding);
    }

    #[must_use]
    pub fn status_on(&self, date: NaiveDate) -> DailyStatus {
        let eaten = self.eaten_on(date);
        DailyStatus {
            current_bag_weight: self.current_bag_weight,
            daily_limit: self.daily_limit,
            total_eaten_today: round_tenth(eaten),
            remaining_today: round_tenth(self.daily_limit - eaten),
            feedings: self.feedings_on(date).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedingEvent {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub weight_before: f64,
    pub weight_after: f64,
    pub amount: f64,
}

impl FeedingEvent {
    /// Build an event stamped at `at`. Callers validate the weights first.
    #[must_use]
    pub fn at(at: DateTime<Utc>, weight_before: f64, weight_after: f64) -> Self {
        Self {
            date: at.date_naive(),
            timestamp: at,
            weight_before,
            weight_after,
            amount: weight_before - weight_after,
        }
    }
}

/// Today's view of the record, as returned by the status operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatus {
    pub current_bag_weight: f64,
    pub daily_limit: f64,
    pub total_eaten_today: f64,
    pub remaining_today: f64,
    pub feedings: Vec<FeedingEvent>,
}

impl DailyStatus {
    #[must_use]
    pub fn alert(&self) -> Option<LimitAlert> {
        if self.remaining_today < 0.0 {
            Some(LimitAlert::Over {
                excess: round_tenth(-self.remaining_today),
            })
        } else if self.remaining_today < LOW_REMAINING_GRAMS {
            Some(LimitAlert::Low {
                remaining: self.remaining_today,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitAlert {
    Over { excess: f64 },
    Low { remaining: f64 },
}

/// Result of a successful feeding, totals recomputed after the append.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedingReceipt {
    pub amount: f64,
    pub total_eaten_today: f64,
    pub remaining_today: f64,
}

/// Round to one decimal, halves going up (toward positive infinity).
#[must_use]
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}
