use chrono::{DateTime, Utc};

use crate::auth::{self, AuthOutcome};
use crate::error::{
    LIMIT_NOT_POSITIVE, LedgerError, Result, WEIGHT_INCREASED, WEIGHTS_NOT_NUMERIC,
};
use crate::models::{AppRecord, DailyStatus, FeedingEvent, FeedingReceipt, RecordDefaults};
use crate::store::Store;

/// Password-gated feeding log over any [`Store`].
///
/// Each operation loads the record once, authenticates against it, applies
/// its change, and saves. Nothing here locks: two ledgers sharing a backing
/// store race with last-writer-wins semantics.
pub struct Ledger<S> {
    store: S,
    defaults: RecordDefaults,
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S, defaults: RecordDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn password_set(&self) -> Result<bool> {
        Ok(self.load()?.password_hash.is_some())
    }

    /// Check `password` against the stored hash without claiming the tracker.
    ///
    /// Always `false` while no password has been set.
    pub fn password_matches(&self, password: &str) -> Result<bool> {
        match self.load()?.password_hash.as_deref() {
            Some(hash) => Ok(auth::verify_password(password, hash)?),
            None => Ok(false),
        }
    }

    pub fn status(&self, password: Option<&str>) -> Result<DailyStatus> {
        self.status_at(Utc::now(), password)
    }

    pub fn status_at(&self, now: DateTime<Utc>, password: Option<&str>) -> Result<DailyStatus> {
        let record = self.authorized(password)?;
        Ok(record.status_on(now.date_naive()))
    }

    /// Record a feeding from scale readings taken before and after filling the bowl.
    ///
    /// `None` stands for a reading that was missing or not a number.
    pub fn record_feeding(
        &self,
        password: Option<&str>,
        weight_before: Option<f64>,
        weight_after: Option<f64>,
    ) -> Result<FeedingReceipt> {
        self.record_feeding_at(Utc::now(), password, weight_before, weight_after)
    }

    pub fn record_feeding_at(
        &self,
        now: DateTime<Utc>,
        password: Option<&str>,
        weight_before: Option<f64>,
        weight_after: Option<f64>,
    ) -> Result<FeedingReceipt> {
        let mut record = self.authorized(password)?;
        let (before, after) = validate_weights(weight_before, weight_after)?;

        let feeding = FeedingEvent::at(now, before, after);
        let amount = feeding.amount;
        record.push_feeding(feeding);
        self.store.save(&record)?;
        tracing::info!(amount, bag_weight = after, "recorded feeding");

        let status = record.status_on(now.date_naive());
        Ok(FeedingReceipt {
            amount,
            total_eaten_today: status.total_eaten_today,
            remaining_today: status.remaining_today,
        })
    }

    /// Change the daily limit. Returns the limit now in effect.
    pub fn set_daily_limit(&self, password: Option<&str>, grams: f64) -> Result<f64> {
        let mut record = self.authorized(password)?;
        if !grams.is_finite() || grams <= 0.0 {
            return Err(LedgerError::InvalidInput(LIMIT_NOT_POSITIVE.to_string()));
        }
        record.daily_limit = grams;
        self.store.save(&record)?;
        tracing::info!(daily_limit = grams, "changed daily limit");
        Ok(record.daily_limit)
    }

    fn load(&self) -> Result<AppRecord> {
        Ok(self.store.load(&self.defaults)?)
    }

    /// Load the record and run the password gate, persisting a bootstrapped hash.
    fn authorized(&self, password: Option<&str>) -> Result<AppRecord> {
        let mut record = self.load()?;
        if auth::authenticate(&mut record, password)? == AuthOutcome::Bootstrapped {
            self.store.save(&record)?;
            tracing::info!("shared password set on first use");
        }
        Ok(record)
    }
}

fn validate_weights(before: Option<f64>, after: Option<f64>) -> Result<(f64, f64)> {
    let (Some(before), Some(after)) = (before, after) else {
        return Err(LedgerError::InvalidInput(WEIGHTS_NOT_NUMERIC.to_string()));
    };
    if !before.is_finite() || !after.is_finite() {
        return Err(LedgerError::InvalidInput(WEIGHTS_NOT_NUMERIC.to_string()));
    }
    if before < after {
        return Err(LedgerError::InvalidInput(WEIGHT_INCREASED.to_string()));
    }
    Ok((before, after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    use crate::db::Database;
    use crate::models::RecordDefaults;
    use crate::store::FileStore;

    const PASSWORD: Option<&str> = Some("brokjes");

    fn ledger() -> Ledger<Database> {
        Ledger::new(
            Database::open_in_memory().unwrap(),
            RecordDefaults::default(),
        )
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_password_not_set_initially() {
        let ledger = ledger();
        assert!(!ledger.password_set().unwrap());
        // Reading the flag creates the default record
        assert!(ledger.store().fetch().unwrap().is_some());
    }

    #[test]
    fn test_first_status_call_claims_password() {
        let ledger = ledger();
        ledger.status(PASSWORD).unwrap();
        assert!(ledger.password_set().unwrap());

        ledger.status(PASSWORD).unwrap();
        assert!(matches!(
            ledger.status(Some("verkeerd")),
            Err(LedgerError::AuthInvalid)
        ));
        assert!(matches!(ledger.status(None), Err(LedgerError::AuthRequired)));
    }

    #[test]
    fn test_status_without_password_leaves_hash_unset() {
        let ledger = ledger();
        assert!(matches!(ledger.status(Some("")), Err(LedgerError::AuthRequired)));
        assert!(!ledger.password_set().unwrap());
    }

    #[test]
    fn test_feed_updates_amount_and_bag_weight() {
        let ledger = ledger();
        let receipt = ledger
            .record_feeding_at(at(2024, 6, 15, 8), PASSWORD, Some(700.0), Some(650.0))
            .unwrap();
        assert!(close(receipt.amount, 50.0));
        assert!(close(receipt.total_eaten_today, 50.0));
        assert!(close(receipt.remaining_today, 0.0));

        let record = ledger.store().fetch().unwrap().unwrap();
        assert!(close(record.current_bag_weight, 650.0));
        assert_eq!(record.feedings.len(), 1);
        assert_eq!(
            record.feedings[0].date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn test_feed_increasing_weight_is_rejected_without_mutation() {
        let ledger = ledger();
        ledger.status(PASSWORD).unwrap();
        let before = ledger.store().fetch().unwrap();

        let err = ledger
            .record_feeding(PASSWORD, Some(600.0), Some(650.0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(ref m) if m == WEIGHT_INCREASED));
        assert_eq!(ledger.store().fetch().unwrap(), before);
    }

    #[test]
    fn test_feed_missing_or_non_finite_weights() {
        let ledger = ledger();
        for (b, a) in [
            (None, Some(1.0)),
            (Some(1.0), None),
            (Some(f64::NAN), Some(1.0)),
            (Some(f64::INFINITY), Some(1.0)),
        ] {
            let err = ledger.record_feeding(PASSWORD, b, a).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidInput(ref m) if m == WEIGHTS_NOT_NUMERIC));
        }
        assert!(ledger.store().fetch().unwrap().unwrap().feedings.is_empty());
    }

    #[test]
    fn test_feed_equal_weights_records_zero() {
        let ledger = ledger();
        let receipt = ledger
            .record_feeding(PASSWORD, Some(500.0), Some(500.0))
            .unwrap();
        assert!(close(receipt.amount, 0.0));
    }

    #[test]
    fn test_feed_requires_auth_before_validation() {
        let ledger = ledger();
        ledger.status(PASSWORD).unwrap();
        assert!(matches!(
            ledger.record_feeding(Some("verkeerd"), Some(1.0), Some(2.0)),
            Err(LedgerError::AuthInvalid)
        ));
    }

    #[test]
    fn test_first_feed_with_bad_weights_still_claims_password() {
        let ledger = ledger();
        assert!(matches!(
            ledger.record_feeding(PASSWORD, Some(600.0), Some(650.0)),
            Err(LedgerError::InvalidInput(msg)) if msg == WEIGHT_INCREASED
        ));
        assert!(ledger.password_set().unwrap());
        assert!(ledger.store().fetch().unwrap().unwrap().feedings.is_empty());
        assert!(matches!(
            ledger.status(Some("verkeerd")),
            Err(LedgerError::AuthInvalid)
        ));
    }

    #[test]
    fn test_password_matches_never_claims() {
        let ledger = ledger();
        assert!(!ledger.password_matches("brokjes").unwrap());
        assert!(!ledger.password_set().unwrap());

        ledger.status(PASSWORD).unwrap();
        assert!(ledger.password_matches("brokjes").unwrap());
        assert!(!ledger.password_matches("verkeerd").unwrap());
    }

    #[test]
    fn test_record_from_node_service_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let hash = bcrypt::hash("brokjes", 10).unwrap();
        let legacy = serde_json::json!({
            "password": hash,
            "dailyLimit": 50,
            "fullBagWeight": 810,
            "emptyBagWeight": 10,
            "currentBagWeight": 700,
            "feedings": []
        });
        std::fs::write(&path, legacy.to_string()).unwrap();

        let ledger = Ledger::new(FileStore::new(&path), RecordDefaults::default());
        assert!(ledger.password_set().unwrap());
        let status = ledger.status(PASSWORD).unwrap();
        assert!(close(status.current_bag_weight, 700.0));
        assert!(matches!(
            ledger.status(Some("verkeerd")),
            Err(LedgerError::AuthInvalid)
        ));

        let receipt = ledger
            .record_feeding(PASSWORD, Some(700.0), Some(680.0))
            .unwrap();
        assert!(close(receipt.amount, 20.0));
        let stored = ledger.store().fetch().unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some(hash.as_str()));
    }

    #[test]
    fn test_status_only_counts_today() {
        let ledger = ledger();
        ledger
            .record_feeding_at(at(2024, 6, 14, 23), PASSWORD, Some(800.0), Some(760.0))
            .unwrap();
        ledger
            .record_feeding_at(at(2024, 6, 15, 7), PASSWORD, Some(760.0), Some(747.7))
            .unwrap();
        let receipt = ledger
            .record_feeding_at(at(2024, 6, 15, 18), PASSWORD, Some(747.7), Some(727.7))
            .unwrap();
        assert!(close(receipt.total_eaten_today, 32.3));
        assert!(close(receipt.remaining_today, 17.7));

        let status = ledger.status_at(at(2024, 6, 15, 20), PASSWORD).unwrap();
        assert_eq!(status.feedings.len(), 2);
        assert!(close(status.total_eaten_today, 32.3));
        assert!(close(status.remaining_today, 17.7));
        assert!(close(status.current_bag_weight, 727.7));
        assert!(close(status.daily_limit, 50.0));

        let next_day = ledger.status_at(at(2024, 6, 16, 6), PASSWORD).unwrap();
        assert!(next_day.feedings.is_empty());
        assert!(close(next_day.total_eaten_today, 0.0));
        assert!(close(next_day.remaining_today, 50.0));
    }

    #[test]
    fn test_set_daily_limit() {
        let ledger = ledger();
        assert!(close(ledger.set_daily_limit(PASSWORD, 60.0).unwrap(), 60.0));
        let status = ledger.status(PASSWORD).unwrap();
        assert!(close(status.daily_limit, 60.0));

        for bad in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                ledger.set_daily_limit(PASSWORD, bad),
                Err(LedgerError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            ledger.set_daily_limit(Some("verkeerd"), 70.0),
            Err(LedgerError::AuthInvalid)
        ));
    }

    #[test]
    fn test_custom_defaults_seed_new_record() {
        let ledger = Ledger::new(
            Database::open_in_memory().unwrap(),
            RecordDefaults {
                daily_limit: 35.0,
                ..RecordDefaults::default()
            },
        );
        let status = ledger.status(PASSWORD).unwrap();
        assert!(close(status.daily_limit, 35.0));
        assert!(close(status.remaining_today, 35.0));
    }
}
