use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::aggregate::pool_entries;
use crate::engine::history::{self, Block, HistoryDay};
use crate::engine::{streak, DayValue, DayZone, Interval, StreakStatus};
use crate::error::{AppError, AppResult};
use crate::models::log_entry::{LogEntry, TimeRange};
use crate::models::tracker::{default_history_days, Tracker};
use crate::store::{EntityStore, StoreResult};

/// Derives streak status and history for trackers from stored log entries.
/// Nothing is cached; every call reads the store.
#[derive(Clone)]
pub struct ConsistencyService {
    store: Arc<dyn EntityStore>,
    zone: DayZone,
    lookback_days: usize,
    max_history_days: usize,
}

impl ConsistencyService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        zone: DayZone,
        lookback_days: usize,
        max_history_days: usize,
    ) -> Self {
        Self {
            store,
            zone,
            lookback_days: lookback_days.max(1),
            max_history_days,
        }
    }

    pub fn from_config(store: Arc<dyn EntityStore>, config: &Config) -> Self {
        Self::new(
            store,
            config.day_zone,
            config.streak_lookback_days,
            config.max_history_days,
        )
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// Status of one tracker. Anonymous callers, foreign trackers and
    /// missing trackers all read as zeros.
    pub async fn get_status(&self, caller: Option<&str>, tracker_id: Uuid) -> AppResult<StreakStatus> {
        self.get_status_at(caller, tracker_id, Utc::now()).await
    }

    pub async fn get_status_at(
        &self,
        caller: Option<&str>,
        tracker_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<StreakStatus> {
        let Some(caller) = caller else {
            return Ok(StreakStatus::default());
        };
        match self.store.get_tracker(tracker_id).await? {
            Some(tracker) if tracker.user_id == caller => Ok(self.evaluate(&tracker, now).await?),
            Some(_) => {
                tracing::debug!(tracker_id = %tracker_id, "status requested for foreign tracker");
                Ok(StreakStatus::default())
            }
            None => Ok(StreakStatus::default()),
        }
    }

    /// Status of every tracker the caller owns, keyed by tracker id.
    pub async fn get_statuses(&self, caller: Option<&str>) -> AppResult<BTreeMap<Uuid, StreakStatus>> {
        self.get_statuses_at(caller, Utc::now()).await
    }

    pub async fn get_statuses_at(
        &self,
        caller: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<BTreeMap<Uuid, StreakStatus>> {
        let Some(caller) = caller else {
            return Ok(BTreeMap::new());
        };
        let trackers = self.store.list_trackers_by_owner(caller).await?;
        let statuses = try_join_all(trackers.iter().map(|tracker| async move {
            self.evaluate(tracker, now)
                .await
                .map(|status| (tracker.id, status))
        }))
        .await?;
        Ok(statuses.into_iter().collect())
    }

    /// Per-day history, oldest first. `days` defaults per interval and is
    /// capped at the configured maximum.
    pub async fn get_history(
        &self,
        caller: Option<&str>,
        tracker_id: Uuid,
        days: Option<usize>,
    ) -> AppResult<Vec<HistoryDay>> {
        self.get_history_at(caller, tracker_id, days, Utc::now()).await
    }

    pub async fn get_history_at(
        &self,
        caller: Option<&str>,
        tracker_id: Uuid,
        days: Option<usize>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<HistoryDay>> {
        let Some(caller) = caller else {
            return Ok(Vec::new());
        };
        let tracker = self.owned_tracker(caller, tracker_id).await?;
        let values = self.history_values(&tracker, days, now).await?;
        Ok(history::history_rows(&values, &tracker.rule, tracker.interval))
    }

    /// History grouped for display: one block per day, or one per week with
    /// its days for weekly trackers.
    pub async fn get_blocks(
        &self,
        caller: Option<&str>,
        tracker_id: Uuid,
        days: Option<usize>,
    ) -> AppResult<Vec<Block>> {
        self.get_blocks_at(caller, tracker_id, days, Utc::now()).await
    }

    pub async fn get_blocks_at(
        &self,
        caller: Option<&str>,
        tracker_id: Uuid,
        days: Option<usize>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Block>> {
        let Some(caller) = caller else {
            return Ok(Vec::new());
        };
        let tracker = self.owned_tracker(caller, tracker_id).await?;
        let values = self.history_values(&tracker, days, now).await?;
        Ok(history::blocks(&values, &tracker.rule, tracker.interval))
    }

    /// Streak status of a tracker the caller is already known to own.
    pub async fn evaluate(&self, tracker: &Tracker, now: DateTime<Utc>) -> StoreResult<StreakStatus> {
        let today = self.zone.today(now);
        let days = self.status_window_days(tracker.interval, today);
        let values = self.day_values(tracker, today, days).await?;
        let status = streak::status(&values, &tracker.rule, tracker.interval);
        tracing::debug!(
            tracker_id = %tracker.id,
            interval = %tracker.interval,
            days,
            current = status.current,
            longest = status.longest,
            "tracker status evaluated"
        );
        Ok(status)
    }

    async fn owned_tracker(&self, caller: &str, tracker_id: Uuid) -> AppResult<Tracker> {
        let tracker = self
            .store
            .get_tracker(tracker_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tracker not found".into()))?;
        if tracker.user_id != caller {
            return Err(AppError::Forbidden);
        }
        Ok(tracker)
    }

    async fn history_values(
        &self,
        tracker: &Tracker,
        days: Option<usize>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<DayValue>> {
        let days = days
            .unwrap_or_else(|| default_history_days(tracker.interval))
            .min(self.max_history_days);
        let today = self.zone.today(now);
        self.day_values(tracker, today, days).await
    }

    // Weekly lookbacks are widened back to a Sunday so the oldest week is
    // complete.
    fn status_window_days(&self, interval: Interval, today: NaiveDate) -> usize {
        match interval {
            Interval::Day => self.lookback_days,
            Interval::Week => {
                let first = history::week_start(history::window_start(today, self.lookback_days));
                ((today - first).num_days() + 1) as usize
            }
        }
    }

    async fn day_values(
        &self,
        tracker: &Tracker,
        today: NaiveDate,
        days: usize,
    ) -> StoreResult<Vec<DayValue>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let entries = match history::window_range(&self.zone, today, days) {
            Some(range) => self.entries_for(tracker, range).await?,
            None => Vec::new(),
        };
        Ok(history::build_history(
            &entries,
            &tracker.field,
            &self.zone,
            today,
            days,
        ))
    }

    async fn entries_for(&self, tracker: &Tracker, range: TimeRange) -> StoreResult<Vec<LogEntry>> {
        if tracker.log_type_ids.is_empty() {
            let mut entries = self.store.list_entries_by_owner(&tracker.user_id).await?;
            entries.retain(|entry| range.contains(entry.timestamp));
            return Ok(entries);
        }

        let sources = try_join_all(
            tracker
                .log_type_ids
                .iter()
                .map(|type_id| self.entries_of_type(tracker, *type_id, range)),
        )
        .await?;
        Ok(pool_entries(sources))
    }

    // A deleted or foreign log type contributes nothing.
    async fn entries_of_type(
        &self,
        tracker: &Tracker,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Vec<LogEntry>> {
        match self.store.get_log_type(type_id).await? {
            Some(log_type) if log_type.user_id == tracker.user_id => {
                if !log_type.has_field(&tracker.field) {
                    tracing::debug!(
                        tracker_id = %tracker.id,
                        log_type_id = %type_id,
                        field = %tracker.field,
                        "log type does not declare tracked field"
                    );
                }
                self.store
                    .list_entries_by_owner_and_type(&tracker.user_id, type_id, range)
                    .await
            }
            Some(_) => {
                tracing::warn!(tracker_id = %tracker.id, log_type_id = %type_id, "tracker references foreign log type");
                Ok(Vec::new())
            }
            None => {
                tracing::debug!(tracker_id = %tracker.id, log_type_id = %type_id, "referenced log type is gone");
                Ok(Vec::new())
            }
        }
    }
}
