use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::warn;

use crate::db;
use crate::error::PortalResult;

pub const DIGEST_LAST_FIRED: &str = "daily_digest_last_fired";

/// Durable key-value entries the worker consults between passes.
///
/// The in-memory variant forgets everything on restart and is only used
/// when no database is configured.
pub enum StateStore {
    Postgres(PgPool),
    Memory(Mutex<HashMap<String, String>>),
}

impl StateStore {
    pub fn memory() -> Self {
        StateStore::Memory(Mutex::new(HashMap::new()))
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, StateStore::Postgres(_))
    }

    pub async fn get(&self, key: &str) -> PortalResult<Option<String>> {
        match self {
            StateStore::Postgres(pool) => Ok(db::fetch_state(pool, key).await?),
            StateStore::Memory(entries) => Ok(entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(key)
                .cloned()),
        }
    }

    pub async fn put(&self, key: &str, value: &str) -> PortalResult<()> {
        match self {
            StateStore::Postgres(pool) => Ok(db::store_state(pool, key, value).await?),
            StateStore::Memory(entries) => {
                entries
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Last local date the daily digest went out; unreadable values count as never.
    pub async fn last_digest_date(&self) -> PortalResult<Option<NaiveDate>> {
        let Some(raw) = self.get(DIGEST_LAST_FIRED).await? else {
            return Ok(None);
        };
        match raw.parse::<NaiveDate>() {
            Ok(date) => Ok(Some(date)),
            Err(err) => {
                warn!(value = %raw, error = %err, "ignoring unreadable digest date");
                Ok(None)
            }
        }
    }

    pub async fn record_digest_date(&self, date: NaiveDate) -> PortalResult<()> {
        self.put(DIGEST_LAST_FIRED, &date.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_digest_date() {
        let state = StateStore::memory();
        assert!(!state.is_durable());
        assert_eq!(state.last_digest_date().await.unwrap(), None);

        let date = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();
        state.record_digest_date(date).await.unwrap();
        assert_eq!(state.last_digest_date().await.unwrap(), Some(date));
    }

    #[tokio::test]
    async fn garbage_digest_date_reads_as_never() {
        let state = StateStore::memory();
        state.put(DIGEST_LAST_FIRED, "last tuesday").await.unwrap();
        assert_eq!(state.last_digest_date().await.unwrap(), None);
    }
}
