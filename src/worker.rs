use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::{self, ClassificationReport};
use crate::config::local_now;
use crate::digest::{self, DigestReport};
use crate::notify::Notifier;
use crate::sheet::TabularStore;
use crate::state::StateStore;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub local: FixedOffset,
    pub interval: Duration,
    pub digest_hour: u32,
    pub operator_phone: Option<String>,
}

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub classification: ClassificationReport,
    pub digest: Option<DigestReport>,
}

/// Background poll-and-patch loop.
pub struct Worker {
    store: Arc<dyn TabularStore>,
    notifier: Arc<Notifier>,
    state: StateStore,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        store: Arc<dyn TabularStore>,
        notifier: Arc<Notifier>,
        state: StateStore,
        settings: WorkerSettings,
    ) -> Self {
        Worker {
            store,
            notifier,
            state,
            settings,
        }
    }

    pub async fn classify(&self, now: NaiveDateTime) -> anyhow::Result<ClassificationReport> {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let local = self.settings.local;
        let report = tokio::task::spawn_blocking(move || {
            classify::run(store.as_ref(), &notifier, local, now)
        })
        .await
        .context("classification task panicked")??;
        Ok(report)
    }

    /// Sends the digest unconditionally. The date is recorded once the
    /// inputs have been read and before any message goes out, so a read
    /// failure leaves the day open and a send never repeats the same day.
    pub async fn send_digest(&self, today: NaiveDate) -> anyhow::Result<DigestReport> {
        let store = Arc::clone(&self.store);
        let entries = tokio::task::spawn_blocking(move || digest::load_digest(store.as_ref()))
            .await
            .context("digest task panicked")??;

        self.state.record_digest_date(today).await?;

        let notifier = Arc::clone(&self.notifier);
        let operator = self.settings.operator_phone.clone();
        let report = tokio::task::spawn_blocking(move || {
            digest::deliver_digest(&notifier, operator.as_deref(), today, &entries)
        })
        .await
        .context("digest task panicked")?;
        Ok(report)
    }

    pub async fn digest_if_due(&self, now: NaiveDateTime) -> anyhow::Result<Option<DigestReport>> {
        let last_fired = self.state.last_digest_date().await?;
        if !digest::is_due(last_fired, now, self.settings.digest_hour) {
            return Ok(None);
        }
        Ok(Some(self.send_digest(now.date()).await?))
    }

    /// Classification and the digest gate run independently; a failure in
    /// one does not skip the other. The first error is returned.
    pub async fn run_pass(&self, now: NaiveDateTime) -> anyhow::Result<PassOutcome> {
        let classification = self.classify(now).await;
        if let Err(err) = &classification {
            warn!(error = %format!("{err:#}"), "classification failed");
        }
        let digest = self.digest_if_due(now).await;
        if let Err(err) = &digest {
            warn!(error = %format!("{err:#}"), "digest failed");
        }
        Ok(PassOutcome {
            classification: classification?,
            digest: digest?,
        })
    }

    /// Runs passes on a fixed interval until Ctrl-C. A failed pass is logged
    /// and the next one starts on schedule.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.settings.interval.as_secs(),
            durable_state = self.state.is_durable(),
            "worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested, stopping worker");
                    return Ok(());
                }
            }

            let pass_id = Uuid::new_v4();
            let now = local_now(self.settings.local);
            match self
                .run_pass(now)
                .instrument(info_span!("worker_pass", %pass_id))
                .await
            {
                Ok(outcome) => {
                    if outcome.classification.classified > 0 || outcome.digest.is_some() {
                        info!(
                            %pass_id,
                            classified = outcome.classification.classified,
                            digest = outcome.digest.is_some(),
                            "worker pass finished"
                        );
                    }
                }
                Err(err) => error!(%pass_id, error = %format!("{err:#}"), "worker pass failed"),
            }
        }
    }
}
