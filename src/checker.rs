// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The orchestrator: owns the schedule, the pause switch, the download
//! history and the delivery of finished episodes. All network and filesystem
//! work for a check happens behind the worker transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{CHECK_INTERVAL, Settings};
use crate::delivery::{DeliveryAgent, delivery_argument};
use crate::episode::DownloadedEpisode;
use crate::error::CheckError;
use crate::history::{HistoryItem, HistoryStore};
use crate::worker::WorkerTransport;

/// Whether the checker is running on its schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Polling,
    Paused,
}

/// The outcome of the most recent check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum LastCheckStatus {
    NeverHappened,
    InProgress,
    Successful(DateTime<Utc>),
    /// The configuration was unusable, so the check did not run
    Skipped(DateTime<Utc>),
    Failed(DateTime<Utc>, CheckError),
}

/// Checker state changes, published only when something actually changed
pub trait CheckerObserver: Send + Sync {
    fn status_changed(&self, _status: Status, _last_check: &LastCheckStatus) {}
    fn episode_delivered(&self, _episode: &DownloadedEpisode) {}
}

pub struct NoopObserver;

impl CheckerObserver for NoopObserver {}

/// Keeps the machine awake while checks are scheduled.
///
/// The real implementation is platform specific; the default just records
/// what it would do.
pub trait SleepInhibitor: Send + Sync {
    fn set_prevented(&self, prevented: bool);
}

pub struct LoggingSleepInhibitor;

impl SleepInhibitor for LoggingSleepInhibitor {
    fn set_prevented(&self, prevented: bool) {
        debug!(prevented, "system sleep prevention");
    }
}

/// Requests from the outside world, handled between checks
#[derive(Debug)]
pub enum CheckerCommand {
    ForceCheck,
    SetPaused(bool),
    Shutdown,
}

type PendingCheck =
    Pin<Box<dyn Future<Output = Result<Vec<DownloadedEpisode>, CheckError>> + Send>>;

pub struct FeedChecker {
    settings: Settings,
    history: HistoryStore,
    transport: Arc<dyn WorkerTransport>,
    delivery: Arc<dyn DeliveryAgent>,
    observer: Arc<dyn CheckerObserver>,
    sleep: Box<dyn SleepInhibitor>,
    status: Status,
    last_check_status: LastCheckStatus,
}

impl FeedChecker {
    pub fn new(
        settings: Settings,
        history: HistoryStore,
        transport: Arc<dyn WorkerTransport>,
        delivery: Arc<dyn DeliveryAgent>,
    ) -> Self {
        Self {
            settings,
            history,
            transport,
            delivery,
            observer: Arc::new(NoopObserver),
            sleep: Box::new(LoggingSleepInhibitor),
            status: Status::Polling,
            last_check_status: LastCheckStatus::NeverHappened,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CheckerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sleep_inhibitor(mut self, sleep: Box<dyn SleepInhibitor>) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn last_check_status(&self) -> &LastCheckStatus {
        &self.last_check_status
    }

    /// Run checks on the schedule until a shutdown command arrives or the
    /// command channel closes.
    ///
    /// Everything is driven from this single loop, so at most one check is
    /// ever in flight. A force-check that arrives while one is running is
    /// dropped, not queued.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<CheckerCommand>,
        mut interruptions: mpsc::UnboundedReceiver<()>,
    ) {
        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.refresh_sleep_prevention();

        let mut pending: Option<PendingCheck> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(check) = self.begin_check(false) {
                        pending = Some(check);
                    }
                }

                result = poll_pending(&mut pending) => {
                    pending = None;
                    self.complete_check(result).await;
                }

                Some(()) = interruptions.recv() => {
                    pending = None;
                    self.handle_worker_interruption();
                }

                command = commands.recv() => {
                    match command {
                        Some(CheckerCommand::ForceCheck) => {
                            if let Some(check) = self.begin_check(true) {
                                pending = Some(check);
                                // The next scheduled check counts from now
                                ticker.reset();
                            }
                        }

                        Some(CheckerCommand::SetPaused(paused)) => {
                            if self.set_paused(paused) && !paused {
                                if let Some(check) = self.begin_check(false) {
                                    pending = Some(check);
                                    ticker.reset();
                                }
                            }
                        }

                        Some(CheckerCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        info!("shutting down");

        if let Err(e) = self.history.persist() {
            warn!("could not persist history on shutdown: {e}");
        }
    }

    /// Run exactly one forced check to completion. For one-shot use without
    /// the schedule.
    pub async fn check_once(&mut self) -> &LastCheckStatus {
        if let Some(check) = self.begin_check(true) {
            let result = check.await;
            self.complete_check(result).await;
        }

        &self.last_check_status
    }

    /// Start a check if one is allowed right now.
    ///
    /// Scheduled checks respect the pause switch and the time-of-day
    /// restriction; forced checks bypass both. An unusable configuration
    /// turns the check into a skip before the worker is ever involved.
    fn begin_check(&mut self, forced: bool) -> Option<PendingCheck> {
        if self.last_check_status == LastCheckStatus::InProgress {
            debug!("check already in progress");
            return None;
        }

        if !forced {
            if self.status == Status::Paused {
                debug!("paused, skipping scheduled check");
                return None;
            }

            if self.settings.restricts(Local::now().time()) {
                debug!("outside the update window, skipping scheduled check");
                return None;
            }
        }

        let options = self.settings.download_options();

        if let Err(e) = self.settings.validate().and_then(|()| options.validate()) {
            info!("configuration is unusable, skipping check: {e}");
            self.set_last_check_status(LastCheckStatus::Skipped(Utc::now()));
            return None;
        }

        info!(feeds = self.settings.feeds.len(), forced, "checking feeds");
        self.set_last_check_status(LastCheckStatus::InProgress);

        let transport = Arc::clone(&self.transport);
        let feeds = self.settings.feeds.clone();
        let skip_urls = self.history.downloaded_urls();

        Some(Box::pin(async move {
            transport.check_feeds(feeds, options, skip_urls).await
        }))
    }

    async fn complete_check(&mut self, result: Result<Vec<DownloadedEpisode>, CheckError>) {
        if self.last_check_status != LastCheckStatus::InProgress {
            // The check was already concluded, e.g. by a worker interruption
            debug!("discarding result of a concluded check");
            return;
        }

        match result {
            Ok(episodes) => {
                info!(count = episodes.len(), "check finished");

                for episode in &episodes {
                    self.deliver(episode).await;
                }

                self.set_last_check_status(LastCheckStatus::Successful(Utc::now()));
            }
            Err(error) => {
                warn!("check failed: {error}");
                self.set_last_check_status(LastCheckStatus::Failed(Utc::now(), error));
            }
        }
    }

    /// Hand one downloaded episode to its destination and record it.
    ///
    /// A failing script leaves the episode out of history, so the next check
    /// downloads and delivers it again.
    async fn deliver(&mut self, episode: &DownloadedEpisode) {
        let argument = delivery_argument(episode);

        if let Some(script) = self.settings.resolved_script_path() {
            if !self.delivery.run_script(&script, &argument).await {
                return;
            }
        } else if self.settings.open_automatically {
            self.delivery.open_in_background(&argument);
        }

        let item = HistoryItem {
            episode: episode.episode.clone(),
            download_date: Some(Utc::now()),
        };

        if let Err(e) = self.history.append(item) {
            warn!(title = %episode.episode.title, "could not record download: {e}");
        }

        self.observer.episode_delivered(episode);
    }

    /// The worker connection broke. If a check was riding on it, fail the
    /// check; results arriving for it later are discarded.
    fn handle_worker_interruption(&mut self) {
        if self.last_check_status == LastCheckStatus::InProgress {
            warn!("worker crashed during a check");
            self.set_last_check_status(LastCheckStatus::Failed(
                Utc::now(),
                CheckError::ServiceCrashed,
            ));
        } else {
            debug!("worker connection interrupted while idle");
        }
    }

    /// Returns whether the status actually changed
    fn set_paused(&mut self, paused: bool) -> bool {
        let status = if paused {
            Status::Paused
        } else {
            Status::Polling
        };

        if self.status == status {
            return false;
        }

        info!(?status, "checker status changed");
        self.status = status;
        self.observer.status_changed(self.status, &self.last_check_status);
        self.refresh_sleep_prevention();

        true
    }

    fn set_last_check_status(&mut self, last_check_status: LastCheckStatus) {
        if self.last_check_status == last_check_status {
            return;
        }

        self.last_check_status = last_check_status;
        self.observer.status_changed(self.status, &self.last_check_status);
    }

    fn refresh_sleep_prevention(&self) {
        self.sleep
            .set_prevented(self.settings.prevent_system_sleep && self.status == Status::Polling);
    }
}

async fn poll_pending(
    pending: &mut Option<PendingCheck>,
) -> Result<Vec<DownloadedEpisode>, CheckError> {
    match pending {
        Some(check) => check.as_mut().await,
        None => std::future::pending().await,
    }
}
