use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use duebell_board::BoardSource;
use duebell_core::config::ReminderConfig;
use duebell_core::types::DueCategory;
use duebell_notify::{Dispatcher, MessageId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    dedup::DedupTracker,
    error::{Result, SchedulerError},
    history::RunHistory,
    types::{
        DeliveryStatus, DueCardReport, LastStatus, RunOutcome, RunSummary, SchedulerSnapshot,
        SchedulerState, Trigger,
    },
    window::{evaluate, WindowSettings},
};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Handle to the interval task.
struct Runner {
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the reminder cycle, its dedup state and run history.
///
/// Shared by `Arc` between the interval task and the HTTP layer.
pub struct ReminderScheduler {
    board: Arc<dyn BoardSource>,
    dispatcher: Dispatcher,
    window: WindowSettings,
    dedup: DedupTracker,
    history: RunHistory,
    cycle_lock: tokio::sync::Mutex<()>,
    in_flight: AtomicBool,
    runner: Mutex<Option<Runner>>,
    clock: Clock,
}

impl ReminderScheduler {
    pub fn new(
        board: Arc<dyn BoardSource>,
        dispatcher: Dispatcher,
        config: &ReminderConfig,
    ) -> Self {
        Self {
            board,
            dispatcher,
            window: WindowSettings::from_config(config),
            dedup: DedupTracker::new(config.overdue_retention()),
            history: RunHistory::new(config.history_size),
            cycle_lock: tokio::sync::Mutex::new(()),
            in_flight: AtomicBool::new(false),
            runner: Mutex::new(None),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for window evaluation and dedup stamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Spawn the interval task. The first cycle runs immediately.
    pub fn start(self: &Arc<Self>, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        let mut runner = self.runner.lock().unwrap_or_else(|e| e.into_inner());
        if runner.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(self).run(interval, shutdown_rx));
        *runner = Some(Runner {
            interval,
            shutdown_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs(), "reminder scheduler started");
        Ok(())
    }

    /// Signal the interval task and wait for it. A cycle in progress completes first.
    pub async fn stop(&self) -> Result<()> {
        let runner = self
            .runner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(SchedulerError::NotRunning)?;

        let _ = runner.shutdown_tx.send(true);
        if let Err(e) = runner.handle.await {
            error!("scheduler task ended abnormally: {e}");
        }
        info!("reminder scheduler stopped");
        Ok(())
    }

    /// Run one cycle now, in either state.
    pub async fn trigger_now(&self) -> Result<RunSummary> {
        self.run_cycle(Trigger::Manual).await
    }

    pub fn state(&self) -> SchedulerState {
        if self.runner.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// `Stopped` whenever the interval task is not running, even if manual
    /// cycles have completed; those remain visible through [`Self::snapshot`].
    pub fn last_status(&self) -> LastStatus {
        if self.state() == SchedulerState::Stopped {
            return LastStatus::Stopped;
        }
        match self.history.last() {
            Some(summary) => LastStatus::Completed(summary),
            None => LastStatus::Idle,
        }
    }

    /// Never waits on an in-flight cycle.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let interval = self
            .runner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|r| r.interval);
        SchedulerSnapshot {
            state: if interval.is_some() {
                SchedulerState::Running
            } else {
                SchedulerState::Stopped
            },
            interval_secs: interval.map(|i| i.as_secs()),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            dedup_entries: self.dedup.len(),
            recent_runs: self.history.recent(),
        }
    }

    /// Publish a synthetic notification; dedup state is untouched.
    pub async fn test_notify(&self) -> duebell_notify::Result<MessageId> {
        self.dispatcher.publish_test().await
    }

    /// Board service reachability; needs no credentials.
    pub async fn check_board(&self) -> duebell_board::Result<()> {
        self.board.check_connection().await
    }

    /// Fresh login against the board service; returns the accessible board count.
    pub async fn check_board_access(&self) -> duebell_board::Result<usize> {
        self.board.check_access().await
    }

    /// Topic reachability; publishes nothing.
    pub async fn check_notify(&self) -> duebell_notify::Result<()> {
        self.dispatcher.check_topic().await
    }

    /// Interval loop. Exits when `shutdown` broadcasts `true` or its sender is gone.
    async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle(Trigger::Scheduled).await {
                        Ok(_) => {}
                        Err(SchedulerError::Busy) => {
                            debug!("cycle already in flight, skipping scheduled tick");
                        }
                        Err(e) => error!("scheduled cycle error: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("scheduler loop exiting");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self, trigger: Trigger) -> Result<RunSummary> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| SchedulerError::Busy)?;
        self.in_flight.store(true, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let summary = self.execute_cycle(trigger).await;
        self.history.push(summary.clone());
        Ok(summary)
    }

    /// fetch → evaluate → dedup filter → publish → record. Never fails;
    /// problems end up in the summary.
    async fn execute_cycle(&self, trigger: Trigger) -> RunSummary {
        let now = (self.clock)();
        let mut summary = RunSummary::begin(trigger, now);
        info!(run_id = %summary.id, %trigger, "reminder cycle started");

        self.dedup.evict_expired(now);

        let fetched = match self.board.fetch_due_candidate_cards().await {
            Ok(f) => f,
            Err(e) => {
                summary.errors.push(format!("board fetch failed: {e}"));
                return self.finish(summary, RunOutcome::Failed);
            }
        };
        summary.cards_scanned = fetched.cards.len();
        summary.malformed_skipped = fetched.malformed;
        if fetched.unreachable > 0 {
            summary.errors.push(format!(
                "{} board(s) or list(s) could not be read",
                fetched.unreachable
            ));
        }

        let events = evaluate(&fetched.cards, now, &self.window);
        summary.due_soon = events
            .iter()
            .filter(|e| e.category == DueCategory::DueSoon)
            .count();
        summary.overdue = events.len() - summary.due_soon;

        let found = events.len();
        let pending = self.dedup.filter_unnotified(events.clone());
        summary.suppressed = found - pending.len();

        let outcome = self.dispatcher.publish(&pending, now).await;
        summary.notifications_sent = outcome.sent;
        summary.notifications_failed = outcome.failed;

        let pending_keys: HashSet<_> = pending.iter().map(|e| e.key()).collect();
        let delivered = if outcome.is_success() {
            DeliveryStatus::Notified
        } else {
            DeliveryStatus::Failed
        };
        summary.due_cards = events
            .iter()
            .map(|e| {
                let delivery = if pending_keys.contains(&e.key()) {
                    delivered
                } else {
                    DeliveryStatus::AlreadyNotified
                };
                DueCardReport::new(e, now, delivery)
            })
            .collect();

        if !outcome.is_success() {
            if let Some(err) = outcome.error {
                summary.errors.push(format!("publish failed: {err}"));
            }
            return self.finish(summary, RunOutcome::Failed);
        }

        if outcome.sent > 0 {
            self.dedup.record_notified(&pending, (self.clock)());
        }

        let result = if summary.errors.is_empty() && summary.malformed_skipped == 0 {
            RunOutcome::Success
        } else {
            RunOutcome::Partial
        };
        self.finish(summary, result)
    }

    fn finish(&self, mut summary: RunSummary, outcome: RunOutcome) -> RunSummary {
        summary.finished_at = (self.clock)();
        summary.outcome = outcome;

        match outcome {
            RunOutcome::Failed => error!(
                run_id = %summary.id,
                errors = ?summary.errors,
                "reminder cycle failed"
            ),
            RunOutcome::Partial => warn!(
                run_id = %summary.id,
                sent = summary.notifications_sent,
                malformed = summary.malformed_skipped,
                errors = ?summary.errors,
                "reminder cycle completed with skipped records"
            ),
            RunOutcome::Success => info!(
                run_id = %summary.id,
                scanned = summary.cards_scanned,
                due = summary.due_found(),
                suppressed = summary.suppressed,
                sent = summary.notifications_sent,
                "reminder cycle completed"
            ),
        }
        summary
    }
}
