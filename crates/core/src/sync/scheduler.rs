//! Timer tasks that fire sync runs at each account's UTC times.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::schedule::{next_fire_after, TimeOfDay};
use super::sync_traits::SyncRunner;
use crate::utils::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// When false, `start` is a no-op and only manual syncs run.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

struct Timer {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// One timer task per Active account.
///
/// Stopping a timer (disarm or shutdown) only interrupts its wait; a sync
/// that is already running finishes its mutation first.
pub struct SyncScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    runner: OnceLock<Weak<dyn SyncRunner>>,
    timers: Mutex<HashMap<String, Timer>>,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
}

impl SyncScheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            clock,
            runner: OnceLock::new(),
            timers: Mutex::new(HashMap::new()),
            shutdown,
            started: AtomicBool::new(false),
        }
    }

    /// Sets the runner timers call into. Later calls are ignored.
    pub fn bind(&self, runner: Weak<dyn SyncRunner>) {
        if self.runner.set(runner).is_err() {
            warn!("Sync scheduler runner already bound");
        }
    }

    pub fn start(&self) {
        if !self.config.enabled {
            info!("Sync scheduler disabled; only manual syncs will run");
            return;
        }
        self.shutdown.send_replace(false);
        self.started.store(true, Ordering::SeqCst);
        info!("Sync scheduler started");
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// (Re)starts the timer for an account. No-op before `start` or when
    /// there are no times.
    pub fn arm(&self, sync_account_id: &str, times: Vec<TimeOfDay>) {
        self.disarm(sync_account_id);
        if !self.is_running() || times.is_empty() {
            return;
        }
        let Some(runner) = self.runner.get().cloned() else {
            warn!("Sync scheduler has no runner; not arming {}", sync_account_id);
            return;
        };

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(
            sync_account_id.to_string(),
            times,
            Arc::clone(&self.clock),
            runner,
            stop_rx,
            self.shutdown.subscribe(),
        ));
        if let Ok(mut timers) = self.timers.lock() {
            timers.insert(sync_account_id.to_string(), Timer { stop, handle });
        }
        debug!("Armed sync timer for {}", sync_account_id);
    }

    pub fn disarm(&self, sync_account_id: &str) {
        let removed = self.timers.lock().ok().and_then(|mut t| t.remove(sync_account_id));
        if let Some(timer) = removed {
            timer.stop.send_replace(true);
            debug!("Disarmed sync timer for {}", sync_account_id);
        }
    }

    pub fn armed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .timers
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Stops every timer and waits for in-progress runs to finish.
    pub async fn shutdown(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
        let timers: Vec<(String, Timer)> = self
            .timers
            .lock()
            .map(|mut t| t.drain().collect())
            .unwrap_or_default();
        for (id, timer) in timers {
            timer.stop.send_replace(true);
            if let Err(e) = timer.handle.await {
                warn!("Sync timer for {} ended abnormally: {}", id, e);
            }
        }
        info!("Sync scheduler stopped");
    }
}

async fn run_timer(
    sync_account_id: String,
    times: Vec<TimeOfDay>,
    clock: Arc<dyn Clock>,
    runner: Weak<dyn SyncRunner>,
    mut stop: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_fired = None;
    loop {
        let now = clock.now();
        // Never fire the same slot twice even if the clock has not moved.
        let after = match last_fired {
            Some(fired) if fired > now => fired,
            _ => now,
        };
        let Some(next) = next_fire_after(&times, after) else {
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!("Next sync for {} at {} (in {:?})", sync_account_id, next, wait);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop.changed() => break,
            _ = shutdown.changed() => break,
        }
        if *stop.borrow() || *shutdown.borrow() {
            break;
        }
        last_fired = Some(next);

        let Some(runner) = runner.upgrade() else {
            break;
        };
        match runner.run_scheduled(&sync_account_id).await {
            Ok(outcome) => info!(
                "Scheduled sync for {} done: balance {}, delta {}",
                sync_account_id, outcome.remote_balance, outcome.pocket_delta
            ),
            Err(e) => warn!("Scheduled sync for {} failed: {}", sync_account_id, e),
        }
    }
    debug!("Sync timer for {} exited", sync_account_id);
}
