//! Periodic dataset refresh.
//!
//! One cycle runs `fetch -> replace_all`. A failed cycle leaves the store as
//! it was, so lookups keep serving the last good dataset until the next
//! trigger retries. Cycles never overlap: a trigger that arrives while a
//! cycle is active is dropped.

use crate::error::RefreshError;
use crate::fetcher::DatasetFetcher;
use crate::store::RangeStore;
use crossbeam_channel::{bounded, select, tick, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Where the refresher is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Replacing,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Fetching,
            2 => RefreshState::Replacing,
            _ => RefreshState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RefreshState::Idle => 0,
            RefreshState::Fetching => 1,
            RefreshState::Replacing => 2,
        }
    }
}

/// Result of one trigger.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The store now holds the fetched dataset.
    Replaced { version: u64, records: usize },

    /// Another cycle was active; nothing was done.
    Skipped,

    /// The cycle failed and the previous dataset was kept.
    Failed(RefreshError),
}

impl RefreshOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, RefreshOutcome::Replaced { .. })
    }
}

/// Point-in-time view of the refresher's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    pub last_error: Option<String>,
}

/// Drives `fetch -> replace_all` against a shared [`RangeStore`].
pub struct DatasetRefresher<F> {
    fetcher: F,
    store: Arc<RangeStore>,
    state: AtomicU8,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl<F: DatasetFetcher> DatasetRefresher<F> {
    pub fn new(fetcher: F, store: Arc<RangeStore>) -> Self {
        Self {
            fetcher,
            store,
            state: AtomicU8::new(RefreshState::Idle.as_u8()),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<RangeStore> {
        &self.store
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn status(&self) -> RefreshStatus {
        RefreshStatus {
            state: self.state(),
            cycles_completed: self.completed.load(Ordering::Relaxed),
            cycles_failed: self.failed.load(Ordering::Relaxed),
            cycles_skipped: self.skipped.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }

    /// Runs one refresh cycle unless another is already in progress.
    pub fn refresh_once(&self) -> RefreshOutcome {
        if self
            .state
            .compare_exchange(
                RefreshState::Idle.as_u8(),
                RefreshState::Fetching.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            warn!("Refresh already in progress ({:?}), trigger dropped", self.state());
            return RefreshOutcome::Skipped;
        }

        info!("Dataset refresh started");
        let result = {
            let _idle = IdleOnDrop(&self.state);
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(result) => result,
                Err(payload) => Err(RefreshError::Panicked {
                    message: panic_message(&*payload),
                }),
            }
        };

        match result {
            Ok((version, records)) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = None;
                info!(
                    "Dataset refresh finished: {} records, version {}",
                    records, version
                );
                RefreshOutcome::Replaced { version, records }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(e.to_string());
                error!(
                    "Dataset refresh failed, keeping version {}: {}",
                    self.store.version(),
                    e
                );
                RefreshOutcome::Failed(e)
            }
        }
    }

    fn run_cycle(&self) -> Result<(u64, usize), RefreshError> {
        let records = self.fetcher.fetch()?;
        let count = records.len();

        self.set_state(RefreshState::Replacing);
        let version = self.store.replace_all(records)?;
        Ok((version, count))
    }

    fn set_state(&self, state: RefreshState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// Returns the state to `Idle` when a cycle ends, including by unwinding.
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(RefreshState::Idle.as_u8(), Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<F: DatasetFetcher + 'static> DatasetRefresher<F> {
    /// Starts a background thread that refreshes every `interval`.
    ///
    /// With `run_immediately` the first cycle starts right away instead of
    /// after one interval. Ticks that elapse during a long cycle are
    /// coalesced rather than queued.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        run_immediately: bool,
    ) -> io::Result<RefreshHandle> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let refresher = self;

        let thread = thread::Builder::new()
            .name("bin-refresh".to_string())
            .spawn(move || {
                info!("Refresh scheduler started, interval {:?}", interval);
                if run_immediately {
                    refresher.refresh_once();
                }

                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            debug!("Refresh trigger fired");
                            refresher.refresh_once();
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                info!("Refresh scheduler stopped");
            })?;

        Ok(RefreshHandle {
            shutdown: shutdown_tx,
            thread: Some(thread),
        })
    }
}

/// Owns the background refresh thread.
///
/// Dropping the handle stops the scheduler; a cycle already running is
/// allowed to finish first.
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stops the scheduler and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Refresh scheduler thread panicked");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
