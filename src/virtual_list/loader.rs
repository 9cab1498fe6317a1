//! Incremental data loading with cursor pagination.
//!
//! The loader owns the load cursor and writes pages into the shared record
//! store. Failures never escape as errors: they end up in `LoaderStatus` so
//! the render path keeps working while loading is broken.
//!
//! # Triggers
//! `load_more` is called from two places (the proximity sentinel and the
//! scroll threshold check). Both go through the same guard:
//! - one request in flight at a time, extra calls are no-ops
//! - no new load within `min_load_delay_ms` of the previous load start
//! - nothing once the cursor reports no more pages
//! - nothing after a terminal failure until a manual retry
//!
//! # Stale results
//! `load_initial` discards the store and starts a new generation. A fetch that
//! was started under an older generation (or before teardown) is dropped when
//! it resolves.
//!
//! # Backoff
//! A retry sleep races a cancel signal. `cancel_backoff` (teardown, new
//! generation) ends the sleep at once and the load returns `Stale`.

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{self, Either};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::clock::Clock;
use super::config::VirtualListConfig;
use super::error::LoadError;
use super::store::{RecordStore, TransactionRecord};

/// Filter values sent with every page request
pub type Filters = BTreeMap<String, String>;

/// Page request sent to the fetch endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub page_size: usize,
    pub filters: Filters,
}

/// One page of records as returned by the fetch endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<TransactionRecord>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// The record fetch endpoint
#[async_trait(?Send)]
pub trait RecordSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<RecordPage, LoadError>;
}

/// Opaque continuation token plus the "has more" flag
#[derive(Clone, Debug, PartialEq)]
pub struct LoadCursor {
    pub token: Option<String>,
    pub has_more: bool,
}

impl Default for LoadCursor {
    fn default() -> Self {
        Self {
            token: None,
            has_more: true,
        }
    }
}

impl LoadCursor {
    fn advance(&mut self, next: Option<String>, has_more: bool) {
        if next.is_some() {
            self.token = next;
        }
        self.has_more = has_more;
    }
}

/// What asked for the load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadTrigger {
    /// Proximity sentinel became visible
    Sentinel,
    /// Scroll position crossed the load threshold
    ScrollThreshold,
    /// User pressed retry; clears a terminal failure
    Manual,
}

/// Why a load request did nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Exhausted,
    RateLimited,
    Terminal,
    TornDown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Loaded { appended: usize, total_count: usize },
    Skipped(SkipReason),
    /// Result arrived for a discarded store or after teardown
    Stale,
    Failed(LoadError),
}

/// Loader state exposed to the coordinator and the UI
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoaderStatus {
    pub loading: bool,
    pub has_more: bool,
    pub attempts: u32,
    pub last_error: Option<LoadError>,
    pub terminal: bool,
}

#[derive(Default)]
struct LoaderState {
    cursor: LoadCursor,
    filters: Filters,
    loading: bool,
    last_started_ms: Option<u64>,
    attempts: u32,
    last_error: Option<LoadError>,
    terminal: bool,
}

struct LoaderInner {
    source: Rc<dyn RecordSource>,
    clock: Rc<dyn Clock>,
    store: Rc<RefCell<RecordStore>>,
    config: VirtualListConfig,
    alive: Rc<Cell<bool>>,
    state: RefCell<LoaderState>,
    /// Dropping or firing the sender ends the running backoff sleep
    backoff: RefCell<Option<oneshot::Sender<()>>>,
    on_retry: RefCell<Option<Box<dyn Fn()>>>,
}

/// Cheap to clone; clones share the same state
#[derive(Clone)]
pub struct DataLoader {
    inner: Rc<LoaderInner>,
}

/// Backoff delay before retry number `attempt` (1-based).
///
/// `base_ms * 2^(attempt - 1)` plus a uniform jitter in `[-jitter_ms, jitter_ms]`.
pub fn retry_delay_ms(attempt: u32, base_ms: u64, jitter_ms: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    if jitter_ms == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..=jitter_ms * 2) as i64 - jitter_ms as i64;
    (delay as i64 + jitter).max(0) as u64
}

impl DataLoader {
    pub fn new(
        source: Rc<dyn RecordSource>,
        clock: Rc<dyn Clock>,
        store: Rc<RefCell<RecordStore>>,
        config: VirtualListConfig,
        alive: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            inner: Rc::new(LoaderInner {
                source,
                clock,
                store,
                config,
                alive,
                state: RefCell::new(LoaderState::default()),
                backoff: RefCell::new(None),
                on_retry: RefCell::new(None),
            }),
        }
    }

    /// Called after a failed attempt, before the backoff sleep starts
    pub fn set_on_retry(&self, callback: impl Fn() + 'static) {
        *self.inner.on_retry.borrow_mut() = Some(Box::new(callback));
    }

    /// Ends a pending retry sleep; its load resolves as `Stale`.
    pub fn cancel_backoff(&self) {
        if let Some(cancel) = self.inner.backoff.borrow_mut().take() {
            log::debug!("Cancelling retry backoff");
            cancel.send(()).ok();
        }
    }

    pub fn status(&self) -> LoaderStatus {
        let state = self.inner.state.borrow();
        LoaderStatus {
            loading: state.loading,
            has_more: state.cursor.has_more,
            attempts: state.attempts,
            last_error: state.last_error.clone(),
            terminal: state.terminal,
        }
    }

    pub fn cursor(&self) -> LoadCursor {
        self.inner.state.borrow().cursor.clone()
    }

    /// Earliest time a new load may start under the rate limit
    pub fn next_load_allowed_ms(&self) -> u64 {
        let state = self.inner.state.borrow();
        state
            .last_started_ms
            .map(|last| last + self.inner.config.min_load_delay_ms)
            .unwrap_or(0)
    }

    pub fn filters(&self) -> Filters {
        self.inner.state.borrow().filters.clone()
    }

    /// Discards the store and cursor, then fetches the first page for `filters`.
    pub async fn load_initial(&self, filters: Filters) -> LoadOutcome {
        let inner = &self.inner;
        if !inner.alive.get() {
            return LoadOutcome::Skipped(SkipReason::TornDown);
        }

        self.cancel_backoff();
        let generation = inner.store.borrow_mut().reset();
        let now = inner.clock.now_ms();
        log::info!("Loading first page (generation {}, filters {:?})", generation, filters);
        {
            let mut state = inner.state.borrow_mut();
            *state = LoaderState {
                filters,
                loading: true,
                last_started_ms: Some(now),
                ..LoaderState::default()
            };
        }

        self.fetch_with_retry(generation).await
    }

    /// Fetches the next page if the guard allows it.
    pub async fn load_more(&self, trigger: LoadTrigger) -> LoadOutcome {
        let generation = match self.begin_load(trigger) {
            Ok(generation) => generation,
            Err(reason) => {
                log::trace!("load_more({:?}) skipped: {:?}", trigger, reason);
                return LoadOutcome::Skipped(reason);
            }
        };

        log::debug!("Loading next page ({:?})", trigger);
        self.fetch_with_retry(generation).await
    }

    fn begin_load(&self, trigger: LoadTrigger) -> Result<u64, SkipReason> {
        let inner = &self.inner;
        if !inner.alive.get() {
            return Err(SkipReason::TornDown);
        }

        let now = inner.clock.now_ms();
        let mut state = inner.state.borrow_mut();

        if state.loading {
            return Err(SkipReason::InFlight);
        }

        if trigger == LoadTrigger::Manual {
            state.terminal = false;
            state.attempts = 0;
            state.last_error = None;
        } else if state.terminal {
            return Err(SkipReason::Terminal);
        }

        if !state.cursor.has_more {
            return Err(SkipReason::Exhausted);
        }

        if let Some(last) = state.last_started_ms {
            if now.saturating_sub(last) < inner.config.min_load_delay_ms {
                return Err(SkipReason::RateLimited);
            }
        }

        state.loading = true;
        state.last_started_ms = Some(now);
        Ok(inner.store.borrow().generation())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.alive.get() && self.inner.store.borrow().generation() == generation
    }

    async fn fetch_with_retry(&self, generation: u64) -> LoadOutcome {
        let inner = &self.inner;

        loop {
            let request = {
                let state = inner.state.borrow();
                PageRequest {
                    cursor: state.cursor.token.clone(),
                    page_size: inner.config.page_size,
                    filters: state.filters.clone(),
                }
            };

            let result = inner.source.fetch_page(request).await;

            if !self.is_current(generation) {
                log::debug!("Dropping page for stale generation {}", generation);
                return LoadOutcome::Stale;
            }

            let err = match result {
                Ok(page) => return self.apply_page(page),
                Err(err) => err,
            };

            let attempts = {
                let mut state = inner.state.borrow_mut();
                state.attempts += 1;
                state.attempts
            };

            if err.is_recoverable() && attempts < inner.config.max_attempts() {
                let delay = retry_delay_ms(attempts, inner.config.retry_base_ms, inner.config.retry_jitter_ms);
                log::warn!(
                    "Page load failed (attempt {}/{}): {}. Retrying in {}ms",
                    attempts,
                    inner.config.max_attempts(),
                    err,
                    delay
                );
                inner.state.borrow_mut().last_error = Some(err);
                if let Some(on_retry) = inner.on_retry.borrow().as_ref() {
                    on_retry();
                }

                if !self.backoff(delay).await || !self.is_current(generation) {
                    log::debug!("Abandoning retry for stale generation {}", generation);
                    return LoadOutcome::Stale;
                }
                continue;
            }

            log::error!("Page load failed after {} attempt(s): {}", attempts, err);
            let terminal = LoadError::Terminal {
                attempts,
                last: Box::new(err),
            };
            let mut state = inner.state.borrow_mut();
            state.loading = false;
            state.terminal = true;
            state.last_error = Some(terminal.clone());
            return LoadOutcome::Failed(terminal);
        }
    }

    /// Sleeps `delay_ms`; false if cancelled first
    async fn backoff(&self, delay_ms: u64) -> bool {
        let (cancel, cancelled) = oneshot::channel::<()>();
        // Replacing an older sender cancels that sleep too
        *self.inner.backoff.borrow_mut() = Some(cancel);

        let sleep = self.inner.clock.sleep(delay_ms);
        match future::select(sleep, cancelled).await {
            Either::Left(((), mut cancelled)) => match cancelled.try_recv() {
                // Sender still ours and unused
                Ok(None) => {
                    self.inner.backoff.borrow_mut().take();
                    true
                }
                _ => false,
            },
            Either::Right(_) => false,
        }
    }

    fn apply_page(&self, page: RecordPage) -> LoadOutcome {
        let inner = &self.inner;

        // Without a cursor the next request would refetch this page
        let has_more = page.has_more && page.next_cursor.is_some();
        if page.has_more && page.next_cursor.is_none() {
            log::warn!("Page reported more records but no cursor; treating list as complete");
        }

        let (appended, total_count) = {
            let mut store = inner.store.borrow_mut();
            let range = store.append(page.records, page.total_count);
            if !has_more {
                store.seal();
            }
            (range.len(), store.total_count())
        };

        let mut state = inner.state.borrow_mut();
        state.cursor.advance(page.next_cursor, has_more);
        state.loading = false;
        state.attempts = 0;
        state.last_error = None;
        state.terminal = false;

        log::debug!("Appended {} record(s), {} total, has_more={}", appended, total_count, has_more);
        LoadOutcome::Loaded {
            appended,
            total_count,
        }
    }
}
