//! Scroll position persistence.
//!
//! The offset is written with a trailing-edge debounce and only when it moved
//! far enough from the last written value. The saved state is read once at
//! mount; the offset is applied later, once the row it points at is loaded.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::config::VirtualListConfig;
use super::geometry::WindowMode;
use super::scheduler::{TaskHandle, TaskKind, TaskScheduler};
use super::store::RecordStore;

const STORAGE_KEY_PREFIX: &str = "ledgerscroll:scroll";

/// Key/value storage for persisted list state
pub trait ScrollStateStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<(), String>;
}

/// In-memory store for native runs and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RefCell<HashMap<String, Value>>,
    writes: Cell<usize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl ScrollStateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), String> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedScrollState {
    pub scroll_offset: f64,
    #[serde(default)]
    pub window_mode: WindowMode,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub last_updated: i64,
}

/// Storage key for one list context
pub fn storage_key(context: &str) -> String {
    format!("{}:{}", STORAGE_KEY_PREFIX, context)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Restoration {
    NotRead,
    Pending(f64),
    Done,
}

pub struct ScrollPersistence {
    store: Rc<dyn ScrollStateStore>,
    key: String,
    debounce_ms: u64,
    min_delta_px: f64,
    indicator_ms: u64,
    window_mode: WindowMode,
    last_persisted: f64,
    pending_offset: Option<f64>,
    debounce_task: Option<TaskHandle>,
    restoration: Restoration,
    indicator_task: Option<TaskHandle>,
    indicator_visible: bool,
}

impl ScrollPersistence {
    pub fn new(store: Rc<dyn ScrollStateStore>, context: &str, config: &VirtualListConfig) -> Self {
        Self {
            store,
            key: storage_key(context),
            debounce_ms: config.persist_debounce_ms,
            min_delta_px: config.persist_min_delta_px,
            indicator_ms: config.restored_indicator_ms,
            window_mode: WindowMode::default(),
            last_persisted: 0.0,
            pending_offset: None,
            debounce_task: None,
            restoration: Restoration::NotRead,
            indicator_task: None,
            indicator_visible: false,
        }
    }

    pub fn window_mode(&self) -> WindowMode {
        self.window_mode
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator_visible
    }

    /// Offset waiting for its row to load
    pub fn pending_restore(&self) -> Option<f64> {
        match self.restoration {
            Restoration::Pending(offset) => Some(offset),
            _ => None,
        }
    }

    fn read(&self) -> Option<PersistedScrollState> {
        let value = self.store.get(&self.key)?;
        match serde_json::from_value::<PersistedScrollState>(value) {
            Ok(state) if state.scroll_offset.is_finite() && state.scroll_offset >= 0.0 => Some(state),
            Ok(state) => {
                log::warn!("Ignoring persisted scroll offset {}", state.scroll_offset);
                None
            }
            Err(e) => {
                log::warn!("Failed to parse persisted scroll state for {}: {}", self.key, e);
                None
            }
        }
    }

    /// Reads the saved state. Only the first call reads; later calls return `None`.
    pub fn restore(&mut self) -> Option<PersistedScrollState> {
        if self.restoration != Restoration::NotRead {
            return None;
        }

        let state = self.read();
        match state {
            Some(state) => {
                log::info!(
                    "Restoring scroll state for {}: {}px ({})",
                    self.key,
                    state.scroll_offset,
                    state.window_mode.as_str()
                );
                self.window_mode = state.window_mode;
                self.last_persisted = state.scroll_offset;
                self.restoration = if state.scroll_offset > 0.0 {
                    Restoration::Pending(state.scroll_offset)
                } else {
                    Restoration::Done
                };
            }
            None => self.restoration = Restoration::Done,
        }
        state
    }

    /// Applies a pending restoration once the target row is loaded.
    ///
    /// Returns the offset to scroll to, snapped to the top of the target row.
    /// When the list is complete and shorter than the saved position, the last
    /// row is used instead.
    pub fn try_apply_restore(
        &mut self,
        item_height_px: f64,
        store: &RecordStore,
        list_complete: bool,
        scheduler: &mut TaskScheduler,
        now_ms: u64,
    ) -> Option<f64> {
        let target = self.pending_restore()?;
        let mut index = (target / item_height_px).floor() as usize;

        if !store.is_loaded(index) {
            if !list_complete {
                return None;
            }
            if store.loaded_count() == 0 {
                log::info!("List is empty; dropping saved position for {}", self.key);
                self.restoration = Restoration::Done;
                return None;
            }
            index = store.loaded_count() - 1;
        }

        let offset = index as f64 * item_height_px;
        self.restoration = Restoration::Done;
        self.last_persisted = offset;

        if let Some(handle) = self.indicator_task.take() {
            scheduler.cancel(handle);
        }
        self.indicator_visible = true;
        self.indicator_task = Some(scheduler.schedule(TaskKind::DismissRestoredIndicator, now_ms + self.indicator_ms));

        log::info!("Restored scroll position to row {} ({}px)", index, offset);
        Some(offset)
    }

    /// Records a new offset; the write happens when the debounce elapses.
    ///
    /// Ignored while a restoration is pending so the saved position survives
    /// the initial scroll events at the top of the list.
    pub fn persist(&mut self, offset: f64, scheduler: &mut TaskScheduler, now_ms: u64) {
        if self.pending_restore().is_some() {
            return;
        }

        self.pending_offset = Some(offset);
        if let Some(handle) = self.debounce_task.take() {
            scheduler.cancel(handle);
        }
        self.debounce_task = Some(scheduler.schedule(TaskKind::PersistScroll, now_ms + self.debounce_ms));
    }

    /// Debounce deadline reached
    pub fn on_debounce_elapsed(&mut self, handle: TaskHandle) -> bool {
        if self.debounce_task != Some(handle) {
            return false;
        }
        self.debounce_task = None;
        self.write_pending()
    }

    fn write_pending(&mut self) -> bool {
        let Some(offset) = self.pending_offset.take() else {
            return false;
        };
        if (offset - self.last_persisted).abs() <= self.min_delta_px {
            return false;
        }
        self.write(offset)
    }

    fn write(&mut self, offset: f64) -> bool {
        let state = PersistedScrollState {
            scroll_offset: offset,
            window_mode: self.window_mode,
            last_updated: chrono::Utc::now().timestamp_millis(),
        };

        let value = match serde_json::to_value(state) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to serialize scroll state: {}", e);
                return false;
            }
        };

        match self.store.set(&self.key, value) {
            Ok(()) => {
                log::debug!("Persisted scroll offset {}px for {}", offset, self.key);
                self.last_persisted = offset;
                true
            }
            Err(e) => {
                log::warn!("Failed to persist scroll state: {}", e);
                false
            }
        }
    }

    /// Records a mode change and writes it right away along with `offset`.
    pub fn set_window_mode(&mut self, mode: WindowMode, offset: f64, scheduler: &mut TaskScheduler) {
        self.window_mode = mode;
        if let Some(handle) = self.debounce_task.take() {
            scheduler.cancel(handle);
        }
        self.pending_offset = None;
        if self.pending_restore().is_some() {
            // Pixel offsets from the old mode no longer line up
            self.restoration = Restoration::Done;
        }
        self.write(offset);
    }

    pub fn on_indicator_elapsed(&mut self, handle: TaskHandle) {
        if self.indicator_task == Some(handle) {
            self.indicator_task = None;
            self.indicator_visible = false;
        }
    }

    /// Writes a pending debounced offset immediately. Used at teardown.
    pub fn flush(&mut self, scheduler: &mut TaskScheduler) -> bool {
        if let Some(handle) = self.debounce_task.take() {
            scheduler.cancel(handle);
        }
        self.write_pending()
    }
}
