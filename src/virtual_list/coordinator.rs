//! Viewport event coordination.
//!
//! `VirtualListEngine` is the synchronous half: it takes scroll, resize,
//! animation-frame and timer events, throttles them, and drives geometry,
//! the render window and persistence in that order. `ListController` wraps
//! it together with the async `DataLoader`, spawning loads when the engine
//! asks for them and feeding results back as forced render passes.
//!
//! Platform specifics stay behind `ViewportHost`: the engine never touches
//! the DOM, it only asks the host to size the spacer, move the sentinel,
//! scroll, request a frame, or arm a timer for the next scheduled task.

use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::task::Poll;

use super::clock::Clock;
use super::config::VirtualListConfig;
use super::error::LoadError;
use super::geometry::{compute_dimensions, WindowMode};
use super::loader::{DataLoader, Filters, LoadOutcome, LoadTrigger, RecordSource, SkipReason};
use super::persistence::{ScrollPersistence, ScrollStateStore};
use super::pool::{NodePool, PoolStats, RowNode};
use super::scheduler::{TaskHandle, TaskKind, TaskScheduler};
use super::store::RecordStore;
use super::window::{RenderOutcome, RenderWindow, RenderWindowManager, RowRenderer};

/// Runs a future on the UI event loop
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// The scroll container the list lives in
pub trait ViewportHost {
    /// Sizes the spacer so the scrollbar spans the whole list
    fn set_content_height(&mut self, height_px: f64);

    /// Moves the proximity sentinel to the end of the loaded rows
    fn place_sentinel(&mut self, top_px: f64);

    fn scroll_to(&mut self, offset_px: f64);

    /// Asks for one `on_animation_frame` call on the next frame
    fn request_animation_frame(&mut self);

    /// Arms the single timer that calls `tick`, or clears it with `None`
    fn schedule_wakeup(&mut self, due_ms: Option<u64>);
}

/// Removes one registered listener when dropped
pub struct ListenerGuard {
    label: &'static str,
    dispose: Option<Box<dyn FnOnce()>>,
}

impl ListenerGuard {
    pub fn new(label: &'static str, dispose: impl FnOnce() + 'static) -> Self {
        Self {
            label,
            dispose: Some(Box::new(dispose)),
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            log::trace!("Removing {} listener", self.label);
            dispose();
        }
    }
}

/// Disposers for every listener and observer one list instance registered
#[derive(Default)]
pub struct ListenerRegistry {
    guards: Vec<ListenerGuard>,
}

impl ListenerRegistry {
    pub fn register(&mut self, label: &'static str, dispose: impl FnOnce() + 'static) {
        self.guards.push(ListenerGuard::new(label, dispose));
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Runs every disposer, newest first. Returns how many ran.
    pub fn dispose_all(&mut self) -> usize {
        let count = self.guards.len();
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
        count
    }
}

/// Everything the UI needs to draw around the rows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListStatus {
    pub window: RenderWindow,
    pub window_mode: WindowMode,
    pub loaded_count: usize,
    pub total_count: usize,
    pub loading: bool,
    pub has_more: bool,
    /// A transient failure is being retried
    pub retrying: bool,
    /// Terminal load failure, unless dismissed
    pub error: Option<LoadError>,
    pub restored_indicator: bool,
    pub restore_pending: bool,
}

pub struct VirtualListEngine<N: RowNode> {
    config: VirtualListConfig,
    store: Rc<RefCell<RecordStore>>,
    window: RenderWindowManager<N>,
    renderer: Box<dyn RowRenderer<N>>,
    host: Box<dyn ViewportHost>,
    persistence: ScrollPersistence,
    scheduler: TaskScheduler,
    mode: WindowMode,
    viewport_height: f64,
    scroll_offset: f64,
    content_height: Option<f64>,
    sentinel_top: Option<f64>,
    frame_pending: bool,
    force_pending: bool,
    last_viewport_ms: Option<u64>,
    throttle_task: Option<TaskHandle>,
    deferred_load: Option<TaskHandle>,
    armed_wakeup: Option<u64>,
    list_complete: bool,
    torn_down: bool,
}

impl<N: RowNode> VirtualListEngine<N> {
    pub fn new(
        config: VirtualListConfig,
        store: Rc<RefCell<RecordStore>>,
        host: Box<dyn ViewportHost>,
        renderer: Box<dyn RowRenderer<N>>,
        node_factory: Box<dyn FnMut() -> N>,
        persistence: ScrollPersistence,
    ) -> Self {
        let pool = NodePool::new(config.pool_capacity, node_factory);
        Self {
            config,
            store,
            window: RenderWindowManager::new(pool, config.buffer_size, config.hysteresis_rows),
            renderer,
            host,
            persistence,
            scheduler: TaskScheduler::new(),
            mode: WindowMode::default(),
            viewport_height: 0.0,
            scroll_offset: 0.0,
            content_height: None,
            sentinel_top: None,
            frame_pending: false,
            force_pending: false,
            last_viewport_ms: None,
            throttle_task: None,
            deferred_load: None,
            armed_wakeup: None,
            list_complete: false,
            torn_down: false,
        }
    }

    /// Reads persisted state and schedules the first render pass.
    pub fn mount(&mut self, viewport_height: f64) {
        self.viewport_height = viewport_height;
        if let Some(state) = self.persistence.restore() {
            self.mode = state.window_mode;
        }
        self.force_pending = true;
        self.request_frame();
    }

    pub fn window_mode(&self) -> WindowMode {
        self.mode
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn render_window(&self) -> RenderWindow {
        self.window.current()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.window.pool_stats()
    }

    pub fn node_at(&self, index: usize) -> Option<&N> {
        self.window.node_at(index)
    }

    pub fn status(&self) -> ListStatus {
        let store = self.store.borrow();
        ListStatus {
            window: self.window.current(),
            window_mode: self.mode,
            loaded_count: store.loaded_count(),
            total_count: store.total_count(),
            restored_indicator: self.persistence.indicator_visible(),
            restore_pending: self.persistence.pending_restore().is_some(),
            ..ListStatus::default()
        }
    }

    pub fn on_scroll(&mut self, offset_px: f64, now_ms: u64) -> Option<LoadTrigger> {
        if self.torn_down {
            return None;
        }
        self.scroll_offset = offset_px.max(0.0);
        self.viewport_event(now_ms)
    }

    pub fn on_resize(&mut self, viewport_height: f64, now_ms: u64) -> Option<LoadTrigger> {
        if self.torn_down {
            return None;
        }
        if viewport_height != self.viewport_height {
            self.viewport_height = viewport_height;
            self.force_pending = true;
        }
        self.viewport_event(now_ms)
    }

    fn viewport_event(&mut self, now_ms: u64) -> Option<LoadTrigger> {
        if let Some(last) = self.last_viewport_ms {
            let next_allowed = last + self.config.throttle_ms;
            if now_ms < next_allowed {
                // Trailing edge picks up the latest offset
                if self.throttle_task.is_none() {
                    self.throttle_task = Some(self.scheduler.schedule(TaskKind::ThrottledViewport, next_allowed));
                    self.sync_wakeup();
                }
                return None;
            }
        }

        if let Some(handle) = self.throttle_task.take() {
            self.scheduler.cancel(handle);
        }
        self.last_viewport_ms = Some(now_ms);
        let trigger = self.process_viewport(now_ms);
        self.sync_wakeup();
        trigger
    }

    fn process_viewport(&mut self, now_ms: u64) -> Option<LoadTrigger> {
        self.request_frame();
        self.persistence.persist(self.scroll_offset, &mut self.scheduler, now_ms);
        self.load_wanted()
    }

    fn request_frame(&mut self) {
        if !self.frame_pending {
            self.frame_pending = true;
            self.host.request_animation_frame();
        }
    }

    fn sync_wakeup(&mut self) {
        let next = self.scheduler.next_deadline();
        if next != self.armed_wakeup {
            self.armed_wakeup = next;
            self.host.schedule_wakeup(next);
        }
    }

    /// Render pass. At most one runs per requested frame.
    pub fn on_animation_frame(&mut self, now_ms: u64) -> Option<LoadTrigger> {
        if self.torn_down {
            return None;
        }
        self.frame_pending = false;
        let force = std::mem::take(&mut self.force_pending);
        let item_height = self.mode.item_height();

        let (outcome, restored) = {
            let store = self.store.borrow();
            let dims = compute_dimensions(self.viewport_height, self.mode, store.total_count());

            if self.content_height != Some(dims.total_height_px) {
                self.content_height = Some(dims.total_height_px);
                self.host.set_content_height(dims.total_height_px);
            }
            let sentinel_top = store.loaded_count() as f64 * item_height;
            if self.sentinel_top != Some(sentinel_top) {
                self.sentinel_top = Some(sentinel_top);
                self.host.place_sentinel(sentinel_top);
            }

            let outcome = self.window.update_range(
                self.scroll_offset,
                self.viewport_height,
                item_height,
                &store,
                self.renderer.as_mut(),
                force,
            );
            let restored = self.persistence.try_apply_restore(
                item_height,
                &store,
                self.list_complete,
                &mut self.scheduler,
                now_ms,
            );
            (outcome, restored)
        };

        if let RenderOutcome::Updated { missing, .. } = outcome {
            if missing > 0 {
                log::trace!("{} row(s) in window waiting for data", missing);
            }
        }

        if let Some(offset) = restored {
            self.scroll_offset = offset;
            self.host.scroll_to(offset);
            self.request_frame();
        }

        self.sync_wakeup();
        self.load_wanted()
    }

    /// Runs every scheduled task that is due.
    pub fn tick(&mut self, now_ms: u64) -> Option<LoadTrigger> {
        if self.torn_down {
            return None;
        }
        // The timer that got us here is spent
        self.armed_wakeup = None;

        let mut trigger = None;
        for (handle, kind) in self.scheduler.take_due(now_ms) {
            match kind {
                TaskKind::PersistScroll => {
                    self.persistence.on_debounce_elapsed(handle);
                }
                TaskKind::ThrottledViewport => {
                    if self.throttle_task == Some(handle) {
                        self.throttle_task = None;
                    }
                    self.last_viewport_ms = Some(now_ms);
                    trigger = trigger.or(self.process_viewport(now_ms));
                }
                TaskKind::DismissRestoredIndicator => self.persistence.on_indicator_elapsed(handle),
                TaskKind::DeferredLoad => {
                    if self.deferred_load == Some(handle) {
                        self.deferred_load = None;
                    }
                    trigger = trigger.or(self.load_wanted());
                }
            }
        }

        self.sync_wakeup();
        trigger
    }

    /// Whether the viewport is close enough to the loaded end to need a page
    fn load_wanted(&self) -> Option<LoadTrigger> {
        if self.list_complete || self.torn_down {
            return None;
        }

        let store = self.store.borrow();
        let total_count = store.total_count();
        if total_count == 0 {
            return None;
        }

        // Rows inside the window are still waiting for their page
        if self.window.current().end > store.loaded_count() {
            return Some(LoadTrigger::ScrollThreshold);
        }

        // A saved position past the loaded rows keeps pulling pages
        if let Some(target) = self.persistence.pending_restore() {
            let target_index = (target / self.mode.item_height()).floor() as usize;
            if target_index >= store.loaded_count() {
                return Some(LoadTrigger::ScrollThreshold);
            }
        }

        let dims = compute_dimensions(self.viewport_height, self.mode, total_count);
        let max_offset = dims.max_scroll_offset(self.viewport_height);
        if self.scroll_offset >= max_offset * self.config.load_threshold_ratio {
            Some(LoadTrigger::ScrollThreshold)
        } else {
            None
        }
    }

    /// Re-checks the load triggers at `due_ms`, after the rate limit lifts.
    pub fn defer_load(&mut self, due_ms: u64) {
        if self.torn_down {
            return;
        }
        if let Some(handle) = self.deferred_load.take() {
            self.scheduler.cancel(handle);
        }
        self.deferred_load = Some(self.scheduler.schedule(TaskKind::DeferredLoad, due_ms));
        self.sync_wakeup();
    }

    /// New records arrived (or the list turned out complete).
    pub fn on_data_changed(&mut self, has_more: bool) {
        if self.torn_down {
            return;
        }
        self.list_complete = !has_more;
        self.force_pending = true;
        self.request_frame();
    }

    /// Drops every live row and returns to the top for a new filter set.
    pub fn reset_for_filters(&mut self, now_ms: u64) {
        if self.torn_down {
            return;
        }
        self.window.reset();
        self.list_complete = false;
        if let Some(handle) = self.deferred_load.take() {
            self.scheduler.cancel(handle);
        }
        if self.scroll_offset != 0.0 {
            self.scroll_offset = 0.0;
            self.host.scroll_to(0.0);
            self.persistence.persist(0.0, &mut self.scheduler, now_ms);
        }
        self.force_pending = true;
        self.request_frame();
        self.sync_wakeup();
    }

    /// Switches row density, keeping the top row in place.
    pub fn set_window_mode(&mut self, mode: WindowMode) {
        if self.torn_down || mode == self.mode {
            return;
        }

        let top_index = (self.scroll_offset / self.mode.item_height()).floor();
        let offset = top_index * mode.item_height();
        log::info!("Window mode {} -> {} at row {}", self.mode.as_str(), mode.as_str(), top_index);

        self.mode = mode;
        self.scroll_offset = offset;
        self.persistence.set_window_mode(mode, offset, &mut self.scheduler);
        self.host.scroll_to(offset);
        self.force_pending = true;
        self.request_frame();
        self.sync_wakeup();
    }

    /// Flushes a pending write, cancels all tasks and detaches every node.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.persistence.flush(&mut self.scheduler);
        self.scheduler.cancel_all();
        self.window.teardown();
        self.frame_pending = false;
        if self.armed_wakeup.take().is_some() {
            self.host.schedule_wakeup(None);
        }
    }
}

/// Collaborators for one list instance
pub struct ListDeps<N> {
    pub source: Rc<dyn RecordSource>,
    pub clock: Rc<dyn Clock>,
    pub state_store: Rc<dyn ScrollStateStore>,
    /// Scopes the persisted scroll state
    pub context: String,
    pub host: Box<dyn ViewportHost>,
    pub renderer: Box<dyn RowRenderer<N>>,
    pub node_factory: Box<dyn FnMut() -> N>,
    pub spawner: Spawner,
}

struct ControllerInner<N: RowNode> {
    engine: RefCell<VirtualListEngine<N>>,
    loader: DataLoader,
    clock: Rc<dyn Clock>,
    alive: Rc<Cell<bool>>,
    spawner: Spawner,
    listeners: RefCell<ListenerRegistry>,
    on_status: RefCell<Option<Box<dyn Fn(ListStatus)>>>,
    dismissed_error: RefCell<Option<LoadError>>,
    last_status: RefCell<Option<ListStatus>>,
}

/// Handle to one mounted list. Clones share the same instance.
pub struct ListController<N: RowNode + 'static> {
    inner: Rc<ControllerInner<N>>,
}

impl<N: RowNode + 'static> Clone for ListController<N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<N: RowNode + 'static> ListController<N> {
    pub fn new(config: VirtualListConfig, deps: ListDeps<N>) -> Self {
        let store = Rc::new(RefCell::new(RecordStore::new()));
        let alive = Rc::new(Cell::new(true));
        let loader = DataLoader::new(deps.source, deps.clock.clone(), store.clone(), config, alive.clone());
        let persistence = ScrollPersistence::new(deps.state_store, &deps.context, &config);
        let engine = VirtualListEngine::new(config, store, deps.host, deps.renderer, deps.node_factory, persistence);

        let inner = Rc::new(ControllerInner {
            engine: RefCell::new(engine),
            loader,
            clock: deps.clock,
            alive,
            spawner: deps.spawner,
            listeners: RefCell::new(ListenerRegistry::default()),
            on_status: RefCell::new(None),
            dismissed_error: RefCell::new(None),
            last_status: RefCell::new(None),
        });

        // Failed attempts publish `retrying`; weak because the loader lives in `inner`
        let weak: Weak<ControllerInner<N>> = Rc::downgrade(&inner);
        inner.loader.set_on_retry(move || {
            if let Some(inner) = weak.upgrade() {
                ListController { inner }.notify();
            }
        });

        Self { inner }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.get()
    }

    /// Called whenever the status changes
    pub fn set_on_status(&self, callback: impl Fn(ListStatus) + 'static) {
        *self.inner.on_status.borrow_mut() = Some(Box::new(callback));
    }

    /// Registers a disposer that runs at teardown
    pub fn register_listener(&self, label: &'static str, dispose: impl FnOnce() + 'static) {
        if !self.is_alive() {
            // Too late to register; dispose right away
            dispose();
            return;
        }
        self.inner.listeners.borrow_mut().register(label, dispose);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn status(&self) -> ListStatus {
        let mut status = self.inner.engine.borrow().status();
        let loader = self.inner.loader.status();
        status.loading = loader.loading;
        status.has_more = loader.has_more;
        status.retrying = loader.loading && loader.attempts > 0;
        if loader.terminal {
            let dismissed = self.inner.dismissed_error.borrow();
            status.error = loader.last_error.filter(|err| dismissed.as_ref() != Some(err));
        }
        status
    }

    fn notify(&self) {
        let status = self.status();
        {
            let mut last = self.inner.last_status.borrow_mut();
            if last.as_ref() == Some(&status) {
                return;
            }
            *last = Some(status.clone());
        }
        if let Some(callback) = self.inner.on_status.borrow().as_ref() {
            callback(status);
        }
    }

    fn with_engine(&self, f: impl FnOnce(&mut VirtualListEngine<N>, u64) -> Option<LoadTrigger>) {
        if !self.is_alive() {
            return;
        }
        let now = self.inner.clock.now_ms();
        let trigger = f(&mut *self.inner.engine.borrow_mut(), now);
        if let Some(trigger) = trigger {
            self.spawn_load_more(trigger);
        }
        self.notify();
    }

    /// Restores persisted state and starts the first page load.
    pub fn mount(&self, viewport_height: f64, filters: Filters) {
        if !self.is_alive() {
            return;
        }
        log::info!("Mounting list (viewport {}px)", viewport_height);
        self.inner.engine.borrow_mut().mount(viewport_height);
        self.spawn_initial(filters);
        self.notify();
    }

    /// Discards the loaded rows and reloads from the top with `filters`.
    pub fn set_filters(&self, filters: Filters) {
        if !self.is_alive() {
            return;
        }
        let now = self.inner.clock.now_ms();
        self.inner.engine.borrow_mut().reset_for_filters(now);
        *self.inner.dismissed_error.borrow_mut() = None;
        self.spawn_initial(filters);
        self.notify();
    }

    pub fn on_scroll(&self, offset_px: f64) {
        self.with_engine(|engine, now| engine.on_scroll(offset_px, now));
    }

    pub fn on_resize(&self, viewport_height: f64) {
        self.with_engine(|engine, now| engine.on_resize(viewport_height, now));
    }

    pub fn on_animation_frame(&self) {
        self.with_engine(|engine, now| engine.on_animation_frame(now));
    }

    /// Timer callback for the deadline passed to `ViewportHost::schedule_wakeup`
    pub fn tick(&self) {
        self.with_engine(|engine, now| engine.tick(now));
    }

    pub fn on_sentinel_visible(&self) {
        if self.is_alive() {
            self.spawn_load_more(LoadTrigger::Sentinel);
        }
    }

    pub fn set_window_mode(&self, mode: WindowMode) {
        self.with_engine(|engine, _| {
            engine.set_window_mode(mode);
            None
        });
    }

    pub fn toggle_window_mode(&self) {
        let mode = self.inner.engine.borrow().window_mode();
        self.set_window_mode(mode.toggled());
    }

    /// Manual retry after a terminal failure
    pub fn retry(&self) {
        if !self.is_alive() {
            return;
        }
        *self.inner.dismissed_error.borrow_mut() = None;
        self.spawn_load_more(LoadTrigger::Manual);
    }

    /// Hides the error banner; loading stays stopped until `retry`
    pub fn dismiss_error(&self) {
        let current = self.inner.loader.status().last_error;
        *self.inner.dismissed_error.borrow_mut() = current;
        self.notify();
    }

    pub fn render_window(&self) -> RenderWindow {
        self.inner.engine.borrow().render_window()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.inner.engine.borrow().pool_stats()
    }

    pub fn scroll_offset(&self) -> f64 {
        self.inner.engine.borrow().scroll_offset()
    }

    fn spawn_initial(&self, filters: Filters) {
        let this = self.clone();
        (self.inner.spawner)(Box::pin(async move {
            this.load_initial(filters).await;
        }));
    }

    fn spawn_load_more(&self, trigger: LoadTrigger) {
        let this = self.clone();
        (self.inner.spawner)(Box::pin(async move {
            this.load_more(trigger).await;
        }));
    }

    pub async fn load_initial(&self, filters: Filters) -> LoadOutcome {
        let loader = self.inner.loader.clone();
        self.drive(loader.load_initial(filters)).await
    }

    pub async fn load_more(&self, trigger: LoadTrigger) -> LoadOutcome {
        let loader = self.inner.loader.clone();
        self.drive(loader.load_more(trigger)).await
    }

    /// Polls a load once so a started request shows up in the status, then
    /// waits for it and applies the outcome.
    async fn drive(&self, load: impl Future<Output = LoadOutcome>) -> LoadOutcome {
        futures::pin_mut!(load);
        let outcome = match futures::poll!(load.as_mut()) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => {
                self.notify();
                load.await
            }
        };
        self.apply_outcome(&outcome);
        outcome
    }

    fn apply_outcome(&self, outcome: &LoadOutcome) {
        if !self.is_alive() {
            return;
        }
        match outcome {
            LoadOutcome::Loaded { .. } => {
                let has_more = self.inner.loader.status().has_more;
                self.inner.engine.borrow_mut().on_data_changed(has_more);
            }
            LoadOutcome::Skipped(SkipReason::RateLimited) => {
                let due = self.inner.loader.next_load_allowed_ms();
                self.inner.engine.borrow_mut().defer_load(due);
            }
            LoadOutcome::Failed(_) => {
                *self.inner.dismissed_error.borrow_mut() = None;
            }
            LoadOutcome::Skipped(_) | LoadOutcome::Stale => {}
        }
        self.notify();
    }

    /// Stops everything: pending writes are flushed, tasks cancelled, nodes
    /// detached, listeners removed. Late fetch results are ignored.
    pub fn teardown(&self) {
        if !self.inner.alive.replace(false) {
            return;
        }
        self.inner.loader.cancel_backoff();
        self.inner.engine.borrow_mut().teardown();
        let removed = self.inner.listeners.borrow_mut().dispose_all();
        self.inner.on_status.borrow_mut().take();
        log::info!("List torn down, {} listener(s) removed", removed);
    }

    #[cfg(test)]
    fn inspect<R>(&self, f: impl FnOnce(&VirtualListEngine<N>) -> R) -> R {
        f(&self.inner.engine.borrow())
    }
}
