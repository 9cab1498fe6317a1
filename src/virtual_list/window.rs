//! Render window computation and node diffing.
//!
//! The window is the buffered index range that owns live nodes. It is
//! recomputed from the scroll offset on every pass and diffed against the
//! previous one; nodes leaving the range go back to the pool, positions
//! entering it get a node only once their record has arrived.

use std::collections::BTreeMap;

use super::pool::{NodeHandle, NodePool, PoolStats, RowNode};
use super::store::{RecordStore, TransactionRecord};

/// Half-open range `[start, end)` of positions backed by live nodes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderWindow {
    pub start: usize,
    pub end: usize,
}

impl RenderWindow {
    pub const EMPTY: RenderWindow = RenderWindow { start: 0, end: 0 };

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Computes the buffered window for a scroll offset.
///
/// Always satisfies `0 <= start <= end <= total_count`. An empty list
/// collapses to `[0, 0)`.
pub fn compute_window(
    scroll_offset_px: f64,
    viewport_height_px: f64,
    item_height_px: f64,
    total_count: usize,
    buffer_size: usize,
) -> RenderWindow {
    if total_count == 0 || item_height_px <= 0.0 {
        return RenderWindow::EMPTY;
    }

    let offset = scroll_offset_px.max(0.0);
    let raw_start = (offset / item_height_px).floor() as usize;
    let raw_end = ((offset + viewport_height_px.max(0.0)) / item_height_px).ceil() as usize;

    let end = raw_end.saturating_add(buffer_size).min(total_count);
    let start = raw_start.saturating_sub(buffer_size).min(end);

    RenderWindow { start, end }
}

/// Paints one record into a node. The engine never looks past the record id.
pub trait RowRenderer<N> {
    fn paint(&mut self, node: &mut N, index: usize, record: &TransactionRecord);
}

/// Result of one render pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Dead zone hit; nothing touched
    Skipped,
    Updated {
        /// Positions that received a node this pass
        created: usize,
        /// Nodes returned to the pool
        recycled: usize,
        /// Positions in range still waiting for data
        missing: usize,
    },
}

pub struct RenderWindowManager<N: RowNode> {
    pool: NodePool<N>,
    current: RenderWindow,
    bound: BTreeMap<usize, NodeHandle>,
    buffer_size: usize,
    hysteresis_rows: usize,
    item_height_px: f64,
}

impl<N: RowNode> RenderWindowManager<N> {
    pub fn new(pool: NodePool<N>, buffer_size: usize, hysteresis_rows: usize) -> Self {
        Self {
            pool,
            current: RenderWindow::EMPTY,
            bound: BTreeMap::new(),
            buffer_size,
            hysteresis_rows,
            item_height_px: 0.0,
        }
    }

    pub fn current(&self) -> RenderWindow {
        self.current
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Recomputes the window for `scroll_offset_px` and applies the diff.
    ///
    /// Without `force`, changes of at most `hysteresis_rows` on both sides are
    /// skipped. A forced pass (new data, resize, mode switch) always diffs.
    pub fn update_range(
        &mut self,
        scroll_offset_px: f64,
        viewport_height_px: f64,
        item_height_px: f64,
        store: &RecordStore,
        renderer: &mut dyn RowRenderer<N>,
        force: bool,
    ) -> RenderOutcome {
        let total_count = store.total_count();
        let next = compute_window(
            scroll_offset_px,
            viewport_height_px,
            item_height_px,
            total_count,
            self.buffer_size,
        );

        if !force && self.within_dead_zone(next, total_count) {
            return RenderOutcome::Skipped;
        }

        let relayout = item_height_px != self.item_height_px;
        self.item_height_px = item_height_px;

        let leaving: Vec<usize> = self
            .bound
            .keys()
            .copied()
            .filter(|index| !next.contains(*index))
            .collect();
        let recycled = leaving.len();
        for index in leaving {
            if let Some(handle) = self.bound.remove(&index) {
                self.pool.release(handle);
            }
        }

        if relayout {
            for (&index, &handle) in self.bound.iter() {
                if let Some(node) = self.pool.node_mut(handle) {
                    node.set_offset(index as f64 * item_height_px);
                }
            }
        }

        let mut created = 0;
        let mut missing = 0;
        for index in next.start..next.end {
            if self.bound.contains_key(&index) {
                continue;
            }
            let Some(record) = store.get(index) else {
                missing += 1;
                continue;
            };
            let handle = self.pool.acquire(index);
            if let Some(node) = self.pool.node_mut(handle) {
                node.set_offset(index as f64 * item_height_px);
                renderer.paint(node, index, record);
            }
            self.bound.insert(index, handle);
            created += 1;
        }

        log::debug!(
            "Render window {}..{} of {} (created {}, recycled {}, missing {})",
            next.start,
            next.end,
            total_count,
            created,
            recycled,
            missing
        );

        self.current = next;
        RenderOutcome::Updated {
            created,
            recycled,
            missing,
        }
    }

    fn within_dead_zone(&self, next: RenderWindow, total_count: usize) -> bool {
        if self.current.is_empty() {
            return false;
        }

        // Reaching either end of the list always renders the edge rows
        let reaches_top = next.start == 0 && self.current.start != 0;
        let reaches_bottom = next.end == total_count && self.current.end != total_count;
        if reaches_top || reaches_bottom {
            return false;
        }

        next.start.abs_diff(self.current.start) <= self.hysteresis_rows
            && next.end.abs_diff(self.current.end) <= self.hysteresis_rows
    }

    /// Releases every bound node and forgets the current window.
    pub fn reset(&mut self) {
        for (_, handle) in std::mem::take(&mut self.bound) {
            self.pool.release(handle);
        }
        self.current = RenderWindow::EMPTY;
    }

    /// Detaches every node, pooled or live. The manager is unusable afterwards.
    pub fn teardown(&mut self) {
        self.bound.clear();
        self.pool.clear();
        self.current = RenderWindow::EMPTY;
    }

    /// Positions currently holding a node, ascending
    pub fn bound_indices(&self) -> Vec<usize> {
        self.bound.keys().copied().collect()
    }

    pub fn bound_handles(&self) -> Vec<(usize, NodeHandle)> {
        self.bound.iter().map(|(&index, &handle)| (index, handle)).collect()
    }

    pub fn node_at(&self, index: usize) -> Option<&N> {
        self.bound.get(&index).and_then(|handle| self.pool.node(*handle))
    }

    pub fn live_nodes(&self) -> usize {
        self.bound.len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_list::geometry::{compute_dimensions, WindowMode};
    use crate::virtual_list::testing::{fake_factory, records, FakeNode, FakeRenderer, NodeLog};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const VIEWPORT: f64 = 600.0;
    const ITEM: f64 = 72.0;

    fn manager(capacity: usize) -> (RenderWindowManager<FakeNode>, NodeLog) {
        let log = NodeLog::default();
        let pool = NodePool::new(capacity, fake_factory(&log));
        (RenderWindowManager::new(pool, 5, 2), log)
    }

    fn store_with(loaded: u64, total: usize) -> RecordStore {
        let mut store = RecordStore::new();
        store.append(records(0..loaded), total);
        store
    }

    type Snapshot = Vec<(usize, NodeHandle, Option<String>, Option<f64>)>;

    fn snapshot(manager: &RenderWindowManager<FakeNode>) -> Snapshot {
        manager
            .bound_handles()
            .into_iter()
            .map(|(index, handle)| {
                let node = manager.node_at(index).unwrap();
                (index, handle, node.content.clone(), node.offset)
            })
            .collect()
    }

    #[test]
    fn test_cold_start_window() {
        let (mut manager, _log) = manager(40);
        let store = store_with(100, 500);
        let mut renderer = FakeRenderer::default();

        let outcome = manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);

        assert_eq!(manager.current(), RenderWindow { start: 0, end: 14 });
        assert_eq!(
            outcome,
            RenderOutcome::Updated {
                created: 14,
                recycled: 0,
                missing: 0
            }
        );
        assert_eq!(manager.live_nodes(), 14);
        assert_eq!(renderer.paints(), 14);

        let node = manager.node_at(3).unwrap();
        assert_eq!(node.content.as_deref(), Some("tx-3"));
        assert_eq!(node.offset, Some(3.0 * ITEM));
    }

    #[test]
    fn test_empty_list_renders_nothing() {
        let (mut manager, log) = manager(40);
        let store = RecordStore::new();
        let mut renderer = FakeRenderer::default();

        let outcome = manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, true);

        assert_eq!(manager.current(), RenderWindow::EMPTY);
        assert_eq!(
            outcome,
            RenderOutcome::Updated {
                created: 0,
                recycled: 0,
                missing: 0
            }
        );
        assert_eq!(log.created(), 0);
    }

    #[test]
    fn test_range_soundness() {
        let total = 500;
        let dims = compute_dimensions(VIEWPORT, WindowMode::Expanded, total);
        let max_offset = dims.max_scroll_offset(VIEWPORT);

        let mut offset = 0.0;
        while offset <= max_offset {
            let window = compute_window(offset, VIEWPORT, ITEM, total, 5);
            assert!(window.start <= window.end);
            assert!(window.end <= total);
            assert!(window.len() <= dims.visible_count + 2 * 5);

            // Fully visible rows are always inside the window
            let first_full = (offset / ITEM).ceil() as usize;
            let last_full = ((offset + VIEWPORT) / ITEM).floor() as usize;
            for index in first_full..last_full.min(total) {
                assert!(window.contains(index), "offset {} index {}", offset, index);
            }

            offset += 13.7;
        }
    }

    #[test]
    fn test_window_clamped_past_end() {
        let window = compute_window(1_000_000.0, VIEWPORT, ITEM, 20, 5);
        assert_eq!(window, RenderWindow { start: 20, end: 20 });
        assert!(window.is_empty());
    }

    #[test]
    fn test_scrolling_recycles_nodes() {
        let (mut manager, log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();

        manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        let outcome = manager.update_range(ITEM * 100.0, VIEWPORT, ITEM, &store, &mut renderer, false);

        assert_eq!(manager.current(), RenderWindow { start: 95, end: 114 });
        assert_eq!(
            outcome,
            RenderOutcome::Updated {
                created: 19,
                recycled: 14,
                missing: 0
            }
        );
        // 14 initial nodes reused, only 5 more created
        assert_eq!(log.created(), 19);
        assert_eq!(manager.bound_indices(), (95..114).collect::<Vec<_>>());
    }

    #[test]
    fn test_hysteresis_skips_small_changes() {
        let (mut manager, _log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();

        manager.update_range(ITEM * 100.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        let before = snapshot(&manager);
        let paints = renderer.paints();

        // Two rows down moves both edges by exactly two
        let outcome = manager.update_range(ITEM * 102.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert_eq!(outcome, RenderOutcome::Skipped);
        // Sub-row jitter
        let outcome = manager.update_range(ITEM * 100.0 + 5.5, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert_eq!(outcome, RenderOutcome::Skipped);

        assert_eq!(snapshot(&manager), before);
        assert_eq!(renderer.paints(), paints);

        // Three rows is outside the dead zone
        let outcome = manager.update_range(ITEM * 103.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert!(matches!(outcome, RenderOutcome::Updated { .. }));
    }

    #[test]
    fn test_hysteresis_does_not_block_edges() {
        let (mut manager, _log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();

        manager.update_range(ITEM * 6.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert_eq!(manager.current().start, 1);

        // One row up reaches the top of the list
        let outcome = manager.update_range(ITEM * 5.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert!(matches!(outcome, RenderOutcome::Updated { .. }));
        assert_eq!(manager.current().start, 0);
    }

    #[test]
    fn test_missing_rows_filled_when_data_arrives() {
        let (mut manager, _log) = manager(40);
        let mut store = store_with(10, 500);
        let mut renderer = FakeRenderer::default();

        let outcome = manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        assert_eq!(
            outcome,
            RenderOutcome::Updated {
                created: 10,
                recycled: 0,
                missing: 4
            }
        );
        assert!(manager.node_at(12).is_none());

        store.append(records(10..60), 500);
        let outcome = manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, true);
        assert_eq!(
            outcome,
            RenderOutcome::Updated {
                created: 4,
                recycled: 0,
                missing: 0
            }
        );
        assert_eq!(manager.node_at(12).unwrap().content.as_deref(), Some("tx-12"));
    }

    #[test]
    fn test_shrinking_total_clamps_window() {
        let (mut manager, _log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();
        manager.update_range(ITEM * 100.0, VIEWPORT, ITEM, &store, &mut renderer, false);

        let smaller = store_with(20, 20);
        manager.update_range(ITEM * 100.0, VIEWPORT, ITEM, &smaller, &mut renderer, true);

        assert!(manager.current().end <= 20);
        assert!(manager.bound_indices().iter().all(|&index| index < 20));
    }

    #[test]
    fn test_mode_change_repositions_nodes() {
        let (mut manager, _log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();
        manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);

        manager.update_range(0.0, VIEWPORT, 48.0, &store, &mut renderer, true);
        assert_eq!(manager.node_at(4).unwrap().offset, Some(4.0 * 48.0));
        assert_eq!(manager.current(), RenderWindow { start: 0, end: 18 });
    }

    #[test]
    fn test_recycling_bound_under_random_scrolling() {
        let (mut manager, log) = manager(40);
        let store = store_with(2000, 2000);
        let mut renderer = FakeRenderer::default();
        let dims = compute_dimensions(VIEWPORT, WindowMode::Expanded, 2000);
        let max_offset = dims.max_scroll_offset(VIEWPORT);
        let bound = dims.visible_count + 2 * manager.buffer_size();
        let mut rng = StdRng::seed_from_u64(7);

        let mut offset: f64 = 0.0;
        for step in 0..10_000 {
            // Mix of small drags and long flings
            offset = if step % 50 == 0 {
                rng.gen_range(0.0..=max_offset)
            } else {
                (offset + rng.gen_range(-400.0..400.0)).clamp(0.0, max_offset)
            };
            manager.update_range(offset, VIEWPORT, ITEM, &store, &mut renderer, false);

            let stats = manager.pool_stats();
            assert!(stats.live <= bound, "step {}: {} live nodes", step, stats.live);
            assert_eq!(stats.live, manager.live_nodes());
        }

        assert!(log.created() <= 40);
        assert_eq!(manager.pool_stats().overflow_live, 0);
    }

    #[test]
    fn test_small_pool_overflows_without_failing() {
        let (mut manager, log) = manager(4);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();

        manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        let stats = manager.pool_stats();
        assert_eq!(stats.pooled, 4);
        assert_eq!(stats.overflow_live, 10);
        assert_eq!(manager.live_nodes(), 14);

        manager.update_range(ITEM * 300.0, VIEWPORT, ITEM, &store, &mut renderer, false);
        let stats = manager.pool_stats();
        assert_eq!(stats.pooled, 4);
        assert_eq!(stats.live, 19);
        // The 10 overflow nodes from the first window were discarded
        assert_eq!(log.detached(), 10);
    }

    #[test]
    fn test_reset_returns_all_nodes() {
        let (mut manager, _log) = manager(40);
        let store = store_with(500, 500);
        let mut renderer = FakeRenderer::default();
        manager.update_range(0.0, VIEWPORT, ITEM, &store, &mut renderer, false);

        manager.reset();
        assert_eq!(manager.current(), RenderWindow::EMPTY);
        assert_eq!(manager.live_nodes(), 0);
        let stats = manager.pool_stats();
        assert_eq!(stats.free, 14);
        assert_eq!(stats.live, 0);
    }
}
