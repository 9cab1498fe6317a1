//! Bounded pool of reusable row nodes.
//!
//! The pool is an arena with a free list. Each slot carries the index it is
//! currently assigned to; a slot with no assigned index is free. Creating and
//! destroying one row subtree per scroll tick dominates the cost of large
//! lists, so nodes are checked out and returned instead.
//!
//! When every pooled slot is live the pool still hands out nodes: these are
//! overflow nodes, created on demand and detached as soon as they are released,
//! so the long-term pool never grows past its capacity.

/// A display node the pool can recycle.
pub trait RowNode {
    /// Clears content and index binding back to a neutral placeholder
    fn reset(&mut self);

    /// Positions the node at `top_px` within the list content
    fn set_offset(&mut self, top_px: f64);

    /// Removes the node from its container for good
    fn detach(&mut self);
}

/// Reference to a node checked out of the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeHandle {
    /// Long-lived node owned by a pool slot
    Pooled(usize),
    /// Temporary node created while the pool was exhausted
    Overflow(usize),
}

struct PoolSlot<N> {
    node: N,
    assigned: Option<usize>,
}

/// Snapshot of pool occupancy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Nodes retained by the pool (free or live)
    pub pooled: usize,
    /// Pooled nodes waiting for reuse
    pub free: usize,
    /// Nodes currently assigned to an index, overflow included
    pub live: usize,
    /// Live overflow nodes
    pub overflow_live: usize,
    /// Nodes ever created by this pool
    pub created_total: usize,
}

pub struct NodePool<N: RowNode> {
    slots: Vec<PoolSlot<N>>,
    free: Vec<usize>,
    overflow: Vec<Option<PoolSlot<N>>>,
    overflow_vacant: Vec<usize>,
    capacity: usize,
    factory: Box<dyn FnMut() -> N>,
    created_total: usize,
}

impl<N: RowNode> NodePool<N> {
    pub fn new(capacity: usize, factory: Box<dyn FnMut() -> N>) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            overflow: Vec::new(),
            overflow_vacant: Vec::new(),
            capacity,
            factory,
            created_total: 0,
        }
    }

    /// Checks out a node for `index`.
    ///
    /// Reuses a free slot when one exists, grows the pool while it is below
    /// capacity, and otherwise creates an overflow node. Never fails.
    pub fn acquire(&mut self, index: usize) -> NodeHandle {
        if let Some(slot) = self.free.pop() {
            self.slots[slot].assigned = Some(index);
            return NodeHandle::Pooled(slot);
        }

        let node = (self.factory)();
        self.created_total += 1;

        if self.slots.len() < self.capacity {
            self.slots.push(PoolSlot {
                node,
                assigned: Some(index),
            });
            return NodeHandle::Pooled(self.slots.len() - 1);
        }

        log::debug!("Node pool exhausted ({} slots), creating overflow node for row {}", self.capacity, index);
        let entry = PoolSlot {
            node,
            assigned: Some(index),
        };
        match self.overflow_vacant.pop() {
            Some(id) => {
                self.overflow[id] = Some(entry);
                NodeHandle::Overflow(id)
            }
            None => {
                self.overflow.push(Some(entry));
                NodeHandle::Overflow(self.overflow.len() - 1)
            }
        }
    }

    /// Returns a node to the pool.
    ///
    /// Pooled nodes are reset and put back on the free list; overflow nodes are
    /// detached and dropped. Returns false if the handle was not checked out.
    pub fn release(&mut self, handle: NodeHandle) -> bool {
        match handle {
            NodeHandle::Pooled(slot) => {
                let Some(entry) = self.slots.get_mut(slot) else {
                    return false;
                };
                if entry.assigned.take().is_none() {
                    return false;
                }
                entry.node.reset();
                self.free.push(slot);
                true
            }
            NodeHandle::Overflow(id) => {
                let Some(mut entry) = self.overflow.get_mut(id).and_then(Option::take) else {
                    return false;
                };
                entry.node.detach();
                self.overflow_vacant.push(id);
                true
            }
        }
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut N> {
        match handle {
            NodeHandle::Pooled(slot) => self
                .slots
                .get_mut(slot)
                .filter(|entry| entry.assigned.is_some())
                .map(|entry| &mut entry.node),
            NodeHandle::Overflow(id) => self
                .overflow
                .get_mut(id)
                .and_then(Option::as_mut)
                .map(|entry| &mut entry.node),
        }
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&N> {
        match handle {
            NodeHandle::Pooled(slot) => self
                .slots
                .get(slot)
                .filter(|entry| entry.assigned.is_some())
                .map(|entry| &entry.node),
            NodeHandle::Overflow(id) => self
                .overflow
                .get(id)
                .and_then(Option::as_ref)
                .map(|entry| &entry.node),
        }
    }

    /// Index the handle is currently assigned to
    pub fn assigned_index(&self, handle: NodeHandle) -> Option<usize> {
        match handle {
            NodeHandle::Pooled(slot) => self.slots.get(slot).and_then(|entry| entry.assigned),
            NodeHandle::Overflow(id) => self
                .overflow
                .get(id)
                .and_then(Option::as_ref)
                .and_then(|entry| entry.assigned),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let overflow_live = self.overflow.iter().filter(|entry| entry.is_some()).count();
        PoolStats {
            pooled: self.slots.len(),
            free: self.free.len(),
            live: self.slots.len() - self.free.len() + overflow_live,
            overflow_live,
            created_total: self.created_total,
        }
    }

    /// Detaches and drops every node. Used at teardown.
    pub fn clear(&mut self) {
        for entry in self.slots.iter_mut() {
            entry.node.detach();
        }
        for entry in self.overflow.iter_mut().filter_map(Option::as_mut) {
            entry.node.detach();
        }
        self.slots.clear();
        self.free.clear();
        self.overflow.clear();
        self.overflow_vacant.clear();
    }
}
