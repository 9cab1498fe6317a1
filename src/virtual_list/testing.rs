//! Fakes shared by the engine's unit tests.

use async_trait::async_trait;
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::Range;
use std::rc::Rc;

use super::clock::Clock;
use super::coordinator::ViewportHost;
use super::error::LoadError;
use super::loader::{PageRequest, RecordPage, RecordSource};
use super::pool::RowNode;
use super::store::TransactionRecord;
use super::window::RowRenderer;

#[derive(Clone, Default)]
pub struct NodeLog {
    created: Rc<Cell<usize>>,
    detached: Rc<Cell<usize>>,
    resets: Rc<Cell<usize>>,
}

impl NodeLog {
    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn detached(&self) -> usize {
        self.detached.get()
    }

    pub fn resets(&self) -> usize {
        self.resets.get()
    }
}

#[derive(Debug)]
pub struct FakeNode {
    pub content: Option<String>,
    pub offset: Option<f64>,
    pub detached: bool,
    log: NodeLog,
}

impl std::fmt::Debug for NodeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeLog(created={}, detached={})", self.created(), self.detached())
    }
}

impl RowNode for FakeNode {
    fn reset(&mut self) {
        self.content = None;
        self.offset = None;
        self.log.resets.set(self.log.resets.get() + 1);
    }

    fn set_offset(&mut self, top_px: f64) {
        self.offset = Some(top_px);
    }

    fn detach(&mut self) {
        self.detached = true;
        self.log.detached.set(self.log.detached.get() + 1);
    }
}

pub fn fake_factory(log: &NodeLog) -> Box<dyn FnMut() -> FakeNode> {
    let log = log.clone();
    Box::new(move || {
        log.created.set(log.created.get() + 1);
        FakeNode {
            content: None,
            offset: None,
            detached: false,
            log: log.clone(),
        }
    })
}

/// Writes `tx-<id>` into the node and counts paints
#[derive(Clone, Default)]
pub struct FakeRenderer {
    paints: Rc<Cell<usize>>,
}

impl FakeRenderer {
    pub fn paints(&self) -> usize {
        self.paints.get()
    }
}

impl RowRenderer<FakeNode> for FakeRenderer {
    fn paint(&mut self, node: &mut FakeNode, _index: usize, record: &TransactionRecord) {
        node.content = Some(format!("tx-{}", record.id));
        self.paints.set(self.paints.get() + 1);
    }
}

pub fn records(ids: Range<u64>) -> Vec<TransactionRecord> {
    ids.map(TransactionRecord::new).collect()
}

/// A page whose `has_more` follows from the presence of a cursor
pub fn page(ids: Range<u64>, total_count: usize, next_cursor: Option<&str>) -> RecordPage {
    RecordPage {
        records: records(ids),
        total_count,
        has_more: next_cursor.is_some(),
        next_cursor: next_cursor.map(str::to_string),
    }
}

/// Clock that only moves when told to. `sleep` returns at once and advances time,
/// unless sleeps are held, in which case they never finish.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
    sleeps: RefCell<Vec<u64>>,
    held: Cell<bool>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.borrow().clone()
    }

    pub fn hold_sleeps(&self) {
        self.held.set(true);
    }
}

#[async_trait(?Send)]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    async fn sleep(&self, ms: u64) {
        self.sleeps.borrow_mut().push(ms);
        if self.held.get() {
            futures::future::pending::<()>().await;
        }
        self.advance(ms);
    }
}

enum Scripted {
    Ready(Result<RecordPage, LoadError>),
    Gated(oneshot::Receiver<Result<RecordPage, LoadError>>),
}

/// Record source answering from a script, in order
#[derive(Default)]
pub struct MockSource {
    script: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<PageRequest>>,
}

impl MockSource {
    pub fn push_ok(&self, page: RecordPage) {
        self.script.borrow_mut().push_back(Scripted::Ready(Ok(page)));
    }

    pub fn push_err(&self, err: LoadError) {
        self.script.borrow_mut().push_back(Scripted::Ready(Err(err)));
    }

    /// The response is whatever gets sent on the paired sender
    pub fn push_gated(&self, gate: oneshot::Receiver<Result<RecordPage, LoadError>>) {
        self.script.borrow_mut().push_back(Scripted::Gated(gate));
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl RecordSource for MockSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<RecordPage, LoadError> {
        self.requests.borrow_mut().push(request);
        let next = self.script.borrow_mut().pop_front();
        match next {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Gated(gate)) => gate
                .await
                .unwrap_or_else(|_| Err(LoadError::Network("gate dropped".into()))),
            None => Err(LoadError::Network("no scripted response".into())),
        }
    }
}

#[derive(Debug, Default)]
pub struct ViewportLog {
    pub content_height: f64,
    pub sentinel_top: f64,
    pub scrolls: Vec<f64>,
    pub frame_requests: usize,
    pub wakeup: Option<u64>,
}

/// Viewport host recording every call
#[derive(Clone, Default)]
pub struct FakeViewport {
    pub log: Rc<RefCell<ViewportLog>>,
}

impl ViewportHost for FakeViewport {
    fn set_content_height(&mut self, height_px: f64) {
        self.log.borrow_mut().content_height = height_px;
    }

    fn place_sentinel(&mut self, top_px: f64) {
        self.log.borrow_mut().sentinel_top = top_px;
    }

    fn scroll_to(&mut self, offset_px: f64) {
        self.log.borrow_mut().scrolls.push(offset_px);
    }

    fn request_animation_frame(&mut self) {
        self.log.borrow_mut().frame_requests += 1;
    }

    fn schedule_wakeup(&mut self, due_ms: Option<u64>) {
        self.log.borrow_mut().wakeup = due_ms;
    }
}
