//! Browser bindings: DOM row nodes, the scroll container host, listeners,
//! the proximity sentinel and LocalStorage persistence.

use gloo_storage::{LocalStorage, Storage};
use gloo_timers::callback::Timeout;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, Window};

use super::clock::{Clock, SystemClock};
use super::config::VirtualListConfig;
use super::coordinator::{ListController, ListDeps, ListStatus, Spawner, ViewportHost};
use super::loader::{Filters, RecordSource};
use super::persistence::ScrollStateStore;
use super::pool::RowNode;
use super::store::TransactionRecord;
use super::window::RowRenderer;
use crate::components::transaction_row::RowCells;

type ControllerSlot = Rc<RefCell<Option<ListController<DomRowNode>>>>;

fn with_controller(slot: &ControllerSlot, f: impl FnOnce(&ListController<DomRowNode>)) {
    let controller = slot.borrow().clone();
    if let Some(controller) = controller {
        f(&controller);
    }
}

/// One absolutely positioned row element inside the spacer
pub struct DomRowNode {
    element: Option<HtmlElement>,
}

impl DomRowNode {
    pub fn element(&self) -> Option<&HtmlElement> {
        self.element.as_ref()
    }
}

impl RowNode for DomRowNode {
    fn reset(&mut self) {
        if let Some(el) = &self.element {
            el.set_inner_html("");
            el.remove_attribute("data-index").ok();
            el.remove_attribute("data-id").ok();
            el.style().set_property("visibility", "hidden").ok();
        }
    }

    fn set_offset(&mut self, top_px: f64) {
        if let Some(el) = &self.element {
            let style = el.style();
            style.set_property("transform", &format!("translateY({}px)", top_px)).ok();
            style.set_property("visibility", "visible").ok();
        }
    }

    fn detach(&mut self) {
        if let Some(el) = self.element.take() {
            el.remove();
        }
    }
}

/// Creates hidden row elements inside `parent`
pub fn dom_row_factory(document: Document, parent: HtmlElement) -> Box<dyn FnMut() -> DomRowNode> {
    Box::new(move || {
        let element = document
            .create_element("div")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok());

        match element {
            Some(el) => {
                el.set_class_name("tx-row");
                let style = el.style();
                style.set_property("position", "absolute").ok();
                style.set_property("top", "0").ok();
                style.set_property("left", "0").ok();
                style.set_property("right", "0").ok();
                style.set_property("visibility", "hidden").ok();
                if let Err(e) = parent.append_child(&el) {
                    log::warn!("Failed to attach row element: {:?}", e);
                }
                DomRowNode { element: Some(el) }
            }
            None => {
                log::error!("Failed to create row element");
                DomRowNode { element: None }
            }
        }
    })
}

pub struct TransactionRowRenderer {
    document: Document,
}

impl TransactionRowRenderer {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn append_cell(&self, parent: &HtmlElement, class: &str, text: &str) {
        if let Ok(cell) = self.document.create_element("span") {
            cell.set_class_name(class);
            cell.set_text_content(Some(text));
            parent.append_child(&cell).ok();
        }
    }
}

impl RowRenderer<DomRowNode> for TransactionRowRenderer {
    fn paint(&mut self, node: &mut DomRowNode, index: usize, record: &TransactionRecord) {
        let Some(el) = node.element() else {
            return;
        };
        let cells = RowCells::from_record(record);

        el.set_inner_html("");
        el.set_attribute("data-index", &index.to_string()).ok();
        el.set_attribute("data-id", &record.id.to_string()).ok();
        el.set_class_name(if cells.pending { "tx-row tx-row--pending" } else { "tx-row" });

        self.append_cell(el, "tx-row__date", &cells.date);
        self.append_cell(el, "tx-row__description", &cells.description);
        self.append_cell(el, "tx-row__category", &cells.category);
        self.append_cell(el, cells.direction.css_class(), &cells.amount);
    }
}

/// Scroll container, spacer and sentinel of one mounted list
#[derive(Clone)]
pub struct DomListElements {
    pub container: HtmlElement,
    pub spacer: HtmlElement,
    pub sentinel: HtmlElement,
}

impl DomListElements {
    pub fn find(document: &Document, container_id: &str, spacer_id: &str, sentinel_id: &str) -> Result<Self, String> {
        let get = |id: &str| -> Result<HtmlElement, String> {
            document
                .get_element_by_id(id)
                .ok_or_else(|| format!("Element #{} not found", id))?
                .dyn_into::<HtmlElement>()
                .map_err(|_| format!("Element #{} is not an HTML element", id))
        };

        Ok(Self {
            container: get(container_id)?,
            spacer: get(spacer_id)?,
            sentinel: get(sentinel_id)?,
        })
    }
}

struct DomViewportHost {
    window: Window,
    elements: DomListElements,
    clock: Rc<dyn Clock>,
    slot: ControllerSlot,
    wakeup: Option<Timeout>,
}

impl ViewportHost for DomViewportHost {
    fn set_content_height(&mut self, height_px: f64) {
        self.elements
            .spacer
            .style()
            .set_property("height", &format!("{}px", height_px))
            .ok();
    }

    fn place_sentinel(&mut self, top_px: f64) {
        self.elements
            .sentinel
            .style()
            .set_property("top", &format!("{}px", top_px))
            .ok();
    }

    fn scroll_to(&mut self, offset_px: f64) {
        self.elements.container.set_scroll_top(offset_px.round() as i32);
    }

    fn request_animation_frame(&mut self) {
        let slot = self.slot.clone();
        let callback = Closure::once_into_js(move || {
            with_controller(&slot, |controller| controller.on_animation_frame());
        });
        if let Err(e) = self.window.request_animation_frame(callback.unchecked_ref()) {
            log::warn!("requestAnimationFrame failed: {:?}", e);
        }
    }

    fn schedule_wakeup(&mut self, due_ms: Option<u64>) {
        // Dropping a Timeout cancels it
        self.wakeup = due_ms.map(|due| {
            let delay = due.saturating_sub(self.clock.now_ms()).min(u32::MAX as u64) as u32;
            let slot = self.slot.clone();
            Timeout::new(delay, move || {
                with_controller(&slot, |controller| controller.tick());
            })
        });
    }
}

/// Persisted scroll state in `window.localStorage`
pub struct LocalStorageStateStore;

impl ScrollStateStore for LocalStorageStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        LocalStorage::get::<Value>(key).ok()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), String> {
        LocalStorage::set(key, value).map_err(|e| format!("Failed to write {}: {}", key, e))
    }
}

pub fn local_spawner() -> Spawner {
    Rc::new(|future| wasm_bindgen_futures::spawn_local(future))
}

fn attach_scroll_listener(controller: &ListController<DomRowNode>, slot: &ControllerSlot, container: &HtmlElement) -> Result<(), String> {
    let slot_for_scroll = slot.clone();
    let target = container.clone();
    let on_scroll = Closure::wrap(Box::new(move || {
        let offset = target.scroll_top() as f64;
        with_controller(&slot_for_scroll, |controller| controller.on_scroll(offset));
    }) as Box<dyn FnMut()>);

    container
        .add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
        .map_err(|e| format!("Failed to add scroll listener: {:?}", e))?;

    let container = container.clone();
    controller.register_listener("scroll", move || {
        container
            .remove_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
            .ok();
    });
    Ok(())
}

fn attach_resize_listener(
    controller: &ListController<DomRowNode>,
    slot: &ControllerSlot,
    window: &Window,
    container: &HtmlElement,
) -> Result<(), String> {
    let slot_for_resize = slot.clone();
    let target = container.clone();
    let on_resize = Closure::wrap(Box::new(move || {
        let height = target.client_height() as f64;
        with_controller(&slot_for_resize, |controller| controller.on_resize(height));
    }) as Box<dyn FnMut()>);

    window
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
        .map_err(|e| format!("Failed to add resize listener: {:?}", e))?;

    let window = window.clone();
    controller.register_listener("resize", move || {
        window
            .remove_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
            .ok();
    });
    Ok(())
}

fn observe_sentinel(
    controller: &ListController<DomRowNode>,
    slot: &ControllerSlot,
    elements: &DomListElements,
    root_margin_px: u32,
) -> Result<(), String> {
    let slot_for_observer = slot.clone();
    let callback = Closure::wrap(Box::new(move |entries: js_sys::Array| {
        let visible = entries.iter().any(|entry| {
            entry
                .dyn_into::<IntersectionObserverEntry>()
                .map(|entry| entry.is_intersecting())
                .unwrap_or(false)
        });
        if visible {
            log::debug!("Sentinel within {}px of the viewport", root_margin_px);
            with_controller(&slot_for_observer, |controller| controller.on_sentinel_visible());
        }
    }) as Box<dyn FnMut(js_sys::Array)>);

    let options = IntersectionObserverInit::new();
    options.set_root(Some(elements.container.as_ref()));
    options.set_root_margin(&format!("{}px", root_margin_px));

    let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)
        .map_err(|e| format!("Failed to create IntersectionObserver: {:?}", e))?;
    observer.observe(&elements.sentinel);

    controller.register_listener("sentinel observer", move || {
        observer.disconnect();
        drop(callback);
    });
    Ok(())
}

/// Wires a list into the DOM and starts loading.
///
/// The returned controller must be torn down when the list unmounts; that
/// removes every listener and breaks the reference cycles through the
/// callbacks.
pub fn mount_list(
    elements: DomListElements,
    source: Rc<dyn RecordSource>,
    context: &str,
    config: VirtualListConfig,
    filters: Filters,
    on_status: impl Fn(ListStatus) + 'static,
) -> Result<ListController<DomRowNode>, String> {
    let window = web_sys::window().ok_or("No window available")?;
    let document = window.document().ok_or("No document available")?;

    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());
    let slot: ControllerSlot = Rc::new(RefCell::new(None));

    let host = DomViewportHost {
        window: window.clone(),
        elements: elements.clone(),
        clock: clock.clone(),
        slot: slot.clone(),
        wakeup: None,
    };

    let controller = ListController::new(
        config,
        ListDeps {
            source,
            clock,
            state_store: Rc::new(LocalStorageStateStore),
            context: context.to_string(),
            host: Box::new(host),
            renderer: Box::new(TransactionRowRenderer::new(document.clone())),
            node_factory: dom_row_factory(document, elements.spacer.clone()),
            spawner: local_spawner(),
        },
    );

    *slot.borrow_mut() = Some(controller.clone());
    {
        let slot = slot.clone();
        controller.register_listener("controller slot", move || {
            slot.borrow_mut().take();
        });
    }
    controller.set_on_status(on_status);

    let wired = attach_scroll_listener(&controller, &slot, &elements.container)
        .and_then(|_| attach_resize_listener(&controller, &slot, &window, &elements.container))
        .and_then(|_| observe_sentinel(&controller, &slot, &elements, config.sentinel_root_margin_px));
    if let Err(e) = wired {
        controller.teardown();
        return Err(e);
    }

    controller.mount(elements.container.client_height() as f64, filters);
    Ok(controller)
}
