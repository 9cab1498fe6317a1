use dioxus::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use crate::virtual_list::{Filters, ListController, ListStatus, RecordSource, RowNode};

/// Operations the list UI invokes on a mounted list, independent of the
/// node type the list was mounted with.
pub trait ListHandle {
    fn retry(&self);
    fn dismiss_error(&self);
    fn toggle_window_mode(&self);
    fn set_filters(&self, filters: Filters);
    fn teardown(&self);
}

impl<N: RowNode + 'static> ListHandle for ListController<N> {
    fn retry(&self) {
        ListController::retry(self);
    }

    fn dismiss_error(&self) {
        ListController::dismiss_error(self);
    }

    fn toggle_window_mode(&self) {
        ListController::toggle_window_mode(self);
    }

    fn set_filters(&self, filters: Filters) {
        ListController::set_filters(self, filters);
    }

    fn teardown(&self) {
        ListController::teardown(self);
    }
}

type HandleSlot = Rc<RefCell<Option<Rc<dyn ListHandle>>>>;

/// A virtual list mounted into three elements the caller renders with the
/// returned ids: a scroll container, a spacer inside it, and a sentinel
/// inside the spacer.
#[derive(Clone)]
pub struct UseVirtualList {
    pub container_id: String,
    pub spacer_id: String,
    pub sentinel_id: String,
    pub status: Signal<ListStatus>,
    handle: HandleSlot,
}

impl UseVirtualList {
    fn with_handle(&self, f: impl FnOnce(&dyn ListHandle)) {
        let handle = self.handle.borrow().clone();
        match handle {
            Some(handle) => f(handle.as_ref()),
            None => log::debug!("Virtual list not mounted yet"),
        }
    }

    pub fn retry(&self) {
        self.with_handle(|list| list.retry());
    }

    pub fn dismiss_error(&self) {
        self.with_handle(|list| list.dismiss_error());
    }

    pub fn toggle_window_mode(&self) {
        self.with_handle(|list| list.toggle_window_mode());
    }
}

/// Mounts a windowed, incrementally loaded list once the DOM is ready.
///
/// `source` and `context` are captured on first render. Changes to `filters`
/// reload the list from the top. The list is torn down when the component
/// unmounts.
///
/// # Example
/// ```
/// let list = use_virtual_list(source, context, filters);
///
/// // In your rsx:
/// div { id: "{list.container_id}",
///     div { id: "{list.spacer_id}",
///         div { id: "{list.sentinel_id}" }
///     }
/// }
/// ```
pub fn use_virtual_list(
    source: Rc<dyn RecordSource>,
    context: String,
    filters: Memo<Filters>,
) -> UseVirtualList {
    let ids = use_hook(|| {
        let id = uuid::Uuid::new_v4();
        (
            format!("vlist-container-{}", id),
            format!("vlist-spacer-{}", id),
            format!("vlist-sentinel-{}", id),
        )
    });
    let status = use_signal(ListStatus::default);
    let handle: HandleSlot = use_hook(|| Rc::new(RefCell::new(None)));

    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    let mount_args = use_hook(|| Rc::new(RefCell::new(Some((source, context)))));

    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    let ids_for_mount = ids.clone();
    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    let handle_for_mount = handle.clone();

    // Runs once: nothing reactive is read here
    use_effect(move || {
        #[cfg(target_arch = "wasm32")]
        {
            use crate::virtual_list::web::{mount_list, DomListElements};
            use crate::virtual_list::VirtualListConfig;

            let Some((source, context)) = mount_args.borrow_mut().take() else {
                return;
            };
            let (container_id, spacer_id, sentinel_id) = ids_for_mount.clone();
            let slot = handle_for_mount.clone();

            spawn(async move {
                // Wait for the elements to be in the DOM
                gloo_timers::future::TimeoutFuture::new(0).await;

                let document = match web_sys::window().and_then(|w| w.document()) {
                    Some(d) => d,
                    None => {
                        log::warn!("Failed to get document for virtual list");
                        return;
                    }
                };

                let elements = match DomListElements::find(&document, &container_id, &spacer_id, &sentinel_id) {
                    Ok(elements) => elements,
                    Err(e) => {
                        log::error!("Virtual list elements missing: {}", e);
                        return;
                    }
                };

                let initial_filters = filters.peek().clone();
                match mount_list(
                    elements,
                    source,
                    &context,
                    VirtualListConfig::default(),
                    initial_filters,
                    move |next| {
                        let mut status = status;
                        status.set(next);
                    },
                ) {
                    Ok(controller) => {
                        *slot.borrow_mut() = Some(Rc::new(controller));
                    }
                    Err(e) => log::error!("Failed to mount virtual list: {}", e),
                }
            });
        }
    });

    // Reload from the top when the filters change after mount
    let handle_for_filters = handle.clone();
    let mut mounted_filters = use_signal(|| None::<Filters>);
    use_effect(move || {
        let next = filters();
        let previous = mounted_filters.peek().clone();
        mounted_filters.set(Some(next.clone()));

        if previous.is_none() || previous.as_ref() == Some(&next) {
            return;
        }

        let list = handle_for_filters.borrow().clone();
        if let Some(list) = list {
            log::info!("Transaction filters changed, reloading list");
            list.set_filters(next);
        }
    });

    let handle_for_drop = handle.clone();
    use_drop(move || {
        if let Some(list) = handle_for_drop.borrow_mut().take() {
            list.teardown();
        }
    });

    let (container_id, spacer_id, sentinel_id) = ids;
    UseVirtualList {
        container_id,
        spacer_id,
        sentinel_id,
        status,
        handle,
    }
}
