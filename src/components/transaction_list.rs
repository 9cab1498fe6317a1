use dioxus::prelude::*;
use std::rc::Rc;

use crate::hooks::use_virtual_list;
use crate::services::transactions_api::HttpRecordSource;
use crate::stores::transactions_store::{self, DirectionFilter, TRANSACTION_FILTERS};
use crate::utils::format::{format_count_compact, format_with_separator};
use crate::virtual_list::geometry::{COMPACT_ROW_HEIGHT, EXPANDED_ROW_HEIGHT};
use crate::virtual_list::{ListStatus, RecordSource, WindowMode};

/// Row styles for the imperatively managed row elements
fn row_css() -> String {
    format!(
        ".tx-row {{ display: flex; align-items: center; gap: 1rem; padding: 0 1rem; box-sizing: border-box; border-bottom: 1px solid var(--border, #e5e7eb); }} \
         .tx-list--compact .tx-row {{ height: {}px; font-size: 0.875rem; }} \
         .tx-list--expanded .tx-row {{ height: {}px; }} \
         .tx-row--pending {{ opacity: 0.7; font-style: italic; }} \
         .tx-row__date {{ width: 7rem; flex-shrink: 0; }} \
         .tx-row__description {{ flex: 1; min-width: 0; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }} \
         .tx-row__category {{ width: 8rem; flex-shrink: 0; opacity: 0.7; }} \
         .tx-row__amount {{ width: 8rem; flex-shrink: 0; text-align: right; font-variant-numeric: tabular-nums; }} \
         .tx-row__amount--credit {{ color: #16a34a; }}",
        COMPACT_ROW_HEIGHT, EXPANDED_ROW_HEIGHT
    )
}

/// Summary line above the list (e.g., "1,250 of 48,200 loaded")
fn loaded_summary(status: &ListStatus) -> String {
    if status.total_count == 0 {
        return if status.loading {
            "Loading transactions...".to_string()
        } else {
            "No transactions".to_string()
        };
    }
    if status.loaded_count >= status.total_count {
        return format!("{} transactions", format_with_separator(status.total_count as u64));
    }
    format!(
        "{} of {} loaded",
        format_with_separator(status.loaded_count as u64),
        format_with_separator(status.total_count as u64)
    )
}

fn mode_label(mode: WindowMode) -> &'static str {
    match mode {
        WindowMode::Compact => "Comfortable rows",
        WindowMode::Expanded => "Compact rows",
    }
}

/// Windowed transaction list for one account.
///
/// Rows are DOM nodes owned by the virtual list and are never rendered
/// through the component tree; only the chrome around them is.
#[component]
pub fn TransactionList(account_id: String) -> Element {
    let source = use_hook(|| HttpRecordSource::new(&account_id));
    let filters = use_memo(move || TRANSACTION_FILTERS.read().to_filters());
    let list = use_virtual_list(
        Rc::new(source.clone()) as Rc<dyn RecordSource>,
        source.list_context(),
        filters,
    );

    let status = list.status.read().clone();
    let active_filters = TRANSACTION_FILTERS.read().clone();
    let mode_class = format!("tx-list--{}", status.window_mode.as_str());
    let summary = loaded_summary(&status);

    let list_for_retry = list.clone();
    let list_for_dismiss = list.clone();
    let list_for_mode = list.clone();

    rsx! {
        style { {row_css()} }
        div {
            class: "flex flex-col h-full bg-card border border-border rounded-lg overflow-hidden",

            // Toolbar: filter chips and window mode toggle
            div {
                class: "flex items-center justify-between gap-2 px-4 py-3 border-b border-border",
                div {
                    class: "flex items-center gap-2",
                    h2 {
                        class: "font-semibold mr-2",
                        "Transactions"
                        if status.total_count > 0 {
                            span {
                                class: "ml-2 px-2 py-0.5 rounded-full bg-accent text-xs text-muted-foreground",
                                "{format_count_compact(status.total_count)}"
                            }
                        }
                    }
                    for direction in DirectionFilter::ALL {
                        {
                            let selected = active_filters.direction == direction;
                            let chip_class = if selected {
                                "bg-blue-500 text-white"
                            } else {
                                "bg-accent text-foreground hover:bg-accent/70"
                            };
                            rsx! {
                                button {
                                    key: "{direction.label()}",
                                    class: "px-3 py-1 rounded-full text-sm transition {chip_class}",
                                    onclick: move |_| transactions_store::set_direction_filter(direction),
                                    "{direction.label()}"
                                }
                            }
                        }
                    }
                    button {
                        class: if active_filters.pending_only {
                            "px-3 py-1 rounded-full text-sm transition bg-blue-500 text-white"
                        } else {
                            "px-3 py-1 rounded-full text-sm transition bg-accent text-foreground hover:bg-accent/70"
                        },
                        onclick: move |_| transactions_store::toggle_pending_only(),
                        "Pending"
                    }
                }
                button {
                    class: "text-sm text-muted-foreground hover:text-foreground transition",
                    onclick: move |_| list_for_mode.toggle_window_mode(),
                    "{mode_label(status.window_mode)}"
                }
            }

            div {
                class: "flex items-center justify-between px-4 py-2 text-xs text-muted-foreground",
                span { "{summary}" }
                if status.retrying {
                    span { "Connection problem, retrying..." }
                } else if status.loading {
                    span { "Loading..." }
                }
            }

            // Terminal load failure: rows already shown stay visible
            if let Some(error) = status.error.as_ref() {
                div {
                    class: "flex items-center justify-between gap-3 mx-4 mb-2 px-3 py-2 rounded-lg bg-red-500/10 text-red-600 text-sm",
                    role: "alert",
                    span { "{error.user_message()}" }
                    div {
                        class: "flex items-center gap-2 flex-shrink-0",
                        button {
                            class: "px-3 py-1 rounded bg-red-500 text-white hover:bg-red-600 transition",
                            onclick: move |_| list_for_retry.retry(),
                            "Retry"
                        }
                        button {
                            class: "px-2 py-1 rounded hover:bg-red-500/20 transition",
                            aria_label: "Dismiss",
                            onclick: move |_| list_for_dismiss.dismiss_error(),
                            "✕"
                        }
                    }
                }
            }

            div {
                class: "relative flex-1 min-h-0",

                if status.restored_indicator {
                    div {
                        class: "absolute top-2 left-1/2 -translate-x-1/2 z-10 px-3 py-1 rounded-full bg-foreground text-background text-xs shadow",
                        "Scroll position restored"
                    }
                }

                // Scroll container; rows are positioned inside the spacer
                div {
                    id: "{list.container_id}",
                    class: "tx-list {mode_class} h-full overflow-y-auto",
                    style: "position: relative; contain: strict;",
                    div {
                        id: "{list.spacer_id}",
                        style: "position: relative; width: 100%;",
                        div {
                            id: "{list.sentinel_id}",
                            style: "position: absolute; left: 0; height: 1px; width: 100%;",
                        }
                    }
                }
            }

            if !status.has_more && status.total_count > 0 && !status.loading {
                div {
                    class: "px-4 py-2 text-center text-xs text-muted-foreground border-t border-border",
                    "End of transactions"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_summary() {
        let mut status = ListStatus {
            loading: true,
            ..Default::default()
        };
        assert_eq!(loaded_summary(&status), "Loading transactions...");

        status.loading = false;
        status.total_count = 48_200;
        status.loaded_count = 1_250;
        assert_eq!(loaded_summary(&status), "1,250 of 48,200 loaded");

        status.loaded_count = 48_200;
        assert_eq!(loaded_summary(&status), "48,200 transactions");
    }

    #[test]
    fn test_mode_label_names_the_other_mode() {
        assert_eq!(mode_label(WindowMode::Expanded), "Compact rows");
        assert_eq!(mode_label(WindowMode::Compact), "Comfortable rows");
    }
}
