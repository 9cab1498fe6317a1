use dioxus::prelude::*;

use crate::components::TransactionList;

#[component]
pub fn Transactions() -> Element {
    rsx! {
        TransactionsPage { account_id: String::new() }
    }
}

#[component]
pub fn AccountTransactions(account_id: String) -> Element {
    rsx! {
        TransactionsPage { account_id }
    }
}

#[component]
fn TransactionsPage(account_id: String) -> Element {
    rsx! {
        div {
            class: "max-w-4xl mx-auto h-screen flex flex-col px-4 py-6",
            // Remount the list when the account changes so each account
            // keeps its own scroll position
            TransactionList { key: "{account_id}", account_id: account_id.clone() }
        }
    }
}
