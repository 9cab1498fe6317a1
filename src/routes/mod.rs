use dioxus::prelude::*;

pub mod transactions;

use transactions::{AccountTransactions, Transactions};

/// App routes
#[derive(Clone, Routable, Debug, PartialEq)]
#[rustfmt::skip]
pub enum Route {
    #[layout(Layout)]
        #[route("/")]
        Transactions {},

        #[route("/accounts/:account_id")]
        AccountTransactions { account_id: String },
}

#[component]
fn Layout() -> Element {
    rsx! {
        div {
            class: "min-h-screen bg-background transition-colors",
            Outlet::<Route> {}
        }
    }
}
