//! Headless screen models.
//!
//! Each screen composes queries, pagination, debouncing and mutations the
//! way one console page does, without knowing how it is rendered. Screens
//! must be created inside a Tokio runtime.

pub mod customers;
pub mod ledger;
pub mod planner;
pub mod purchases;

pub use customers::{CustomerDirectory, CustomerProfile};
pub use ledger::PurchaseLedger;
pub use planner::InstallmentPlanner;
pub use purchases::{BoardFilter, PurchaseBoard};

use abono_core::Page;
use abono_sync::{PageCursor, QueryView};

/// Feed a resolved page of the bound identity into its cursor. Placeholder
/// data belongs to another page and is ignored.
pub(crate) fn observe_page<T>(cursor: &mut PageCursor, view: &QueryView<Page<T>>) {
    if view.is_placeholder {
        return;
    }
    if let Some(page) = view.data() {
        cursor.observe(page);
    }
}
