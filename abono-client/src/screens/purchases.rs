//! Purchase board: every purchase, paginated, filtered by description.

use crate::mutations::Api;
use crate::queries;
use crate::screens::observe_page;
use abono_core::{CustomerId, Page, Purchase, PurchaseListParams, PurchaseStatus};
use abono_sync::{DebounceGate, MutationDispatcher, PagedList, QueryBinder, QueryView};
use tokio::sync::mpsc;

pub const BOARD_PAGE_SIZE: u32 = 9;

/// Everything that narrows the board. Any change returns to page 0.
///
/// `description` is applied locally to the loaded page; the other fields
/// are sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub description: String,
    pub customer_id: Option<CustomerId>,
    pub status: Option<PurchaseStatus>,
}

pub struct PurchaseBoard {
    dispatcher: MutationDispatcher<Api>,
    list: PagedList<BoardFilter>,
    binder: QueryBinder<Page<Purchase>>,
    search: DebounceGate<String>,
    searches: mpsc::UnboundedReceiver<String>,
}

impl PurchaseBoard {
    pub fn open(dispatcher: MutationDispatcher<Api>) -> Self {
        let store = dispatcher.store().clone();
        let list = PagedList::new(BoardFilter::default(), BOARD_PAGE_SIZE);
        let spec = queries::purchases(dispatcher.context(), list_params(&list));
        let binder = QueryBinder::mount(store.clone(), spec);
        let (search, searches) = DebounceGate::channel(store.config().debounce_delay);
        Self {
            dispatcher,
            list,
            binder,
            search,
            searches,
        }
    }

    pub fn filter(&self) -> &BoardFilter {
        self.list.filter()
    }

    pub fn page(&self) -> u32 {
        self.list.cursor().page()
    }

    pub fn type_search(&mut self, text: &str) {
        self.search.schedule(text.to_string());
    }

    /// Wait for the next debounced description and apply it.
    pub async fn apply_search(&mut self) -> bool {
        match self.searches.recv().await {
            Some(description) => self.set_filter(BoardFilter {
                description,
                ..self.list.filter().clone()
            }),
            None => false,
        }
    }

    pub fn set_status(&mut self, status: Option<PurchaseStatus>) -> bool {
        self.set_filter(BoardFilter {
            status,
            ..self.list.filter().clone()
        })
    }

    pub fn set_customer(&mut self, customer_id: Option<CustomerId>) -> bool {
        self.set_filter(BoardFilter {
            customer_id,
            ..self.list.filter().clone()
        })
    }

    /// Replace the whole filter. Returns whether it changed.
    pub fn set_filter(&mut self, filter: BoardFilter) -> bool {
        if !self.list.set_filter(filter) {
            return false;
        }
        self.rebind();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.sync_cursor();
        let moved = self.list.cursor_mut().next();
        if moved {
            self.rebind();
        }
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        let moved = self.list.cursor_mut().prev();
        if moved {
            self.rebind();
        }
        moved
    }

    pub fn view(&mut self) -> QueryView<Page<Purchase>> {
        self.sync_cursor()
    }

    pub async fn settled(&mut self) -> QueryView<Page<Purchase>> {
        self.binder.settled().await;
        self.sync_cursor()
    }

    /// Purchases of the loaded page whose description contains the search
    /// text, ignoring case.
    pub fn visible(&self) -> Vec<Purchase> {
        let view = self.binder.view();
        let needle = self.list.filter().description.to_lowercase();
        view.data()
            .map(|page| {
                page.content
                    .iter()
                    .filter(|p| p.description.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn sync_cursor(&mut self) -> QueryView<Page<Purchase>> {
        let view = self.binder.view();
        observe_page(self.list.cursor_mut(), &view);
        view
    }

    fn rebind(&mut self) {
        let spec = queries::purchases(self.dispatcher.context(), list_params(&self.list));
        self.binder.set_query(spec);
    }
}

fn list_params(list: &PagedList<BoardFilter>) -> PurchaseListParams {
    let filter = list.filter();
    PurchaseListParams {
        customer_id: filter.customer_id,
        status: filter.status,
        page: list.cursor().page(),
        size: list.cursor().size(),
        ..PurchaseListParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abono_sync::CacheStore;
    use abono_test_utils::{fixtures, Endpoint, InMemoryConsole};
    use std::sync::Arc;
    use std::time::Duration;

    fn board(console: &Arc<InMemoryConsole>) -> PurchaseBoard {
        let api: Arc<Api> = console.clone();
        PurchaseBoard::open(MutationDispatcher::new(api, CacheStore::default()))
    }

    fn descriptions(purchases: &[Purchase]) -> Vec<&str> {
        purchases.iter().map(|p| p.description.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn description_filter_stays_local() {
        let console = Arc::new(fixtures::seeded_console());
        let mut board = board(&console);
        board.settled().await;
        assert_eq!(board.visible().len(), 5);

        board.type_search("LAVA");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(board.visible().len(), 5);
        assert!(board.apply_search().await);

        board.settled().await;
        assert_eq!(descriptions(&board.visible()), vec!["Lavadora"]);
        assert_eq!(console.calls(Endpoint::ListPurchases), 1);
    }

    #[tokio::test]
    async fn server_filters_rebind_the_list() {
        let console = Arc::new(fixtures::seeded_console());
        let mut board = board(&console);
        board.settled().await;

        assert!(board.set_status(Some(PurchaseStatus::Pagado)));
        assert!(!board.set_status(Some(PurchaseStatus::Pagado)));
        board.settled().await;
        assert_eq!(descriptions(&board.visible()), vec!["Lámpara"]);

        assert!(board.set_customer(Some(CustomerId::new(3))));
        board.settled().await;
        assert!(board.visible().is_empty());
        assert_eq!(board.page(), 0);
        assert_eq!(console.calls(Endpoint::ListPurchases), 3);
    }

    #[tokio::test]
    async fn next_is_disabled_on_the_last_page() {
        let console = Arc::new(fixtures::seeded_console());
        let mut board = board(&console);
        board.settled().await;
        assert!(!board.next_page());
        assert!(!board.prev_page());
    }
}
