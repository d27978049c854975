//! Customer directory and customer profile.

use crate::mutations::{Api, DeleteCustomer, UpdateCustomer};
use crate::queries;
use crate::screens::observe_page;
use abono_core::validation::CustomerForm;
use abono_core::{
    ApiResult, Customer, CustomerId, CustomerListParams, CustomerPurchasesParams, Page, Purchase,
};
use abono_sync::{DebounceGate, MutationDispatcher, PagedList, QueryBinder, QueryView};
use tokio::sync::mpsc;

pub const DIRECTORY_PAGE_SIZE: u32 = 9;
pub const PROFILE_PAGE_SIZE: u32 = 5;

/// Searchable, paginated list of customers.
///
/// Keystrokes go through a debounce gate; a settled search term resets the
/// page to 0 and rebinds the list.
pub struct CustomerDirectory {
    dispatcher: MutationDispatcher<Api>,
    list: PagedList<String>,
    binder: QueryBinder<Page<Customer>>,
    search: DebounceGate<String>,
    searches: mpsc::UnboundedReceiver<String>,
}

impl CustomerDirectory {
    pub fn open(dispatcher: MutationDispatcher<Api>) -> Self {
        let store = dispatcher.store().clone();
        let list = PagedList::new(String::new(), DIRECTORY_PAGE_SIZE);
        let spec = queries::customers(dispatcher.context(), list_params(&list));
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

    /// Record a keystroke. Nothing is fetched until typing pauses.
    pub fn type_search(&mut self, text: &str) {
        self.search.schedule(text.to_string());
    }

    /// Wait for the next debounced search term and apply it.
    pub async fn apply_search(&mut self) -> bool {
        match self.searches.recv().await {
            Some(term) => self.search_now(term),
            None => false,
        }
    }

    /// Apply a search term immediately. Returns whether the list changed.
    pub fn search_now(&mut self, term: String) -> bool {
        if !self.list.set_filter(term) {
            return false;
        }
        self.rebind();
        true
    }

    pub fn search_term(&self) -> &str {
        self.list.filter()
    }

    pub fn page(&self) -> u32 {
        self.list.cursor().page()
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

    pub fn view(&mut self) -> QueryView<Page<Customer>> {
        self.sync_cursor()
    }

    pub async fn settled(&mut self) -> QueryView<Page<Customer>> {
        self.binder.settled().await;
        self.sync_cursor()
    }

    pub async fn update(&self, id: CustomerId, form: &CustomerForm) -> ApiResult<Customer> {
        let mutation = UpdateCustomer::from_form(id, form)?;
        self.dispatcher.mutate(mutation).await
    }

    pub async fn delete(&self, id: CustomerId) -> ApiResult<()> {
        self.dispatcher
            .mutate(DeleteCustomer { customer_id: id })
            .await
    }

    fn sync_cursor(&mut self) -> QueryView<Page<Customer>> {
        let view = self.binder.view();
        observe_page(self.list.cursor_mut(), &view);
        view
    }

    fn rebind(&mut self) {
        let spec = queries::customers(self.dispatcher.context(), list_params(&self.list));
        self.binder.set_query(spec);
    }
}

fn list_params(list: &PagedList<String>) -> CustomerListParams {
    CustomerListParams {
        q: list.filter().clone(),
        page: list.cursor().page(),
        size: list.cursor().size(),
        ..CustomerListParams::default()
    }
}

/// One customer with their purchase history.
pub struct CustomerProfile {
    dispatcher: MutationDispatcher<Api>,
    customer_id: CustomerId,
    customer: QueryBinder<Customer>,
    purchases: QueryBinder<Page<Purchase>>,
    list: PagedList<()>,
}

impl CustomerProfile {
    pub fn open(dispatcher: MutationDispatcher<Api>, customer_id: CustomerId) -> Self {
        let store = dispatcher.store().clone();
        let list = PagedList::new((), PROFILE_PAGE_SIZE);
        let customer = QueryBinder::mount(
            store.clone(),
            queries::customer(dispatcher.context(), customer_id),
        );
        let purchases = QueryBinder::mount(
            store,
            queries::customer_purchases(
                dispatcher.context(),
                Some(customer_id),
                purchase_params(&list),
            ),
        );
        Self {
            dispatcher,
            customer_id,
            customer,
            purchases,
            list,
        }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn customer(&self) -> QueryView<Customer> {
        self.customer.view()
    }

    pub fn purchases(&mut self) -> QueryView<Page<Purchase>> {
        let view = self.purchases.view();
        observe_page(self.list.cursor_mut(), &view);
        view
    }

    pub fn page(&self) -> u32 {
        self.list.cursor().page()
    }

    pub async fn settled(&mut self) -> (QueryView<Customer>, QueryView<Page<Purchase>>) {
        let customer = self.customer.settled().await;
        self.purchases.settled().await;
        (customer, self.purchases())
    }

    pub fn next_page(&mut self) -> bool {
        self.purchases();
        let moved = self.list.cursor_mut().next();
        if moved {
            self.rebind_purchases();
        }
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        let moved = self.list.cursor_mut().prev();
        if moved {
            self.rebind_purchases();
        }
        moved
    }

    /// Seed an edit form from the loaded customer.
    pub fn edit_form(&self) -> Option<CustomerForm> {
        self.customer.view().data().map(|customer| CustomerForm {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            notes: customer.notes.clone().unwrap_or_default(),
        })
    }

    pub async fn save(&self, form: &CustomerForm) -> ApiResult<Customer> {
        let mutation = UpdateCustomer::from_form(self.customer_id, form)?;
        self.dispatcher.mutate(mutation).await
    }

    pub async fn delete(&self) -> ApiResult<()> {
        self.dispatcher
            .mutate(DeleteCustomer {
                customer_id: self.customer_id,
            })
            .await
    }

    fn rebind_purchases(&mut self) {
        let spec = queries::customer_purchases(
            self.dispatcher.context(),
            Some(self.customer_id),
            purchase_params(&self.list),
        );
        self.purchases.set_query(spec);
    }
}

fn purchase_params(list: &PagedList<()>) -> CustomerPurchasesParams {
    CustomerPurchasesParams {
        page: list.cursor().page(),
        size: list.cursor().size(),
        ..CustomerPurchasesParams::default()
    }
}
