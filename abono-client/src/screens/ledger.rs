//! Purchase ledger: one purchase, its payments, and payment entry.

use crate::mutations::{Api, CreatePayment, UpdatePurchase};
use crate::queries;
use abono_core::validation::{PaymentForm, PurchaseForm};
use abono_core::{ApiResult, Payment, PaymentMethod, Purchase, PurchaseId, ValidationErrors};
use abono_sync::{MutationDispatcher, QueryBinder, QueryView};

pub struct PurchaseLedger {
    dispatcher: MutationDispatcher<Api>,
    purchase_id: PurchaseId,
    purchase: QueryBinder<Purchase>,
    payments: QueryBinder<Vec<Payment>>,
    methods: QueryBinder<Vec<PaymentMethod>>,
}

impl PurchaseLedger {
    pub fn open(dispatcher: MutationDispatcher<Api>, purchase_id: PurchaseId) -> Self {
        let store = dispatcher.store().clone();
        let api = dispatcher.context().clone();
        Self {
            purchase: QueryBinder::mount(store.clone(), queries::purchase(&api, purchase_id)),
            payments: QueryBinder::mount(store.clone(), queries::payments(&api, purchase_id)),
            methods: QueryBinder::mount(store, queries::payment_methods(&api)),
            dispatcher,
            purchase_id,
        }
    }

    pub fn purchase_id(&self) -> PurchaseId {
        self.purchase_id
    }

    pub fn purchase(&self) -> QueryView<Purchase> {
        self.purchase.view()
    }

    pub fn payments(&self) -> QueryView<Vec<Payment>> {
        self.payments.view()
    }

    pub fn methods(&self) -> QueryView<Vec<PaymentMethod>> {
        self.methods.view()
    }

    /// Wait until purchase, payments and methods have all resolved.
    pub async fn settled(&mut self) {
        self.purchase.settled().await;
        self.payments.settled().await;
        self.methods.settled().await;
    }

    /// Register a payment, validated against the balance currently shown.
    ///
    /// On success the purchase, its payments and every purchase list are
    /// refreshed before this returns.
    pub async fn pay(&self, form: &PaymentForm) -> ApiResult<Payment> {
        let purchase = self.loaded_purchase()?;
        if !purchase.status.accepts_payments() {
            let mut errors = ValidationErrors::new();
            errors.push("purchase", "purchase does not accept payments");
            return Err(errors.into());
        }
        let mutation =
            CreatePayment::from_form(self.purchase_id, purchase.remaining_amount, form)?;
        self.dispatcher.mutate(mutation).await
    }

    /// Edit description and total.
    pub async fn edit(&self, form: &PurchaseForm) -> ApiResult<Purchase> {
        let purchase = self.loaded_purchase()?;
        let mutation = UpdatePurchase::from_form(self.purchase_id, purchase.customer_id, form)?;
        self.dispatcher.mutate(mutation).await
    }

    fn loaded_purchase(&self) -> Result<Purchase, ValidationErrors> {
        match self.purchase.view().data() {
            Some(purchase) => Ok(purchase.clone()),
            None => {
                let mut errors = ValidationErrors::new();
                errors.push("purchase", "purchase is not loaded yet");
                Err(errors)
            }
        }
    }
}
