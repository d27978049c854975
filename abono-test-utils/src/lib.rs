//! Abono Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - An in-memory console server implementing [`ConsoleApi`]
//! - Proptest generators for entities and amounts
//! - Seeded fixtures for the common console scenarios
//! - Assertions over [`ApiResult`] values

pub use abono_core::{
    ApiError, ApiResult, ConsoleApi, Customer, CustomerCreateRequest, CustomerId,
    CustomerListParams, CustomerPurchasesParams, CustomerUpdateRequest, InstallmentSimulation,
    InstallmentSimulationRequest, Page, Payment, PaymentCreateRequest, PaymentId, PaymentMethod,
    Purchase, PurchaseCreateRequest, PurchaseId, PurchaseListParams, PurchaseStatus,
    PurchaseUpdateRequest,
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Round to cents the way the server does.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// IN-MEMORY CONSOLE SERVER
// ============================================================================

/// One remote endpoint, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListCustomers,
    GetCustomer,
    CreateCustomer,
    UpdateCustomer,
    DeleteCustomer,
    ListCustomerPurchases,
    ListPurchases,
    GetPurchase,
    CreatePurchase,
    UpdatePurchase,
    SimulateInstallments,
    ListPayments,
    CreatePayment,
    ListPaymentMethods,
}

#[derive(Debug, Default)]
struct ConsoleState {
    customers: BTreeMap<CustomerId, Customer>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    payments: Vec<Payment>,
    next_customer: i64,
    next_purchase: i64,
    next_payment: i64,
    calls: HashMap<Endpoint, usize>,
    failures: HashMap<Endpoint, ApiError>,
}

/// Fake console API with the server's balance rules.
///
/// Every call yields to the scheduler (or sleeps for the configured latency)
/// before touching state, so concurrent callers genuinely overlap.
#[derive(Debug, Default)]
pub struct InMemoryConsole {
    state: Mutex<ConsoleState>,
    latency: Option<Duration>,
}

impl InMemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, endpoint: Endpoint) -> ApiResult<()> {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        let mut state = self.lock();
        *state.calls.entry(endpoint).or_default() += 1;
        match state.failures.remove(&endpoint) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Number of calls received on `endpoint`.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next call on `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.lock().failures.insert(endpoint, error);
    }

    pub fn insert_customer(&self, customer: Customer) {
        let mut state = self.lock();
        state.next_customer = state.next_customer.max(customer.id.get());
        state.customers.insert(customer.id, customer);
    }

    pub fn insert_purchase(&self, purchase: Purchase) {
        let mut state = self.lock();
        state.next_purchase = state.next_purchase.max(purchase.id.get());
        state.purchases.insert(purchase.id, purchase);
    }

    pub fn insert_payment(&self, payment: Payment) {
        let mut state = self.lock();
        state.next_payment = state.next_payment.max(payment.id.get());
        state.payments.push(payment);
    }

    pub fn purchase(&self, id: PurchaseId) -> Option<Purchase> {
        self.lock().purchases.get(&id).cloned()
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.lock().customers.get(&id).cloned()
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::server(404, format!("{} not found", what))
}

fn created_at(id: i64) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|day| day.and_hms_opt(9, 0, 0))
        .map(|start| start + chrono::Duration::hours(id))
}

fn sort_purchases(purchases: &mut [Purchase], sort: &str) {
    match sort {
        "createdAt" => purchases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
        "totalAmount" => purchases.sort_by(|a, b| a.total_amount.total_cmp(&b.total_amount)),
        _ => purchases.sort_by_key(|p| p.id),
    }
}

fn settle(purchase: &mut Purchase) {
    purchase.remaining_amount = round_cents(purchase.total_amount - purchase.paid_amount);
    if purchase.remaining_amount <= 0.0 {
        purchase.remaining_amount = 0.0;
        purchase.status = PurchaseStatus::Pagado;
    } else if purchase.status == PurchaseStatus::Pagado {
        purchase.status = PurchaseStatus::Activo;
    }
}

#[async_trait]
impl ConsoleApi for InMemoryConsole {
    async fn list_customers(&self, params: &CustomerListParams) -> ApiResult<Page<Customer>> {
        self.enter(Endpoint::ListCustomers).await?;
        let state = self.lock();
        let needle = params.q.trim().to_lowercase();
        let mut matches: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| {
                needle.is_empty()
                    || c.name.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
                    || c.phone.contains(&needle)
            })
            .cloned()
            .collect();
        if params.sort == "name" {
            matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        }
        Ok(Page::slice(&matches, params.page, params.size))
    }

    async fn get_customer(&self, id: CustomerId) -> ApiResult<Customer> {
        self.enter(Endpoint::GetCustomer).await?;
        self.customer(id).ok_or_else(|| not_found("Customer"))
    }

    async fn create_customer(&self, request: &CustomerCreateRequest) -> ApiResult<Customer> {
        self.enter(Endpoint::CreateCustomer).await?;
        let mut state = self.lock();
        state.next_customer += 1;
        let customer = Customer {
            id: CustomerId::new(state.next_customer),
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            notes: (!request.notes.is_empty()).then(|| request.notes.clone()),
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        request: &CustomerUpdateRequest,
    ) -> ApiResult<Customer> {
        self.enter(Endpoint::UpdateCustomer).await?;
        let mut state = self.lock();
        let customer = state
            .customers
            .get_mut(&id)
            .ok_or_else(|| not_found("Customer"))?;
        customer.name = request.name.clone();
        customer.email = request.email.clone();
        customer.phone = request.phone.clone();
        customer.notes = (!request.notes.is_empty()).then(|| request.notes.clone());
        let updated = customer.clone();

        for purchase in state.purchases.values_mut().filter(|p| p.customer_id == id) {
            purchase.customer_name = updated.name.clone();
        }
        Ok(updated)
    }

    async fn delete_customer(&self, id: CustomerId) -> ApiResult<()> {
        self.enter(Endpoint::DeleteCustomer).await?;
        let mut state = self.lock();
        state
            .customers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Customer"))
    }

    async fn list_customer_purchases(
        &self,
        customer_id: CustomerId,
        params: &CustomerPurchasesParams,
    ) -> ApiResult<Page<Purchase>> {
        self.enter(Endpoint::ListCustomerPurchases).await?;
        let state = self.lock();
        if !state.customers.contains_key(&customer_id) {
            return Err(not_found("Customer"));
        }
        let mut purchases: Vec<Purchase> = state
            .purchases
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        sort_purchases(&mut purchases, &params.sort);
        Ok(Page::slice(&purchases, params.page, params.size))
    }

    async fn list_purchases(&self, params: &PurchaseListParams) -> ApiResult<Page<Purchase>> {
        self.enter(Endpoint::ListPurchases).await?;
        let state = self.lock();
        let mut purchases: Vec<Purchase> = state
            .purchases
            .values()
            .filter(|p| params.customer_id.map_or(true, |id| p.customer_id == id))
            .filter(|p| params.status.map_or(true, |status| p.status == status))
            .cloned()
            .collect();
        sort_purchases(&mut purchases, &params.sort);
        Ok(Page::slice(&purchases, params.page, params.size))
    }

    async fn get_purchase(&self, id: PurchaseId) -> ApiResult<Purchase> {
        self.enter(Endpoint::GetPurchase).await?;
        self.purchase(id).ok_or_else(|| not_found("Purchase"))
    }

    async fn create_purchase(&self, request: &PurchaseCreateRequest) -> ApiResult<Purchase> {
        self.enter(Endpoint::CreatePurchase).await?;
        let mut state = self.lock();
        let customer_name = state
            .customers
            .get(&request.customer_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| not_found("Customer"))?;
        if request.total_amount <= 0.0 {
            return Err(ApiError::server(400, "Total amount must be greater than 0"));
        }
        let installment_count = if request.installment_enabled {
            match request.installment_count {
                Some(count) if count > 0 => Some(count),
                _ => return Err(ApiError::server(400, "Installment count must be greater than 0")),
            }
        } else {
            None
        };

        state.next_purchase += 1;
        let id = state.next_purchase;
        let purchase = Purchase {
            id: PurchaseId::new(id),
            customer_id: request.customer_id,
            customer_name,
            description: request.description.clone(),
            total_amount: request.total_amount,
            paid_amount: 0.0,
            remaining_amount: request.total_amount,
            status: PurchaseStatus::Activo,
            created_at: created_at(id),
            installment_enabled: request.installment_enabled,
            installment_count,
            installment_amount: installment_count
                .map(|count| round_cents(request.total_amount / f64::from(count))),
        };
        state.purchases.insert(purchase.id, purchase.clone());
        Ok(purchase)
    }

    async fn update_purchase(
        &self,
        id: PurchaseId,
        request: &PurchaseUpdateRequest,
    ) -> ApiResult<Purchase> {
        self.enter(Endpoint::UpdatePurchase).await?;
        let mut state = self.lock();
        let purchase = state
            .purchases
            .get_mut(&id)
            .ok_or_else(|| not_found("Purchase"))?;
        if request.total_amount < purchase.paid_amount {
            return Err(ApiError::server(
                400,
                "Total amount cannot be lower than the amount already paid",
            ));
        }
        purchase.description = request.description.clone();
        purchase.total_amount = request.total_amount;
        if let Some(count) = purchase.installment_count {
            purchase.installment_amount = Some(round_cents(request.total_amount / f64::from(count)));
        }
        settle(purchase);
        Ok(purchase.clone())
    }

    async fn simulate_installments(
        &self,
        request: &InstallmentSimulationRequest,
    ) -> ApiResult<InstallmentSimulation> {
        self.enter(Endpoint::SimulateInstallments).await?;
        if request.total_amount <= 0.0 || request.installment_count == 0 {
            return Err(ApiError::server(
                400,
                "Total amount and installment count must be greater than 0",
            ));
        }
        Ok(InstallmentSimulation {
            total_amount: request.total_amount,
            installment_count: request.installment_count,
            installment_amount: round_cents(
                request.total_amount / f64::from(request.installment_count),
            ),
        })
    }

    async fn list_payments(&self, purchase_id: PurchaseId) -> ApiResult<Vec<Payment>> {
        self.enter(Endpoint::ListPayments).await?;
        let state = self.lock();
        if !state.purchases.contains_key(&purchase_id) {
            return Err(not_found("Purchase"));
        }
        Ok(state
            .payments
            .iter()
            .filter(|p| p.purchase_id == purchase_id)
            .cloned()
            .collect())
    }

    async fn create_payment(
        &self,
        purchase_id: PurchaseId,
        request: &PaymentCreateRequest,
    ) -> ApiResult<Payment> {
        self.enter(Endpoint::CreatePayment).await?;
        let mut state = self.lock();
        let purchase = state
            .purchases
            .get_mut(&purchase_id)
            .ok_or_else(|| not_found("Purchase"))?;
        if !purchase.status.accepts_payments() {
            return Err(ApiError::server(409, "Purchase does not accept payments"));
        }
        if request.amount <= 0.0 {
            return Err(ApiError::server(400, "Payment amount must be greater than 0"));
        }
        if request.amount > purchase.remaining_amount + 0.005 {
            return Err(ApiError::server(400, "Payment exceeds remaining amount"));
        }
        purchase.paid_amount = round_cents(purchase.paid_amount + request.amount);
        settle(purchase);

        state.next_payment += 1;
        let payment = Payment {
            id: PaymentId::new(state.next_payment),
            purchase_id,
            amount: request.amount,
            method: request.method,
            paid_at: request.paid_at.or_else(|| created_at(state.next_payment)),
            note: request.note.clone(),
        };
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_payment_methods(&self) -> ApiResult<Vec<PaymentMethod>> {
        self.enter(Endpoint::ListPaymentMethods).await?;
        Ok(PaymentMethod::ALL.to_vec())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for console entities.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_customer_id() -> impl Strategy<Value = CustomerId> {
        (1i64..10_000).prop_map(CustomerId::new)
    }

    pub fn arb_purchase_id() -> impl Strategy<Value = PurchaseId> {
        (1i64..10_000).prop_map(PurchaseId::new)
    }

    pub fn arb_purchase_status() -> impl Strategy<Value = PurchaseStatus> {
        prop_oneof![
            Just(PurchaseStatus::Activo),
            Just(PurchaseStatus::Pagado),
            Just(PurchaseStatus::Cancelado),
        ]
    }

    pub fn arb_payment_method() -> impl Strategy<Value = PaymentMethod> {
        prop_oneof![
            Just(PaymentMethod::Efectivo),
            Just(PaymentMethod::Transferencia),
            Just(PaymentMethod::Otro),
        ]
    }

    /// A positive amount in whole cents.
    pub fn arb_amount() -> impl Strategy<Value = f64> {
        (1u32..10_000_000).prop_map(|cents| f64::from(cents) / 100.0)
    }

    pub fn arb_search_text() -> impl Strategy<Value = String> {
        "[a-zA-Z ]{0,12}"
    }

    pub fn arb_customer() -> impl Strategy<Value = Customer> {
        (
            arb_customer_id(),
            "[A-Z][a-z]{2,10} [A-Z][a-z]{2,10}",
            "[a-z]{3,8}@[a-z]{3,8}\\.(com|mx|org)",
            "[0-9]{3}-[0-9]{4}",
            proptest::option::of("[a-z ]{0,20}"),
        )
            .prop_map(|(id, name, email, phone, notes)| Customer {
                id,
                name,
                email,
                phone,
                notes,
            })
    }

    /// A purchase whose balance fields agree with each other.
    pub fn arb_purchase(customer_id: CustomerId) -> impl Strategy<Value = Purchase> {
        (arb_purchase_id(), "[A-Z][a-z]{3,15}", arb_amount(), 0u32..=100)
            .prop_map(move |(id, description, total, paid_percent)| {
                let paid_amount = round_cents(total * f64::from(paid_percent) / 100.0);
                let mut purchase = Purchase {
                    id,
                    customer_id,
                    customer_name: "Cliente".to_string(),
                    description,
                    total_amount: total,
                    paid_amount,
                    remaining_amount: total,
                    status: PurchaseStatus::Activo,
                    created_at: None,
                    installment_enabled: false,
                    installment_count: None,
                    installment_amount: None,
                };
                settle(&mut purchase);
                purchase
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Seeded console states for common scenarios.

    use super::*;

    pub fn customer(id: i64, name: &str, email: &str) -> Customer {
        Customer {
            id: CustomerId::new(id),
            name: name.to_string(),
            email: email.to_string(),
            phone: format!("555-01{:02}", id),
            notes: None,
        }
    }

    pub fn purchase(id: i64, owner: &Customer, description: &str, total: f64, paid: f64) -> Purchase {
        let mut purchase = Purchase {
            id: PurchaseId::new(id),
            customer_id: owner.id,
            customer_name: owner.name.clone(),
            description: description.to_string(),
            total_amount: total,
            paid_amount: paid,
            remaining_amount: total,
            status: PurchaseStatus::Activo,
            created_at: created_at(id),
            installment_enabled: false,
            installment_count: None,
            installment_amount: None,
        };
        settle(&mut purchase);
        purchase
    }

    pub fn payment(id: i64, purchase_id: i64, amount: f64, method: PaymentMethod) -> Payment {
        Payment {
            id: PaymentId::new(id),
            purchase_id: PurchaseId::new(purchase_id),
            amount,
            method,
            paid_at: created_at(id),
            note: None,
        }
    }

    /// Three customers and five purchases:
    ///
    /// - customer 1 Luis Gómez: purchase 7 (80.00 open)
    /// - customer 2 María López: purchase 8 (40.00 open)
    /// - customer 3 Ana Pérez: purchase 11 (300.00 open) and purchase 12
    ///   (150.00 with 100.00 paid, 50.00 remaining)
    /// - customer 1 also has purchase 13, fully paid
    pub fn seeded_console() -> InMemoryConsole {
        let console = InMemoryConsole::new();
        let luis = customer(1, "Luis Gómez", "luis@example.com");
        let maria = customer(2, "María López", "maria@example.com");
        let ana = customer(3, "Ana Pérez", "ana@example.com");

        console.insert_purchase(purchase(7, &luis, "Mesa de centro", 80.0, 0.0));
        console.insert_purchase(purchase(8, &maria, "Silla plegable", 40.0, 0.0));
        console.insert_purchase(purchase(11, &ana, "Lavadora", 300.0, 0.0));
        console.insert_purchase(purchase(12, &ana, "Refrigerador", 150.0, 100.0));
        console.insert_purchase(purchase(13, &luis, "Lámpara", 25.0, 25.0));
        console.insert_payment(payment(100, 12, 100.0, PaymentMethod::Transferencia));
        console.insert_payment(payment(101, 13, 25.0, PaymentMethod::Efectivo));

        console.insert_customer(luis);
        console.insert_customer(maria);
        console.insert_customer(ana);
        console
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over console results.

    use super::*;

    /// Assert that a result is a server rejection with `status`.
    #[track_caller]
    pub fn assert_server_error<T: std::fmt::Debug>(result: &ApiResult<T>, status: u16) {
        match result {
            Err(ApiError::Server { status: actual, .. }) => {
                assert_eq!(*actual, status, "Wrong status in server error");
            }
            other => panic!("Expected server error {}, got: {:?}", status, other),
        }
    }

    /// Assert that a result failed client-side validation on `field`.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &ApiResult<T>, field: &str) {
        match result {
            Err(ApiError::Validation(errors)) => {
                assert!(
                    errors.field(field).is_some(),
                    "Expected validation error on {}, got: {}",
                    field,
                    errors
                );
            }
            other => panic!("Expected validation error on {}, got: {:?}", field, other),
        }
    }

    #[track_caller]
    pub fn assert_amount_eq(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.005,
            "Expected amount {:.2}, got {:.2}",
            expected,
            actual
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assertions::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn payment_settles_purchase() {
        let console = fixtures::seeded_console();
        let request = PaymentCreateRequest {
            amount: 50.0,
            method: PaymentMethod::Efectivo,
            paid_at: None,
            note: None,
        };
        let payment = console
            .create_payment(PurchaseId::new(12), &request)
            .await
            .unwrap();
        assert_eq!(payment.purchase_id, PurchaseId::new(12));

        let purchase = console.purchase(PurchaseId::new(12)).unwrap();
        assert_amount_eq(purchase.remaining_amount, 0.0);
        assert_eq!(purchase.status, PurchaseStatus::Pagado);
        assert_eq!(console.calls(Endpoint::CreatePayment), 1);

        let again = console.create_payment(PurchaseId::new(12), &request).await;
        assert_server_error(&again, 409);
    }

    #[tokio::test]
    async fn overpayment_is_rejected() {
        let console = fixtures::seeded_console();
        let request = PaymentCreateRequest {
            amount: 60.0,
            method: PaymentMethod::Efectivo,
            paid_at: None,
            note: None,
        };
        let result = console.create_payment(PurchaseId::new(12), &request).await;
        assert_server_error(&result, 400);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let console = fixtures::seeded_console();
        console.fail_next(Endpoint::ListPaymentMethods, ApiError::transport("offline"));
        assert!(console.list_payment_methods().await.is_err());
        assert_eq!(console.list_payment_methods().await.unwrap().len(), 3);
        assert_eq!(console.calls(Endpoint::ListPaymentMethods), 2);
    }

    #[tokio::test]
    async fn customer_purchases_are_scoped() {
        let console = fixtures::seeded_console();
        let page = console
            .list_customer_purchases(CustomerId::new(3), &CustomerPurchasesParams::default())
            .await
            .unwrap();
        let ids: Vec<i64> = page.content.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![11, 12]);
        assert!(page.is_last);
    }

    #[tokio::test]
    async fn created_ids_follow_seeded_ones() {
        let console = fixtures::seeded_console();
        let customer = console
            .create_customer(&CustomerCreateRequest {
                name: "Eva".to_string(),
                email: "eva@example.com".to_string(),
                phone: "555-0199".to_string(),
                notes: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(customer.id, CustomerId::new(4));
        assert_eq!(customer.notes, None);
    }

    proptest! {
        #[test]
        fn generated_purchases_balance(purchase in generators::arb_purchase(CustomerId::new(1))) {
            let sum = purchase.paid_amount + purchase.remaining_amount;
            prop_assert!((sum - purchase.total_amount).abs() < 0.011);
            prop_assert_eq!(purchase.status == PurchaseStatus::Pagado, purchase.remaining_amount == 0.0);
        }
    }
}
