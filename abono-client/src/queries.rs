//! Query catalogue: identities and bindable specs for every console read.
//!
//! Identity parameters mirror the request parameters exactly, so two views
//! asking for the same data always land on the same cache entry.

use abono_core::{
    ConsoleApi, Customer, CustomerId, CustomerListParams, CustomerPurchasesParams,
    InstallmentSimulation, InstallmentSimulationRequest, Page, Payment, PaymentMethod, Purchase,
    PurchaseId, PurchaseListParams,
};
use abono_sync::{QueryIdentity, QuerySpec};
use std::sync::Arc;

/// Shared handle to whichever console implementation is in use.
pub type Console = Arc<dyn ConsoleApi>;

pub const CUSTOMERS: &str = "customers";
pub const CUSTOMER: &str = "customer";
pub const CUSTOMER_PURCHASES: &str = "customerPurchases";
pub const PURCHASES: &str = "purchases";
pub const PURCHASE: &str = "purchase";
pub const PAYMENTS: &str = "payments";
pub const PAYMENT_METHODS: &str = "paymentMethods";
pub const INSTALLMENT_SIMULATION: &str = "installmentSimulation";

// ============================================================================
// IDENTITIES
// ============================================================================

pub fn customers_identity(params: &CustomerListParams) -> QueryIdentity {
    QueryIdentity::new(CUSTOMERS)
        .with("q", params.q.as_str())
        .with("page", params.page)
        .with("size", params.size)
        .with("sort", params.sort.as_str())
}

pub fn customer_identity(id: CustomerId) -> QueryIdentity {
    QueryIdentity::new(CUSTOMER).with("customerId", id)
}

pub fn customer_purchases_identity(
    customer_id: CustomerId,
    params: &CustomerPurchasesParams,
) -> QueryIdentity {
    QueryIdentity::new(CUSTOMER_PURCHASES)
        .with("customerId", customer_id)
        .with("page", params.page)
        .with("size", params.size)
        .with("sort", params.sort.as_str())
}

pub fn purchases_identity(params: &PurchaseListParams) -> QueryIdentity {
    QueryIdentity::new(PURCHASES)
        .with_opt("customerId", params.customer_id)
        .with_opt("status", params.status)
        .with("page", params.page)
        .with("size", params.size)
        .with("sort", params.sort.as_str())
}

pub fn purchase_identity(id: PurchaseId) -> QueryIdentity {
    QueryIdentity::new(PURCHASE).with("purchaseId", id)
}

pub fn payments_identity(purchase_id: PurchaseId) -> QueryIdentity {
    QueryIdentity::new(PAYMENTS).with("purchaseId", purchase_id)
}

pub fn payment_methods_identity() -> QueryIdentity {
    QueryIdentity::new(PAYMENT_METHODS)
}

/// Value-based: identical inputs share one cached simulation.
pub fn installment_simulation_identity(
    request: Option<&InstallmentSimulationRequest>,
) -> QueryIdentity {
    QueryIdentity::new(INSTALLMENT_SIMULATION)
        .with_opt("totalAmount", request.map(|r| r.total_amount))
        .with_opt("installmentCount", request.map(|r| r.installment_count))
}

/// Whether a simulation request is worth sending.
pub fn should_simulate(request: Option<&InstallmentSimulationRequest>) -> bool {
    request.is_some_and(|r| {
        r.total_amount.is_finite() && r.total_amount > 0.0 && r.installment_count > 0
    })
}

// ============================================================================
// SPECS
// ============================================================================

pub fn customers(api: &Console, params: CustomerListParams) -> QuerySpec<Page<Customer>> {
    let api = api.clone();
    let params = Arc::new(params);
    QuerySpec::new(customers_identity(&params), move || {
        let api = api.clone();
        let params = params.clone();
        async move { api.list_customers(&params).await }
    })
}

pub fn customer(api: &Console, id: CustomerId) -> QuerySpec<Customer> {
    let api = api.clone();
    QuerySpec::new(customer_identity(id), move || {
        let api = api.clone();
        async move { api.get_customer(id).await }
    })
}

/// Disabled until a customer is selected.
pub fn customer_purchases(
    api: &Console,
    customer_id: Option<CustomerId>,
    params: CustomerPurchasesParams,
) -> QuerySpec<Page<Purchase>> {
    let api = api.clone();
    let enabled = customer_id.is_some();
    let id = customer_id.unwrap_or(CustomerId::new(0));
    let identity = match customer_id {
        Some(id) => customer_purchases_identity(id, &params),
        None => QueryIdentity::new(CUSTOMER_PURCHASES),
    };
    let params = Arc::new(params);
    QuerySpec::new(identity, move || {
        let api = api.clone();
        let params = params.clone();
        async move { api.list_customer_purchases(id, &params).await }
    })
    .enabled(enabled)
}

pub fn purchases(api: &Console, params: PurchaseListParams) -> QuerySpec<Page<Purchase>> {
    let api = api.clone();
    let params = Arc::new(params);
    QuerySpec::new(purchases_identity(&params), move || {
        let api = api.clone();
        let params = params.clone();
        async move { api.list_purchases(&params).await }
    })
}

pub fn purchase(api: &Console, id: PurchaseId) -> QuerySpec<Purchase> {
    let api = api.clone();
    QuerySpec::new(purchase_identity(id), move || {
        let api = api.clone();
        async move { api.get_purchase(id).await }
    })
}

pub fn payments(api: &Console, purchase_id: PurchaseId) -> QuerySpec<Vec<Payment>> {
    let api = api.clone();
    QuerySpec::new(payments_identity(purchase_id), move || {
        let api = api.clone();
        async move { api.list_payments(purchase_id).await }
    })
}

pub fn payment_methods(api: &Console) -> QuerySpec<Vec<PaymentMethod>> {
    let api = api.clone();
    QuerySpec::new(payment_methods_identity(), move || {
        let api = api.clone();
        async move { api.list_payment_methods().await }
    })
}

/// Enabled only for a request that passes [`should_simulate`].
pub fn installment_simulation(
    api: &Console,
    request: Option<InstallmentSimulationRequest>,
) -> QuerySpec<InstallmentSimulation> {
    let api = api.clone();
    let enabled = should_simulate(request.as_ref());
    let body = request.unwrap_or(InstallmentSimulationRequest {
        total_amount: 0.0,
        installment_count: 0,
    });
    QuerySpec::new(installment_simulation_identity(request.as_ref()), move || {
        let api = api.clone();
        async move { api.simulate_installments(&body).await }
    })
    .enabled(enabled)
}
