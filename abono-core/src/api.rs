//! The console API seam.
//!
//! One method per remote endpoint. The REST adapter and the in-memory fake
//! server both implement [`ConsoleApi`]; the sync layer never sees HTTP.

use crate::entities::{
    Customer, CustomerCreateRequest, CustomerUpdateRequest, InstallmentSimulation,
    InstallmentSimulationRequest, Payment, PaymentCreateRequest, Purchase, PurchaseCreateRequest,
    PurchaseUpdateRequest,
};
use crate::enums::{PaymentMethod, PurchaseStatus};
use crate::error::ApiResult;
use crate::identity::{CustomerId, PurchaseId};
use crate::page::Page;
use async_trait::async_trait;

/// Parameters of `GET /api/customers`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerListParams {
    pub q: String,
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl Default for CustomerListParams {
    fn default() -> Self {
        Self {
            q: String::new(),
            page: 0,
            size: 50,
            sort: "name".to_string(),
        }
    }
}

/// Parameters of `GET /api/customers/{id}/purchases`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerPurchasesParams {
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl Default for CustomerPurchasesParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            sort: "createdAt".to_string(),
        }
    }
}

/// Parameters of `GET /api/purchases`. Absent filters are not sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PurchaseListParams {
    pub customer_id: Option<CustomerId>,
    pub status: Option<PurchaseStatus>,
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl Default for PurchaseListParams {
    fn default() -> Self {
        Self {
            customer_id: None,
            status: None,
            page: 0,
            size: 9,
            sort: "createdAt".to_string(),
        }
    }
}

#[async_trait]
pub trait ConsoleApi: Send + Sync {
    async fn list_customers(&self, params: &CustomerListParams) -> ApiResult<Page<Customer>>;

    async fn get_customer(&self, id: CustomerId) -> ApiResult<Customer>;

    async fn create_customer(&self, request: &CustomerCreateRequest) -> ApiResult<Customer>;

    async fn update_customer(
        &self,
        id: CustomerId,
        request: &CustomerUpdateRequest,
    ) -> ApiResult<Customer>;

    async fn delete_customer(&self, id: CustomerId) -> ApiResult<()>;

    async fn list_customer_purchases(
        &self,
        customer_id: CustomerId,
        params: &CustomerPurchasesParams,
    ) -> ApiResult<Page<Purchase>>;

    async fn list_purchases(&self, params: &PurchaseListParams) -> ApiResult<Page<Purchase>>;

    async fn get_purchase(&self, id: PurchaseId) -> ApiResult<Purchase>;

    async fn create_purchase(&self, request: &PurchaseCreateRequest) -> ApiResult<Purchase>;

    async fn update_purchase(
        &self,
        id: PurchaseId,
        request: &PurchaseUpdateRequest,
    ) -> ApiResult<Purchase>;

    async fn simulate_installments(
        &self,
        request: &InstallmentSimulationRequest,
    ) -> ApiResult<InstallmentSimulation>;

    async fn list_payments(&self, purchase_id: PurchaseId) -> ApiResult<Vec<Payment>>;

    async fn create_payment(
        &self,
        purchase_id: PurchaseId,
        request: &PaymentCreateRequest,
    ) -> ApiResult<Payment>;

    async fn list_payment_methods(&self) -> ApiResult<Vec<PaymentMethod>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_defaults_match_console_screens() {
        let customers = CustomerListParams::default();
        assert_eq!((customers.page, customers.size), (0, 50));
        assert_eq!(customers.sort, "name");
        assert!(customers.q.is_empty());

        let history = CustomerPurchasesParams::default();
        assert_eq!((history.page, history.size), (0, 10));

        let purchases = PurchaseListParams::default();
        assert_eq!(purchases.size, 9);
        assert_eq!(purchases.customer_id, None);
        assert_eq!(purchases.status, None);
    }
}
