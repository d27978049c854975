//! Console mutations and the cache prefixes each one invalidates.

use crate::queries::{CUSTOMER, CUSTOMERS, CUSTOMER_PURCHASES, PAYMENTS, PURCHASE, PURCHASES};
use abono_core::validation::{CustomerForm, PaymentForm, PurchaseForm};
use abono_core::{
    ApiError, ConsoleApi, Customer, CustomerCreateRequest, CustomerId, CustomerUpdateRequest,
    Payment, PaymentCreateRequest, Purchase, PurchaseCreateRequest, PurchaseId,
    PurchaseUpdateRequest, ValidationErrors,
};
use abono_sync::{IdentityPrefix, Mutation};
use async_trait::async_trait;

/// Execution context of every console mutation.
pub type Api = dyn ConsoleApi;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCustomer {
    pub request: CustomerCreateRequest,
}

impl CreateCustomer {
    pub fn from_form(form: &CustomerForm) -> Result<Self, ValidationErrors> {
        Ok(Self {
            request: form.validate()?,
        })
    }
}

#[async_trait]
impl Mutation<Api> for CreateCustomer {
    type Output = Customer;

    fn kind(&self) -> &'static str {
        "create_customer"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![IdentityPrefix::new(CUSTOMERS)]
    }

    async fn execute(&self, api: &Api) -> Result<Customer, ApiError> {
        api.create_customer(&self.request).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCustomer {
    pub customer_id: CustomerId,
    pub request: CustomerUpdateRequest,
}

impl UpdateCustomer {
    pub fn from_form(
        customer_id: CustomerId,
        form: &CustomerForm,
    ) -> Result<Self, ValidationErrors> {
        Ok(Self {
            customer_id,
            request: form.validate_update()?,
        })
    }
}

#[async_trait]
impl Mutation<Api> for UpdateCustomer {
    type Output = Customer;

    fn kind(&self) -> &'static str {
        "update_customer"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![
            IdentityPrefix::new(CUSTOMER).with("customerId", self.customer_id),
            IdentityPrefix::new(CUSTOMERS),
        ]
    }

    async fn execute(&self, api: &Api) -> Result<Customer, ApiError> {
        api.update_customer(self.customer_id, &self.request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteCustomer {
    pub customer_id: CustomerId,
}

#[async_trait]
impl Mutation<Api> for DeleteCustomer {
    type Output = ();

    fn kind(&self) -> &'static str {
        "delete_customer"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![
            IdentityPrefix::new(CUSTOMER).with("customerId", self.customer_id),
            IdentityPrefix::new(CUSTOMERS),
            IdentityPrefix::new(CUSTOMER_PURCHASES).with("customerId", self.customer_id),
        ]
    }

    async fn execute(&self, api: &Api) -> Result<(), ApiError> {
        api.delete_customer(self.customer_id).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePurchase {
    pub request: PurchaseCreateRequest,
}

impl CreatePurchase {
    pub fn from_form(form: &PurchaseForm) -> Result<Self, ValidationErrors> {
        Ok(Self {
            request: form.validate()?,
        })
    }
}

#[async_trait]
impl Mutation<Api> for CreatePurchase {
    type Output = Purchase;

    fn kind(&self) -> &'static str {
        "create_purchase"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![
            IdentityPrefix::new(PURCHASES),
            IdentityPrefix::new(CUSTOMER_PURCHASES).with("customerId", self.request.customer_id),
        ]
    }

    async fn execute(&self, api: &Api) -> Result<Purchase, ApiError> {
        api.create_purchase(&self.request).await
    }
}

/// Edit a purchase. The owning customer scopes which purchase lists refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePurchase {
    pub purchase_id: PurchaseId,
    pub customer_id: CustomerId,
    pub request: PurchaseUpdateRequest,
}

impl UpdatePurchase {
    pub fn from_form(
        purchase_id: PurchaseId,
        customer_id: CustomerId,
        form: &PurchaseForm,
    ) -> Result<Self, ValidationErrors> {
        Ok(Self {
            purchase_id,
            customer_id,
            request: form.validate_update()?,
        })
    }
}

#[async_trait]
impl Mutation<Api> for UpdatePurchase {
    type Output = Purchase;

    fn kind(&self) -> &'static str {
        "update_purchase"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![
            IdentityPrefix::new(PURCHASE).with("purchaseId", self.purchase_id),
            IdentityPrefix::new(PURCHASES),
            IdentityPrefix::new(CUSTOMER_PURCHASES).with("customerId", self.customer_id),
        ]
    }

    async fn execute(&self, api: &Api) -> Result<Purchase, ApiError> {
        api.update_purchase(self.purchase_id, &self.request).await
    }
}

/// Register a payment.
///
/// Every purchase list is refreshed, since any of them may show the
/// balance this payment changes.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePayment {
    pub purchase_id: PurchaseId,
    pub request: PaymentCreateRequest,
}

impl CreatePayment {
    /// Validate `form` against the purchase's current balance.
    pub fn from_form(
        purchase_id: PurchaseId,
        remaining_amount: f64,
        form: &PaymentForm,
    ) -> Result<Self, ValidationErrors> {
        Ok(Self {
            purchase_id,
            request: form.validate(remaining_amount)?,
        })
    }
}

#[async_trait]
impl Mutation<Api> for CreatePayment {
    type Output = Payment;

    fn kind(&self) -> &'static str {
        "create_payment"
    }

    fn invalidates(&self) -> Vec<IdentityPrefix> {
        vec![
            IdentityPrefix::new(PAYMENTS).with("purchaseId", self.purchase_id),
            IdentityPrefix::new(PURCHASE).with("purchaseId", self.purchase_id),
            IdentityPrefix::new(PURCHASES),
            IdentityPrefix::new(CUSTOMER_PURCHASES),
        ]
    }

    async fn execute(&self, api: &Api) -> Result<Payment, ApiError> {
        api.create_payment(self.purchase_id, &self.request).await
    }
}
