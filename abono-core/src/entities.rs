//! Console entities and request bodies, as exchanged with the API.

use crate::enums::{PaymentMethod, PurchaseStatus};
use crate::identity::{CustomerId, PaymentId, PurchaseId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// CUSTOMERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreateRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdateRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

impl From<&Customer> for CustomerUpdateRequest {
    /// Seed an edit form from the current customer.
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            notes: customer.notes.clone().unwrap_or_default(),
        }
    }
}

// ============================================================================
// PURCHASES
// ============================================================================

/// A purchase with its server-computed balance.
///
/// `paid_amount`, `remaining_amount` and `status` are derived by the server
/// from the registered payments and must never be patched locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub description: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub installment_enabled: bool,
    #[serde(default)]
    pub installment_count: Option<u32>,
    #[serde(default)]
    pub installment_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCreateRequest {
    pub customer_id: CustomerId,
    pub description: String,
    pub total_amount: f64,
    pub installment_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseUpdateRequest {
    pub description: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentSimulationRequest {
    pub total_amount: f64,
    pub installment_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentSimulation {
    pub total_amount: f64,
    pub installment_count: u32,
    pub installment_amount: f64,
}

// ============================================================================
// PAYMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub purchase_id: PurchaseId,
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub paid_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Body of `POST /api/purchases/{id}/payments`.
///
/// `paid_at` and `note` are always sent, as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreateRequest {
    pub amount: f64,
    pub method: PaymentMethod,
    pub paid_at: Option<NaiveDateTime>,
    pub note: Option<String>,
}
