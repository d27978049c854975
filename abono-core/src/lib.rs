//! Abono Core - Domain Types
//!
//! Entities, wire enums, typed ids, the paginated envelope, error taxonomy,
//! client-side validation, and the [`ConsoleApi`] seam every other crate
//! talks to the remote console API through.

pub mod api;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod page;
pub mod validation;

pub use api::{ConsoleApi, CustomerListParams, CustomerPurchasesParams, PurchaseListParams};
pub use entities::{
    Customer, CustomerCreateRequest, CustomerUpdateRequest, InstallmentSimulation,
    InstallmentSimulationRequest, Payment, PaymentCreateRequest, Purchase, PurchaseCreateRequest,
    PurchaseUpdateRequest,
};
pub use enums::{EnumParseError, PaymentMethod, PurchaseStatus};
pub use error::{ApiError, ApiResult, ValidationError, ValidationErrors};
pub use identity::{CustomerId, PaymentId, PurchaseId, Timestamp};
pub use page::Page;
