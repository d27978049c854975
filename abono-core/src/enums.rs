//! Closed wire enumerations for purchases and payments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a purchase, computed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    /// Still has a remaining balance.
    Activo,
    /// Fully paid.
    Pagado,
    Cancelado,
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Efectivo,
    Transferencia,
    Otro,
}

impl PurchaseStatus {
    pub const ALL: [PurchaseStatus; 3] = [Self::Activo, Self::Pagado, Self::Cancelado];

    /// The exact token the API sends and accepts.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Activo => "ACTIVO",
            PurchaseStatus::Pagado => "PAGADO",
            PurchaseStatus::Cancelado => "CANCELADO",
        }
    }

    /// Whether payments can still be registered against the purchase.
    pub fn accepts_payments(&self) -> bool {
        matches!(self, PurchaseStatus::Activo)
    }
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Efectivo, Self::Transferencia, Self::Otro];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            PaymentMethod::Efectivo => "EFECTIVO",
            PaymentMethod::Transferencia => "TRANSFERENCIA",
            PaymentMethod::Otro => "OTRO",
        }
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "ACTIVO" => Ok(PurchaseStatus::Activo),
            "PAGADO" => Ok(PurchaseStatus::Pagado),
            "CANCELADO" => Ok(PurchaseStatus::Cancelado),
            _ => Err(EnumParseError::new("purchase status", s)),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "EFECTIVO" => Ok(PaymentMethod::Efectivo),
            "TRANSFERENCIA" => Ok(PaymentMethod::Transferencia),
            "OTRO" => Ok(PaymentMethod::Otro),
            _ => Err(EnumParseError::new("payment method", s)),
        }
    }
}

/// Error when parsing an unknown enumeration token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}
