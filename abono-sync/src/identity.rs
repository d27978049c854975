//! Canonical query identities and invalidation prefixes.
//!
//! A [`QueryIdentity`] names one cacheable query: a resource kind plus every
//! parameter that affects the result. Parameters live in a sorted map, so two
//! identities built from the same parameters in a different order are equal
//! and render to the same canonical string.

use abono_core::{CustomerId, PaymentId, PurchaseId, PurchaseStatus};
use std::collections::BTreeMap;
use std::fmt;

/// A typed query parameter value.
///
/// Numbers are stored by bit pattern so identities stay `Eq + Hash`; `-0.0`
/// is folded into `0.0` on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    Int(i64),
    Number(u64),
    Text(String),
    Bool(bool),
}

impl ParamValue {
    pub fn number(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        Self::Number(value.to_bits())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(bits) => Some(f64::from_bits(*bits)),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            // Debug keeps the decimal point, so 1.0 never collides with Int(1).
            Self::Number(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Self::Text(value) => write!(f, "{:?}", value),
            Self::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<CustomerId> for ParamValue {
    fn from(id: CustomerId) -> Self {
        Self::Int(id.get())
    }
}

impl From<PurchaseId> for ParamValue {
    fn from(id: PurchaseId) -> Self {
        Self::Int(id.get())
    }
}

impl From<PaymentId> for ParamValue {
    fn from(id: PaymentId) -> Self {
        Self::Int(id.get())
    }
}

impl From<PurchaseStatus> for ParamValue {
    fn from(status: PurchaseStatus) -> Self {
        Self::Text(status.as_wire_str().to_string())
    }
}

/// Canonical key of a cacheable query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryIdentity {
    kind: String,
    params: BTreeMap<String, ParamValue>,
}

impl QueryIdentity {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter, replacing any earlier value under the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a parameter only when present. Absent values are omitted rather
    /// than recorded as null.
    pub fn with_opt<V: Into<ParamValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Deterministic rendering: `kind{a=1,b="x"}`, keys in sorted order.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.kind)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// A resource kind plus a subset of scoping parameters.
///
/// Matches every identity of the same kind that carries each prefix
/// parameter with an equal value. A bare kind matches all of its queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityPrefix {
    kind: String,
    params: BTreeMap<String, ParamValue>,
}

impl IdentityPrefix {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Prefix that matches exactly one identity.
    pub fn exact(identity: &QueryIdentity) -> Self {
        Self {
            kind: identity.kind.clone(),
            params: identity.params.clone(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn matches(&self, identity: &QueryIdentity) -> bool {
        self.kind == identity.kind
            && self
                .params
                .iter()
                .all(|(key, value)| identity.params.get(key) == Some(value))
    }
}

impl fmt::Display for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "{{{}..}}", params.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_sorted() {
        let identity = QueryIdentity::new("customers")
            .with("sort", "name")
            .with("size", 50u32)
            .with("q", "")
            .with("page", 0u32);
        assert_eq!(
            identity.canonical(),
            r#"customers{page=0,q="",size=50,sort="name"}"#
        );
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let without = QueryIdentity::new("purchases")
            .with("page", 0u32)
            .with_opt::<CustomerId>("customerId", None);
        let explicit = QueryIdentity::new("purchases").with("page", 0u32);
        assert_eq!(without, explicit);
        assert!(without.param("customerId").is_none());
    }

    #[test]
    fn numbers_never_collide_with_integers() {
        let int = QueryIdentity::new("x").with("n", 1i64);
        let num = QueryIdentity::new("x").with("n", 1.0f64);
        assert_ne!(int, num);
        assert_ne!(int.canonical(), num.canonical());
        assert_eq!(
            QueryIdentity::new("x").with("n", -0.0f64),
            QueryIdentity::new("x").with("n", 0.0f64)
        );
    }

    #[test]
    fn prefix_matches_by_kind_and_scope() {
        let payments_7 = QueryIdentity::new("payments").with("purchaseId", PurchaseId::new(7));
        let payments_8 = QueryIdentity::new("payments").with("purchaseId", PurchaseId::new(8));

        let scoped = IdentityPrefix::new("payments").with("purchaseId", PurchaseId::new(7));
        assert!(scoped.matches(&payments_7));
        assert!(!scoped.matches(&payments_8));

        let all = IdentityPrefix::new("payments");
        assert!(all.matches(&payments_7) && all.matches(&payments_8));
        assert!(!IdentityPrefix::new("purchase").matches(&payments_7));
        assert!(IdentityPrefix::exact(&payments_8).matches(&payments_8));
    }
}
