//! Client-side, pre-submit validation of console forms.
//!
//! Forms hold raw user input. Validation either yields the typed request
//! body or reports every failing field; nothing here touches the network.

use crate::entities::{
    CustomerCreateRequest, CustomerUpdateRequest, InstallmentSimulationRequest,
    PaymentCreateRequest, PurchaseCreateRequest, PurchaseUpdateRequest,
};
use crate::enums::PaymentMethod;
use crate::error::ValidationErrors;
use crate::identity::CustomerId;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest accepted purchase description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseForm {
    pub customer_id: String,
    pub description: String,
    pub total_amount: String,
    pub installment_enabled: bool,
    pub installment_count: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentForm {
    pub amount: String,
    pub method: String,
    pub note: String,
}

impl CustomerForm {
    pub fn validate(&self) -> Result<CustomerCreateRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.push("name", "name is required");
        }
        let email = self.email.trim();
        if email.is_empty() {
            errors.push("email", "email is required");
        } else if !EMAIL_PATTERN.is_match(email) {
            errors.push("email", "email is not a valid address");
        }
        if self.phone.trim().is_empty() {
            errors.push("phone", "phone is required");
        }
        errors.into_result()?;

        Ok(CustomerCreateRequest {
            name: self.name.trim().to_string(),
            email: email.to_string(),
            phone: self.phone.trim().to_string(),
            notes: self.notes.trim().to_string(),
        })
    }

    pub fn validate_update(&self) -> Result<CustomerUpdateRequest, ValidationErrors> {
        let request = self.validate()?;
        Ok(CustomerUpdateRequest {
            name: request.name,
            email: request.email,
            phone: request.phone,
            notes: request.notes,
        })
    }
}

impl PurchaseForm {
    pub fn validate(&self) -> Result<PurchaseCreateRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let customer_id = match self.customer_id.trim() {
            "" => {
                errors.push("customerId", "a customer must be selected");
                None
            }
            raw => match raw.parse::<CustomerId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("customerId", "a customer must be selected");
                    None
                }
            },
        };

        validate_description(&self.description, &mut errors);
        let total_amount = parse_positive_amount("totalAmount", &self.total_amount, &mut errors);

        let installment_count = if self.installment_enabled {
            parse_installment_count(&self.installment_count, &mut errors)
        } else {
            None
        };
        errors.into_result()?;

        Ok(PurchaseCreateRequest {
            customer_id: customer_id.unwrap_or(CustomerId::new(0)),
            description: self.description.trim().to_string(),
            total_amount: total_amount.unwrap_or_default(),
            installment_enabled: self.installment_enabled,
            installment_count,
        })
    }

    pub fn validate_update(&self) -> Result<PurchaseUpdateRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_description(&self.description, &mut errors);
        let total_amount = parse_positive_amount("totalAmount", &self.total_amount, &mut errors);
        errors.into_result()?;
        Ok(PurchaseUpdateRequest {
            description: self.description.trim().to_string(),
            total_amount: total_amount.unwrap_or_default(),
        })
    }

    /// Simulation input, present only once both numbers are valid and the
    /// installment plan is switched on.
    pub fn simulation_request(&self) -> Option<InstallmentSimulationRequest> {
        if !self.installment_enabled {
            return None;
        }
        let total_amount = self.total_amount.trim().parse::<f64>().ok()?;
        let installment_count = self.installment_count.trim().parse::<u32>().ok()?;
        (total_amount.is_finite() && total_amount > 0.0 && installment_count > 0).then_some(
            InstallmentSimulationRequest {
                total_amount,
                installment_count,
            },
        )
    }
}

impl PaymentForm {
    /// Validate against the purchase's current `remaining_amount`.
    pub fn validate(&self, remaining_amount: f64) -> Result<PaymentCreateRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let amount = parse_positive_amount("amount", &self.amount, &mut errors);
        if let Some(amount) = amount {
            if amount > remaining_amount {
                errors.push("amount", "amount cannot exceed the remaining balance");
            }
        }

        let method = match self.method.trim() {
            "" => {
                errors.push("method", "a payment method must be selected");
                None
            }
            raw => match raw.parse::<PaymentMethod>() {
                Ok(method) => Some(method),
                Err(err) => {
                    errors.push("method", err.to_string());
                    None
                }
            },
        };
        errors.into_result()?;

        let note = self.note.trim();
        Ok(PaymentCreateRequest {
            amount: amount.unwrap_or_default(),
            method: method.unwrap_or(PaymentMethod::Otro),
            paid_at: None,
            note: (!note.is_empty()).then(|| note.to_string()),
        })
    }
}

fn validate_description(raw: &str, errors: &mut ValidationErrors) {
    let description = raw.trim();
    if description.is_empty() {
        errors.push("description", "description is required");
    } else if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(
            "description",
            format!("description cannot exceed {} characters", MAX_DESCRIPTION_LEN),
        );
    }
}

fn parse_positive_amount(field: &'static str, raw: &str, errors: &mut ValidationErrors) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(field, format!("{} is required", field));
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Some(value),
        _ => {
            errors.push(field, format!("{} must be a number greater than 0", field));
            None
        }
    }
}

fn parse_installment_count(raw: &str, errors: &mut ValidationErrors) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push("installmentCount", "number of installments is required");
        return None;
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        errors.push("installmentCount", "number of installments must be a whole number greater than 0");
        return None;
    }
    match raw.parse::<u32>() {
        Ok(count) if count > 0 => Some(count),
        _ => {
            errors.push("installmentCount", "number of installments must be a whole number greater than 0");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_form() -> CustomerForm {
        CustomerForm {
            name: " Ana Pérez ".to_string(),
            email: "ana@example.com".to_string(),
            phone: "555-0101".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn customer_form_trims_fields() {
        let request = customer_form().validate().unwrap();
        assert_eq!(request.name, "Ana Pérez");
        assert_eq!(request.notes, "");
    }

    #[test]
    fn customer_form_reports_every_field() {
        let form = CustomerForm {
            email: "not-an-email".to_string(),
            ..CustomerForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.field("name").is_some());
        assert_eq!(
            errors.field("email").map(|e| e.reason.as_str()),
            Some("email is not a valid address")
        );
        assert!(errors.field("phone").is_some());
    }

    #[test]
    fn purchase_form_requires_count_only_with_installments() {
        let mut form = PurchaseForm {
            customer_id: "3".to_string(),
            description: "Lavadora".to_string(),
            total_amount: "300".to_string(),
            installment_enabled: false,
            installment_count: String::new(),
        };
        let request = form.validate().unwrap();
        assert_eq!(request.installment_count, None);

        form.installment_enabled = true;
        let errors = form.validate().unwrap_err();
        assert!(errors.field("installmentCount").is_some());

        form.installment_count = "2.5".to_string();
        assert!(form.validate().is_err());

        form.installment_count = "3".to_string();
        let request = form.validate().unwrap();
        assert_eq!(request.installment_count, Some(3));
        assert_eq!(request.customer_id, CustomerId::new(3));
    }

    #[test]
    fn purchase_description_is_bounded() {
        let form = PurchaseForm {
            customer_id: "1".to_string(),
            description: "x".repeat(MAX_DESCRIPTION_LEN + 1),
            total_amount: "10".to_string(),
            ..PurchaseForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.field("description").is_some());
    }

    #[test]
    fn simulation_request_needs_both_valid_inputs() {
        let mut form = PurchaseForm {
            total_amount: "300".to_string(),
            installment_count: "3".to_string(),
            installment_enabled: true,
            ..PurchaseForm::default()
        };
        assert_eq!(
            form.simulation_request(),
            Some(InstallmentSimulationRequest {
                total_amount: 300.0,
                installment_count: 3
            })
        );

        form.installment_count = "0".to_string();
        assert_eq!(form.simulation_request(), None);

        form.installment_count = "3".to_string();
        form.total_amount = "-1".to_string();
        assert_eq!(form.simulation_request(), None);

        form.total_amount = "300".to_string();
        form.installment_enabled = false;
        assert_eq!(form.simulation_request(), None);
    }

    #[test]
    fn payment_cannot_exceed_remaining_balance() {
        let form = PaymentForm {
            amount: "60".to_string(),
            method: "EFECTIVO".to_string(),
            note: String::new(),
        };
        let errors = form.validate(50.0).unwrap_err();
        assert_eq!(
            errors.field("amount").map(|e| e.reason.as_str()),
            Some("amount cannot exceed the remaining balance")
        );

        let request = PaymentForm {
            amount: "50".to_string(),
            ..form
        }
        .validate(50.0)
        .unwrap();
        assert_eq!(request.amount, 50.0);
        assert_eq!(request.method, PaymentMethod::Efectivo);
        assert_eq!(request.note, None);
    }

    #[test]
    fn payment_requires_a_method() {
        let form = PaymentForm {
            amount: "10".to_string(),
            method: String::new(),
            note: "  first installment ".to_string(),
        };
        let errors = form.validate(100.0).unwrap_err();
        assert!(errors.field("method").is_some());
    }
}
