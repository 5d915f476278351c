//! Buy request parsed from submitted form fields

use crate::error::{AgentError, Result};
use std::collections::HashMap;

use super::scripts::DialogScript;

/// What the buyer agent should do for one product
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyRequest {
    pub product: String,
    pub dialog: Option<DialogScript>,
    pub negotiate: bool,
}

impl BuyRequest {
    pub fn new(product: &str) -> Self {
        Self {
            product: product.to_string(),
            dialog: None,
            negotiate: false,
        }
    }

    /// Build a request from form fields; `product` is required
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self> {
        let product = required(fields, "product")?;

        let dialog = match fields.get("dialog").map(|v| v.trim()) {
            None | Some("") | Some("none") => None,
            Some(name) => Some(name.parse::<DialogScript>().map_err(|reason| {
                AgentError::InvalidParameter {
                    name: "dialog".to_string(),
                    reason,
                }
            })?),
        };

        let negotiate = fields
            .get("negotiate")
            .map(|v| matches!(v.trim(), "on" | "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            product: product.to_string(),
            dialog,
            negotiate,
        })
    }
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AgentError::MissingParameter(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_product_only() {
        let request = BuyRequest::from_form(&form(&[("product", "rubber gloves")])).unwrap();
        assert_eq!(request, BuyRequest::new("rubber gloves"));
    }

    #[test]
    fn test_missing_product() {
        for fields in [form(&[]), form(&[("product", "  ")]), form(&[("dialog", "agreement")])] {
            let err = BuyRequest::from_form(&fields).unwrap_err();
            assert_eq!(err.to_string(), "parameter product is missing");
        }
    }

    #[test]
    fn test_optional_fields() {
        let request = BuyRequest::from_form(&form(&[
            ("product", "gloves"),
            ("dialog", "escalation"),
            ("negotiate", "on"),
        ]))
        .unwrap();

        assert_eq!(request.dialog, Some(DialogScript::Escalation));
        assert!(request.negotiate);
    }

    #[test]
    fn test_unknown_dialog_rejected() {
        let result = BuyRequest::from_form(&form(&[("product", "gloves"), ("dialog", "opera")]));
        assert!(matches!(
            result,
            Err(AgentError::InvalidParameter { ref name, .. }) if name == "dialog"
        ));
    }
}
