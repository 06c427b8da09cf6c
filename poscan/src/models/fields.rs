use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PoscanError, Result};

/// Absolute tolerance for cross-field total checks, in currency units.
pub const TOTAL_TOLERANCE: f64 = 5.0;

fn default_currency() -> String {
    "THB".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub line_total: f64,
}

/// Structured purchase-order fields produced by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedFields {
    pub po_number: Option<String>,
    pub po_date: Option<String>,
    pub buyer_company_name: Option<String>,
    pub buyer_tax_id: Option<String>,
    pub seller_company_name: Option<String>,
    pub seller_tax_id: Option<String>,
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub sub_total: Option<f64>,
    pub vat_rate: Option<f64>,
    pub vat_amount: Option<f64>,
    pub grand_total: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub payment_terms: Option<String>,
}

impl Default for ExtractedFields {
    fn default() -> Self {
        Self {
            po_number: None,
            po_date: None,
            buyer_company_name: None,
            buyer_tax_id: None,
            seller_company_name: None,
            seller_tax_id: None,
            delivery_address: None,
            items: Vec::new(),
            sub_total: None,
            vat_rate: None,
            vat_amount: None,
            grand_total: None,
            currency: default_currency(),
            payment_terms: None,
        }
    }
}

impl ExtractedFields {
    /// Hard data-integrity checks owned by the validating stage, distinct
    /// from the extractor's soft warnings. A mismatch fails the job.
    pub fn validate(&self) -> Result<()> {
        if let Some(date) = &self.po_date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                PoscanError::Validation(format!("po_date '{date}' is not a valid YYYY-MM-DD date"))
            })?;
        }

        if let Some(sub_total) = self.sub_total {
            if !self.items.is_empty() {
                let sum_lines: f64 = self.items.iter().map(|item| item.line_total).sum();
                if (sum_lines - sub_total).abs() > TOTAL_TOLERANCE {
                    return Err(PoscanError::Validation(format!(
                        "line_total sum ({sum_lines}) does not match sub_total ({sub_total})"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_totals_pass() {
        let fields = ExtractedFields {
            sub_total: Some(1000.0),
            items: vec![
                LineItem {
                    line_total: 600.0,
                    ..Default::default()
                },
                LineItem {
                    line_total: 402.0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        // 1002 vs 1000 is inside the tolerance of 5.
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn mismatched_line_totals_are_rejected() {
        let fields = ExtractedFields {
            sub_total: Some(1000.0),
            items: vec![LineItem {
                line_total: 1200.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = fields.validate().unwrap_err();
        assert!(matches!(err, PoscanError::Validation(_)));
        assert!(err.to_string().contains("does not match sub_total"));
    }

    #[test]
    fn missing_sub_total_or_items_skips_the_check() {
        let no_sub = ExtractedFields {
            items: vec![LineItem {
                line_total: 1200.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(no_sub.validate().is_ok());

        let no_items = ExtractedFields {
            sub_total: Some(1000.0),
            ..Default::default()
        };
        assert!(no_items.validate().is_ok());
    }

    #[test]
    fn bad_date_is_rejected() {
        let fields = ExtractedFields {
            po_date: Some("02/01/2025".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_err());

        let fields = ExtractedFields {
            po_date: Some("2025-01-02".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());
    }
}
