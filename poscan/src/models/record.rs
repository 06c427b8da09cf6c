use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExtractedFields;

/// Confirmed purchase-order data, one per job, created either by
/// auto-save or by an explicit user confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoRecord {
    pub job_id: String,
    pub po_number: Option<String>,
    pub po_date: Option<String>,
    pub buyer_company_name: Option<String>,
    pub buyer_tax_id: Option<String>,
    pub seller_company_name: Option<String>,
    pub seller_tax_id: Option<String>,
    pub delivery_address: Option<String>,
    pub sub_total: Option<f64>,
    pub vat_rate: Option<f64>,
    pub vat_amount: Option<f64>,
    pub grand_total: Option<f64>,
    pub currency: String,
    pub payment_terms: Option<String>,
    /// Full field set as confirmed, kept verbatim.
    pub data: ExtractedFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PoRecord {
    pub fn from_fields(job_id: &str, fields: &ExtractedFields) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            po_number: fields.po_number.clone(),
            po_date: fields.po_date.clone(),
            buyer_company_name: fields.buyer_company_name.clone(),
            buyer_tax_id: fields.buyer_tax_id.clone(),
            seller_company_name: fields.seller_company_name.clone(),
            seller_tax_id: fields.seller_tax_id.clone(),
            delivery_address: fields.delivery_address.clone(),
            sub_total: fields.sub_total,
            vat_rate: fields.vat_rate,
            vat_amount: fields.vat_amount,
            grand_total: fields.grand_total,
            currency: fields.currency.clone(),
            payment_terms: fields.payment_terms.clone(),
            data: fields.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
