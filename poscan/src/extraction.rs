//! Regex-based purchase-order field extraction.
//!
//! A pure function from raw OCR text to structured fields, per-field
//! confidence, and human-readable warnings (Thai locale, matching what
//! the reviewing UI shows). The pipeline treats this as opaque; hard
//! cross-field validation lives on [`ExtractedFields::validate`].

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ExtractedFields, LineItem};

macro_rules! cached_regex {
    ($pattern:expr) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new($pattern).expect("hardcoded regex"))
    }};
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_amount(value: &str) -> Option<f64> {
    value.replace(',', "").parse::<f64>().ok()
}

fn parse_items(text: &str) -> Vec<LineItem> {
    let re = cached_regex!(
        r"(?im)^(.*?)\s*qty\s+([0-9.]+)\s+unit\s+(\S+)\s+unit_price\s+([0-9.,]+)\s+line_total\s+([0-9.,]+)\s*$"
    );
    re.captures_iter(text)
        .filter_map(|caps| {
            Some(LineItem {
                description: caps.get(1)?.as_str().trim().to_string(),
                quantity: parse_amount(caps.get(2)?.as_str())?,
                unit: Some(caps.get(3)?.as_str().to_string()),
                unit_price: parse_amount(caps.get(4)?.as_str())?,
                line_total: parse_amount(caps.get(5)?.as_str())?,
            })
        })
        .collect()
}

/// Extract structured fields from raw OCR text.
///
/// Returns `(fields, per-field confidence in [0,1], soft warnings)`.
pub fn parse_po_text(raw_text: &str) -> (ExtractedFields, HashMap<String, f64>, Vec<String>) {
    let mut warnings = Vec::new();

    let sub_total = first_capture(
        cached_regex!(r"(?i)sub\s*total\s*[:\-]?\s*([0-9.,]+)"),
        raw_text,
    )
    .and_then(|v| parse_amount(&v));
    let vat_amount = first_capture(
        cached_regex!(r"(?i)vat(?:\s*\d+%?)?\s*[:\-]?\s*([0-9.,]+)"),
        raw_text,
    )
    .and_then(|v| parse_amount(&v));
    let grand_total = first_capture(
        cached_regex!(r"(?i)grand\s*total\s*[:\-]?\s*([0-9.,]+)"),
        raw_text,
    )
    .and_then(|v| parse_amount(&v));

    let fields = ExtractedFields {
        po_number: first_capture(
            cached_regex!(r"(?i)po\s*(?:number|no)\s*[:\-]?\s*([A-Za-z0-9\-/]+)"),
            raw_text,
        ),
        po_date: first_capture(
            cached_regex!(r"(?i)po\s*date\s*[:\-]?\s*([0-9]{4}-[0-9]{2}-[0-9]{2})"),
            raw_text,
        ),
        buyer_company_name: first_capture(cached_regex!(r"(?i)buyer\s*[:\-]?\s*(.+)"), raw_text),
        buyer_tax_id: first_capture(
            cached_regex!(r"(?i)buyer\s*tax\s*id\s*[:\-]?\s*([0-9\-]+)"),
            raw_text,
        ),
        seller_company_name: first_capture(cached_regex!(r"(?i)seller\s*[:\-]?\s*(.+)"), raw_text),
        seller_tax_id: first_capture(
            cached_regex!(r"(?i)seller\s*tax\s*id\s*[:\-]?\s*([0-9\-]+)"),
            raw_text,
        ),
        delivery_address: first_capture(
            cached_regex!(r"(?i)delivery\s*address\s*[:\-]?\s*(.+)"),
            raw_text,
        ),
        items: parse_items(raw_text),
        sub_total,
        vat_rate: vat_amount.map(|_| 7.0),
        vat_amount,
        grand_total,
        currency: "THB".to_string(),
        payment_terms: first_capture(
            cached_regex!(r"(?i)payment\s*terms\s*[:\-]?\s*(.+)"),
            raw_text,
        ),
    };

    if vat_amount.is_none() {
        warnings.push("หา VAT ไม่เจอ".to_string());
    }
    if let (Some(sub), Some(grand), Some(vat)) = (sub_total, grand_total, vat_amount) {
        if ((sub + vat) - grand).abs() > 5.0 {
            warnings.push("ยอดรวมไม่ตรง".to_string());
        }
    }

    let confidence = HashMap::from([
        (
            "po_number".to_string(),
            if fields.po_number.is_some() { 0.8 } else { 0.0 },
        ),
        (
            "po_date".to_string(),
            if fields.po_date.is_some() { 0.8 } else { 0.0 },
        ),
        (
            "buyer_company_name".to_string(),
            if fields.buyer_company_name.is_some() {
                0.7
            } else {
                0.0
            },
        ),
        ("items".to_string(), 0.6),
        (
            "grand_total".to_string(),
            if grand_total.is_some() { 0.75 } else { 0.0 },
        ),
    ]);

    (fields, confidence, warnings)
}
