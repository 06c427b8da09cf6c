use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::PoRecord;

pub struct RecordRepository;

impl RecordRepository {
    /// Upsert a record keyed on job id. Returns `true` when a new row was
    /// created, `false` when an existing one was replaced.
    pub async fn upsert(conn: &Connection, record: &PoRecord) -> Result<bool> {
        let existing = Self::get_by_job_id(conn, &record.job_id).await?;

        if existing.is_some() {
            conn.execute(
                r#"
                UPDATE po_records SET
                    po_number = ?2,
                    po_date = ?3,
                    buyer_company_name = ?4,
                    buyer_tax_id = ?5,
                    seller_company_name = ?6,
                    seller_tax_id = ?7,
                    delivery_address = ?8,
                    sub_total = ?9,
                    vat_rate = ?10,
                    vat_amount = ?11,
                    grand_total = ?12,
                    currency = ?13,
                    payment_terms = ?14,
                    data = ?15,
                    updated_at = ?16
                WHERE job_id = ?1
                "#,
                params![
                    record.job_id.clone(),
                    record.po_number.clone(),
                    record.po_date.clone(),
                    record.buyer_company_name.clone(),
                    record.buyer_tax_id.clone(),
                    record.seller_company_name.clone(),
                    record.seller_tax_id.clone(),
                    record.delivery_address.clone(),
                    record.sub_total,
                    record.vat_rate,
                    record.vat_amount,
                    record.grand_total,
                    record.currency.clone(),
                    record.payment_terms.clone(),
                    serde_json::to_string(&record.data)?,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await?;
            return Ok(false);
        }

        conn.execute(
            r#"
            INSERT INTO po_records (
                job_id, po_number, po_date, buyer_company_name, buyer_tax_id,
                seller_company_name, seller_tax_id, delivery_address, sub_total,
                vat_rate, vat_amount, grand_total, currency, payment_terms, data,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
            )
            "#,
            params![
                record.job_id.clone(),
                record.po_number.clone(),
                record.po_date.clone(),
                record.buyer_company_name.clone(),
                record.buyer_tax_id.clone(),
                record.seller_company_name.clone(),
                record.seller_tax_id.clone(),
                record.delivery_address.clone(),
                record.sub_total,
                record.vat_rate,
                record.vat_amount,
                record.grand_total,
                record.currency.clone(),
                record.payment_terms.clone(),
                serde_json::to_string(&record.data)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(true)
    }

    pub async fn get_by_job_id(conn: &Connection, job_id: &str) -> Result<Option<PoRecord>> {
        let mut rows = conn
            .query(
                r#"
                SELECT job_id, po_number, po_date, buyer_company_name, buyer_tax_id,
                       seller_company_name, seller_tax_id, delivery_address, sub_total,
                       vat_rate, vat_amount, grand_total, currency, payment_terms, data,
                       created_at, updated_at
                FROM po_records WHERE job_id = ?1
                "#,
                params![job_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_record(&row)?))
        } else {
            Ok(None)
        }
    }

    fn row_to_record(row: &libsql::Row) -> Result<PoRecord> {
        Ok(PoRecord {
            job_id: row.get(0)?,
            po_number: row.get(1)?,
            po_date: row.get(2)?,
            buyer_company_name: row.get(3)?,
            buyer_tax_id: row.get(4)?,
            seller_company_name: row.get(5)?,
            seller_tax_id: row.get(6)?,
            delivery_address: row.get(7)?,
            sub_total: row.get(8)?,
            vat_rate: row.get(9)?,
            vat_amount: row.get(10)?,
            grand_total: row.get(11)?,
            currency: row.get(12)?,
            payment_terms: row.get(13)?,
            data: serde_json::from_str(&row.get::<String>(14)?)?,
            created_at: Self::parse_ts(&row.get::<String>(15)?),
            updated_at: Self::parse_ts(&row.get::<String>(16)?),
        })
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}
