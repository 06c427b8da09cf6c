use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Jobs table: one row per uploaded purchase-order image
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            file_path TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            raw_ocr_text TEXT,
            extracted_fields TEXT,
            field_confidence TEXT,
            warnings TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
        CREATE INDEX IF NOT EXISTS idx_jobs_user_id ON jobs(user_id);

        -- Append-only per-job audit log
        CREATE TABLE IF NOT EXISTS job_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            step TEXT NOT NULL,
            message TEXT NOT NULL,
            ts TEXT NOT NULL,
            FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_job_logs_job_id ON job_logs(job_id);

        -- Confirmed purchase-order records, one per job
        CREATE TABLE IF NOT EXISTS po_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL UNIQUE,
            po_number TEXT,
            po_date TEXT,
            buyer_company_name TEXT,
            buyer_tax_id TEXT,
            seller_company_name TEXT,
            seller_tax_id TEXT,
            delivery_address TEXT,
            sub_total REAL,
            vat_rate REAL,
            vat_amount REAL,
            grand_total REAL,
            currency TEXT NOT NULL DEFAULT 'THB',
            payment_terms TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
        );
        "#,
    )
    .await?;

    Ok(())
}
