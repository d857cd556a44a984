//! Settlement report: CSV projection of the ledger for reconciliation.
//!
//! Terminal records are the permanent settlement history, so the report
//! always lists the full set it is given, open and settled alike.

use std::io;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::escrow::state::PaymentRecord;

/// One CSV line per payment record. Field names become the header row.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    payment_id: String,
    project_id: &'a str,
    client_id: &'a str,
    developer_id: &'a str,
    amount_minor: i64,
    status: &'static str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered: bool,
    client_verified: bool,
    admin_verified: bool,
    deliverables: usize,
    verified_deliverables: usize,
}

impl<'a> From<&'a PaymentRecord> for ReportRow<'a> {
    fn from(record: &'a PaymentRecord) -> Self {
        let verification = &record.verification;
        ReportRow {
            payment_id: record.id.to_string(),
            project_id: record.project_id.as_str(),
            client_id: record.client_id.as_str(),
            developer_id: record.developer_id.as_str(),
            amount_minor: record.amount.minor(),
            status: record.status.as_str(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            delivered: verification.developer_delivered,
            client_verified: verification.client_verified,
            admin_verified: verification.admin_verified,
            deliverables: verification.deliverables.len(),
            verified_deliverables: verification
                .deliverables
                .iter()
                .filter(|d| d.verified)
                .count(),
        }
    }
}

/// Write the report to `out`, one row per record, header first.
pub fn write_report<W: io::Write>(records: &[PaymentRecord], out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(ReportRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the report to a string, the shape HTTP responses want.
pub fn render_report(records: &[PaymentRecord]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_report(records, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
