//! Aggregate view over a set of payment records, the numbers a
//! counterparty dashboard renders.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::amount::Amount;
use crate::escrow::state::PaymentRecord;
use crate::model::EscrowStatus;

/// Record counts per status plus amount totals per settlement bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowTotals {
    pub payments: usize,
    pub counts: BTreeMap<EscrowStatus, usize>,
    /// Agreed but not yet deposited.
    pub pending: Amount,
    /// Deposited and awaiting settlement (`in_escrow` or `verified`).
    pub held: Amount,
    pub released: Amount,
    pub refunded: Amount,
    pub disputed: Amount,
}

impl EscrowTotals {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PaymentRecord>,
    {
        let mut totals = EscrowTotals::default();
        for record in records {
            totals.payments += 1;
            *totals.counts.entry(record.status).or_default() += 1;
            match record.status {
                EscrowStatus::Pending => totals.pending += record.amount,
                EscrowStatus::InEscrow | EscrowStatus::Verified => totals.held += record.amount,
                EscrowStatus::Released => totals.released += record.amount,
                EscrowStatus::Refunded => totals.refunded += record.amount,
                EscrowStatus::Disputed => totals.disputed += record.amount,
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::PaymentId;

    fn record(minor: i64, status: EscrowStatus) -> PaymentRecord {
        let mut record = PaymentRecord::open(
            PaymentId::generate(),
            "p".into(),
            Amount::from_minor(minor),
            "c".into(),
            "d".into(),
            Utc::now(),
        );
        record.status = status;
        record
    }

    #[test]
    fn empty_ledger_totals_to_zero() {
        let records: Vec<PaymentRecord> = Vec::new();
        let totals = EscrowTotals::from_records(&records);
        assert_eq!(totals, EscrowTotals::default());
        assert_eq!(totals.payments, 0);
        assert_eq!(totals.held, Amount::ZERO);
    }

    #[test]
    fn buckets_sum_by_status() {
        let records = vec![
            record(100, EscrowStatus::Pending),
            record(200, EscrowStatus::InEscrow),
            record(300, EscrowStatus::Verified),
            record(400, EscrowStatus::Released),
            record(500, EscrowStatus::Refunded),
            record(600, EscrowStatus::Disputed),
            record(700, EscrowStatus::InEscrow),
        ];
        let totals = EscrowTotals::from_records(&records);

        assert_eq!(totals.payments, 7);
        assert_eq!(totals.pending, Amount::from_minor(100));
        // held covers escrowed and verified funds alike
        assert_eq!(totals.held, Amount::from_minor(1200));
        assert_eq!(totals.released, Amount::from_minor(400));
        assert_eq!(totals.refunded, Amount::from_minor(500));
        assert_eq!(totals.disputed, Amount::from_minor(600));
        assert_eq!(totals.counts[&EscrowStatus::InEscrow], 2);
        assert_eq!(totals.counts[&EscrowStatus::Verified], 1);
        assert_eq!(totals.counts.get(&EscrowStatus::Pending), Some(&1));
    }

    #[test]
    fn totals_serialize_with_status_keys() {
        let records = vec![record(100, EscrowStatus::InEscrow)];
        let json = serde_json::to_value(EscrowTotals::from_records(&records)).unwrap();
        assert_eq!(json["payments"], 1);
        assert_eq!(json["held"], 100);
        assert_eq!(json["counts"]["in_escrow"], 1);
    }
}
