//! Record storage behind the escrow service.
//!
//! The service talks to storage through [`LedgerStore`] so the in-memory
//! ledger can be swapped for a durable one without touching the state
//! machine. Records are only ever inserted or overwritten, never deleted:
//! terminal records stay queryable as the audit trail.

use std::collections::BTreeMap;

use crate::escrow::state::PaymentRecord;
use crate::model::{PartyId, PaymentId, ProjectId};

/// Query shapes the ledger answers. Lookups match on exact identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerFilter {
    All,
    Project(ProjectId),
    Client(PartyId),
    Developer(PartyId),
}

pub trait LedgerStore {
    /// Fetch a record by id.
    fn get(&self, id: PaymentId) -> Option<PaymentRecord>;

    /// Insert or overwrite a record under its own id.
    fn put(&mut self, record: PaymentRecord);

    /// All records for a project, oldest first.
    fn by_project(&self, project: &ProjectId) -> Vec<PaymentRecord>;

    /// All records where the party is the client, oldest first.
    fn by_client(&self, client: &PartyId) -> Vec<PaymentRecord>;

    /// All records where the party is the developer, oldest first.
    fn by_developer(&self, developer: &PartyId) -> Vec<PaymentRecord>;

    /// Every record, oldest first.
    fn all(&self) -> Vec<PaymentRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, filter: &LedgerFilter) -> Vec<PaymentRecord> {
        match filter {
            LedgerFilter::All => self.all(),
            LedgerFilter::Project(project) => self.by_project(project),
            LedgerFilter::Client(client) => self.by_client(client),
            LedgerFilter::Developer(developer) => self.by_developer(developer),
        }
    }

    /// The non-terminal record of a project, if one exists. A project has
    /// at most one: creation refuses while this returns `Some`.
    fn active_for_project(&self, project: &ProjectId) -> Option<PaymentRecord> {
        self.by_project(project)
            .into_iter()
            .find(|record| !record.is_terminal())
    }
}

/// Ledger held entirely in memory. Keys are UUIDv7, so map order is
/// creation order and the scan methods come out oldest first for free.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: BTreeMap<PaymentId, PaymentRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger::default()
    }

    fn scan(&self, keep: impl Fn(&PaymentRecord) -> bool) -> Vec<PaymentRecord> {
        self.records.values().filter(|r| keep(r)).cloned().collect()
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, id: PaymentId) -> Option<PaymentRecord> {
        self.records.get(&id).cloned()
    }

    fn put(&mut self, record: PaymentRecord) {
        self.records.insert(record.id, record);
    }

    fn by_project(&self, project: &ProjectId) -> Vec<PaymentRecord> {
        self.scan(|r| &r.project_id == project)
    }

    fn by_client(&self, client: &PartyId) -> Vec<PaymentRecord> {
        self.scan(|r| &r.client_id == client)
    }

    fn by_developer(&self, developer: &PartyId) -> Vec<PaymentRecord> {
        self.scan(|r| &r.developer_id == developer)
    }

    fn all(&self) -> Vec<PaymentRecord> {
        self.records.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::amount::Amount;
    use crate::model::EscrowStatus;

    fn record(project: &str, client: &str, developer: &str) -> PaymentRecord {
        PaymentRecord::open(
            PaymentId::generate(),
            project.into(),
            Amount::from_minor(100_00),
            client.into(),
            developer.into(),
            Utc::now(),
        )
    }

    #[test]
    fn put_then_get_roundtrips() {
        let mut ledger = MemoryLedger::new();
        let rec = record("p1", "c1", "d1");
        let id = rec.id;
        ledger.put(rec.clone());

        assert_eq!(ledger.get(id), Some(rec));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(PaymentId::generate()).is_none());
    }

    #[test]
    fn put_overwrites_in_place() {
        let mut ledger = MemoryLedger::new();
        let mut rec = record("p1", "c1", "d1");
        ledger.put(rec.clone());

        rec.status = EscrowStatus::InEscrow;
        ledger.put(rec.clone());

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(rec.id).unwrap().status, EscrowStatus::InEscrow);
    }

    #[test]
    fn scans_filter_by_party_in_creation_order() {
        let mut ledger = MemoryLedger::new();
        let first = record("p1", "alice", "dana");
        let second = record("p2", "alice", "erin");
        let third = record("p3", "bob", "dana");
        for rec in [&first, &second, &third] {
            ledger.put(rec.clone());
        }

        let alices = ledger.by_client(&"alice".into());
        assert_eq!(alices.len(), 2);
        assert_eq!(alices[0].id, first.id);
        assert_eq!(alices[1].id, second.id);

        let danas = ledger.by_developer(&"dana".into());
        assert_eq!(danas.len(), 2);
        assert_eq!(danas[0].id, first.id);
        assert_eq!(danas[1].id, third.id);

        assert_eq!(ledger.by_project(&"p2".into()).len(), 1);
        assert_eq!(ledger.all().len(), 3);
    }

    #[test]
    fn active_for_project_skips_terminal_records() {
        let mut ledger = MemoryLedger::new();
        let mut done = record("p1", "c1", "d1");
        done.status = EscrowStatus::Released;
        ledger.put(done);

        assert!(ledger.active_for_project(&"p1".into()).is_none());

        let open = record("p1", "c1", "d2");
        ledger.put(open.clone());
        let active = ledger.active_for_project(&"p1".into()).unwrap();
        assert_eq!(active.id, open.id);
    }

    #[test]
    fn search_dispatches_on_filter() {
        let mut ledger = MemoryLedger::new();
        ledger.put(record("p1", "c1", "d1"));
        ledger.put(record("p2", "c2", "d1"));

        assert_eq!(ledger.search(&LedgerFilter::All).len(), 2);
        assert_eq!(
            ledger.search(&LedgerFilter::Client("c2".into())).len(),
            1
        );
        assert_eq!(
            ledger.search(&LedgerFilter::Developer("d1".into())).len(),
            2
        );
        assert_eq!(
            ledger.search(&LedgerFilter::Project("p3".into())).len(),
            0
        );
    }
}
