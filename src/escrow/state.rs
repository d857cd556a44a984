//! Payment record state: the escrow agreement, its verification trail and
//! the deliverables submitted against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::model::{DeliverableInput, EscrowStatus, PartyId, PaymentId, ProjectId};

/// A submitted deliverable and its per-item verification flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub name: String,
    pub url: String,
    pub verified: bool,
}

impl From<DeliverableInput> for Deliverable {
    fn from(input: DeliverableInput) -> Self {
        Deliverable {
            name: input.name,
            url: input.url,
            verified: false,
        }
    }
}

/// Verification trail attached to every payment record.
///
/// The three confirmations gate the happy path: delivery before client
/// verification, client verification before admin verification. Timestamps
/// are set exactly when the matching flag flips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationState {
    pub developer_delivered: bool,
    pub developer_delivered_at: Option<DateTime<Utc>>,
    pub client_verified: bool,
    pub client_verified_at: Option<DateTime<Utc>>,
    pub admin_verified: bool,
    pub admin_verified_at: Option<DateTime<Utc>>,
    pub deliverables: Vec<Deliverable>,
}

impl VerificationState {
    /// Record a delivery. A repeat delivery replaces the deliverable list
    /// and restamps the delivery time.
    pub fn record_delivery(&mut self, items: Vec<DeliverableInput>, at: DateTime<Utc>) {
        self.developer_delivered = true;
        self.developer_delivered_at = Some(at);
        self.deliverables = items.into_iter().map(Deliverable::from).collect();
    }

    pub fn confirm_client(&mut self, at: DateTime<Utc>) {
        self.client_verified = true;
        self.client_verified_at = Some(at);
    }

    pub fn confirm_admin(&mut self, at: DateTime<Utc>) {
        self.admin_verified = true;
        self.admin_verified_at = Some(at);
    }

    /// Flag a single deliverable as verified. Returns `false` when the
    /// index is out of range.
    pub fn verify_deliverable(&mut self, index: usize) -> bool {
        match self.deliverables.get_mut(index) {
            Some(item) => {
                item.verified = true;
                true
            }
            None => false,
        }
    }
}

/// One escrow agreement: identity of both counterparties, the amount held,
/// the lifecycle status and the verification trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub project_id: ProjectId,
    pub amount: Amount,
    pub client_id: PartyId,
    pub developer_id: PartyId,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verification: VerificationState,
}

impl PaymentRecord {
    /// Open a new agreement. Records start `pending`, before any deposit.
    pub fn open(
        id: PaymentId,
        project_id: ProjectId,
        amount: Amount,
        client_id: PartyId,
        developer_id: PartyId,
        at: DateTime<Utc>,
    ) -> Self {
        PaymentRecord {
            id,
            project_id,
            amount,
            client_id,
            developer_id,
            status: EscrowStatus::Pending,
            created_at: at,
            updated_at: at,
            verification: VerificationState::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
