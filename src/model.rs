//! Core domain vocabulary for the escrow ledger.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use uuid::{ContextV7, Timestamp, Uuid};

use crate::Amount;

// Shared v7 clock context; the counter keeps ids strictly increasing even
// within one millisecond.
static ID_CLOCK: LazyLock<ContextV7> = LazyLock::new(ContextV7::new);

/// Payment record identifier. UUIDv7, so ids sort in creation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Allocate a fresh identifier. Generated once at record creation.
    pub fn generate() -> Self {
        PaymentId(Uuid::new_v7(Timestamp::now(&*ID_CLOCK)))
    }
}

impl From<Uuid> for PaymentId {
    fn from(value: Uuid) -> Self {
        PaymentId(value)
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the governed project. At most one active escrow per project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

/// Identifier of a financial counterparty (client or developer) or an admin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ProjectId);
string_id!(PartyId);

/// Marketplace role a caller acts as. Identity and role resolution happen
/// upstream; the escrow core only consumes the resolved pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Developer,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "client" => Some(Role::Client),
            "developer" => Some(Role::Developer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Developer => "developer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway-verified identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: PartyId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<PartyId>, role: Role) -> Self {
        Caller {
            id: id.into(),
            role,
        }
    }
}

/// Lifecycle status of a payment record.
///
/// `pending → in_escrow → {verified} → released`, with `refunded` and
/// `disputed` as alternate exits from `in_escrow`. The last three variants
/// are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Pending,
    InEscrow,
    Verified,
    Released,
    Refunded,
    Disputed,
}

impl EscrowStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EscrowStatus::Released | EscrowStatus::Refunded | EscrowStatus::Disputed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::InEscrow => "in_escrow",
            EscrowStatus::Verified => "verified",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
            EscrowStatus::Disputed => "disputed",
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition operations of the escrow lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowOp {
    Create,
    Fund,
    MarkDelivered,
    ClientVerify,
    AdminVerify,
    VerifyDeliverable,
    Release,
    Refund,
    Dispute,
}

impl EscrowOp {
    pub fn as_str(self) -> &'static str {
        match self {
            EscrowOp::Create => "create",
            EscrowOp::Fund => "fund",
            EscrowOp::MarkDelivered => "mark_delivered",
            EscrowOp::ClientVerify => "client_verify",
            EscrowOp::AdminVerify => "admin_verify",
            EscrowOp::VerifyDeliverable => "verify_deliverable",
            EscrowOp::Release => "release",
            EscrowOp::Refund => "refund",
            EscrowOp::Dispute => "dispute",
        }
    }
}

impl fmt::Display for EscrowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deliverable as submitted by the developer: name plus artifact URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableInput {
    pub name: String,
    pub url: String,
}

/// A requested transition, the possible inputs of the escrow service.
#[derive(Debug, Clone)]
pub enum Command {
    /// Open an escrow agreement for a project.
    Create {
        project_id: ProjectId,
        amount: Amount,
        client_id: PartyId,
        developer_id: PartyId,
    },
    /// Move deposited funds into escrow.
    Fund { id: PaymentId },
    /// Record developer delivery together with the submitted deliverables.
    MarkDelivered {
        id: PaymentId,
        deliverables: Vec<DeliverableInput>,
    },
    /// Client confirms the delivered work.
    ClientVerify { id: PaymentId },
    /// Admin confirms the client verification; status becomes `verified`.
    AdminVerify { id: PaymentId },
    /// Admin marks a single deliverable verified.
    VerifyDeliverable { id: PaymentId, index: usize },
    /// Pay the developer out of escrow (terminal).
    Release { id: PaymentId },
    /// Return the funds to the client (terminal).
    Refund { id: PaymentId },
    /// Freeze the escrow pending dispute resolution (terminal).
    Dispute { id: PaymentId },
}

impl Command {
    pub fn op(&self) -> EscrowOp {
        match self {
            Command::Create { .. } => EscrowOp::Create,
            Command::Fund { .. } => EscrowOp::Fund,
            Command::MarkDelivered { .. } => EscrowOp::MarkDelivered,
            Command::ClientVerify { .. } => EscrowOp::ClientVerify,
            Command::AdminVerify { .. } => EscrowOp::AdminVerify,
            Command::VerifyDeliverable { .. } => EscrowOp::VerifyDeliverable,
            Command::Release { .. } => EscrowOp::Release,
            Command::Refund { .. } => EscrowOp::Refund,
            Command::Dispute { .. } => EscrowOp::Dispute,
        }
    }

    /// The payment a command targets; `None` for `Create`.
    pub fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Command::Create { .. } => None,
            Command::Fund { id }
            | Command::MarkDelivered { id, .. }
            | Command::ClientVerify { id }
            | Command::AdminVerify { id }
            | Command::VerifyDeliverable { id, .. }
            | Command::Release { id }
            | Command::Refund { id }
            | Command::Dispute { id } => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_ids_are_unique_and_ordered() {
        let mut previous = PaymentId::generate();
        for _ in 0..1000 {
            let next = PaymentId::generate();
            assert!(previous < next);
            previous = next;
        }
    }

    #[test]
    fn role_parse_roundtrip() {
        for role in [Role::Client, Role::Developer, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("mediator"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!EscrowStatus::Pending.is_terminal());
        assert!(!EscrowStatus::InEscrow.is_terminal());
        assert!(!EscrowStatus::Verified.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
        assert!(EscrowStatus::Disputed.is_terminal());
    }

    #[test]
    fn command_op_mapping() {
        let id = PaymentId::generate();
        assert_eq!(Command::Fund { id }.op(), EscrowOp::Fund);
        assert_eq!(Command::Release { id }.op(), EscrowOp::Release);
        assert_eq!(Command::Fund { id }.payment_id(), Some(id));

        let create = Command::Create {
            project_id: "p1".into(),
            amount: Amount::from_minor(5000),
            client_id: "c1".into(),
            developer_id: "d1".into(),
        };
        assert_eq!(create.op(), EscrowOp::Create);
        assert_eq!(create.payment_id(), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&EscrowStatus::InEscrow).unwrap();
        assert_eq!(json, "\"in_escrow\"");
    }
}
