//! Action resolver: which transitions a role may ask for right now.
//!
//! A pure projection over `(record, role)`. The state machine stays the
//! sole authority on legality; this table answers the narrower question of
//! what to offer a caller next, and doubles as the authorization policy the
//! hosting layer enforces before invoking the machine. Unlisted
//! combinations resolve to no actions.

use crate::escrow::state::PaymentRecord;
use crate::model::{EscrowOp, EscrowStatus, Role};

/// Transitions the given role may request against the record as it stands.
pub fn permitted_actions(record: &PaymentRecord, role: Role) -> Vec<EscrowOp> {
    use EscrowOp::*;

    let verification = &record.verification;
    match (record.status, role) {
        (EscrowStatus::Pending, Role::Client) => vec![Fund],

        (EscrowStatus::InEscrow, Role::Developer) if !verification.developer_delivered => {
            vec![MarkDelivered]
        }
        (EscrowStatus::InEscrow, Role::Client)
            if verification.developer_delivered && !verification.client_verified =>
        {
            vec![ClientVerify, Dispute]
        }
        (EscrowStatus::InEscrow, Role::Admin)
            if verification.client_verified && !verification.admin_verified =>
        {
            vec![AdminVerify, Release, Refund]
        }

        (EscrowStatus::Verified, Role::Admin) => vec![Release],

        _ => Vec::new(),
    }
}

/// The role column of the policy table: may this role ever request the
/// operation? Whether the record's state admits it right now stays with the
/// state machine, so callers still see state rejections as such.
pub fn role_may_request(role: Role, op: EscrowOp) -> bool {
    use EscrowOp::*;

    match op {
        Create | Fund | ClientVerify | Dispute => role == Role::Client,
        MarkDelivered => role == Role::Developer,
        AdminVerify | VerifyDeliverable | Release | Refund => role == Role::Admin,
    }
}

/// Human-readable settlement line for terminal records, `None` otherwise.
pub fn settlement_message(record: &PaymentRecord) -> Option<String> {
    let line = match record.status {
        EscrowStatus::Released => format!(
            "Funds of {} released to developer {}.",
            record.amount, record.developer_id
        ),
        EscrowStatus::Refunded => format!(
            "Funds of {} refunded to client {}.",
            record.amount, record.client_id
        ),
        EscrowStatus::Disputed => format!(
            "Payment of {} is frozen pending dispute resolution.",
            record.amount
        ),
        _ => return None,
    };
    Some(line)
}

/// Short badge text UIs render next to the offered actions.
pub fn status_label(status: EscrowStatus) -> &'static str {
    match status {
        EscrowStatus::Pending => "Awaiting funding",
        EscrowStatus::InEscrow => "In escrow",
        EscrowStatus::Verified => "Verified",
        EscrowStatus::Released => "Released",
        EscrowStatus::Refunded => "Refunded",
        EscrowStatus::Disputed => "Disputed",
    }
}
