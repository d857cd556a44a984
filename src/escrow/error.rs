//! Rejection taxonomy for escrow transitions.

use thiserror::Error;

use crate::model::{EscrowOp, EscrowStatus, PartyId, PaymentId, Role};

/// Why the state machine refused a transition.
///
/// Every rejection names the operation and the record it targeted, so a
/// caller can log or surface it without extra lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// The referenced payment record does not exist.
    #[error("payment {0} not found")]
    NotFound(PaymentId),

    /// The record is not in a status from which the operation may run.
    #[error("cannot {op} payment {id} while it is {status}")]
    InvalidState {
        op: EscrowOp,
        id: PaymentId,
        status: EscrowStatus,
    },

    /// The status admits the operation but a verification gate is missing.
    #[error("cannot {op} payment {id}: {missing}")]
    PreconditionUnmet {
        op: EscrowOp,
        id: PaymentId,
        missing: &'static str,
    },

    /// The request payload itself is malformed.
    #[error("{0}")]
    InvalidArgument(String),
}

impl EscrowError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EscrowError::NotFound(_) => "not_found",
            EscrowError::InvalidState { .. } => "invalid_state",
            EscrowError::PreconditionUnmet { .. } => "precondition_unmet",
            EscrowError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Why a caller-attributed request was refused. Wraps [`EscrowError`] and
/// adds the authorization failures the state machine itself never sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The caller's role never performs this operation.
    #[error("role {role} may not {op} this payment")]
    RoleNotAllowed { role: Role, op: EscrowOp },

    /// The caller's role is acceptable but the caller is not the matching
    /// counterparty on the record.
    #[error("{caller} is not the {role} on this payment")]
    NotCounterparty { caller: PartyId, role: Role },

    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::RoleNotAllowed { .. } | RequestError::NotCounterparty { .. } => {
                "forbidden"
            }
            RequestError::Escrow(inner) => inner.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_op_and_status() {
        let id = PaymentId::generate();
        let err = EscrowError::InvalidState {
            op: EscrowOp::Release,
            id,
            status: EscrowStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            format!("cannot release payment {id} while it is pending")
        );
        assert_eq!(err.code(), "invalid_state");

        let err = EscrowError::PreconditionUnmet {
            op: EscrowOp::ClientVerify,
            id,
            missing: "developer has not delivered",
        };
        assert_eq!(
            err.to_string(),
            format!("cannot client_verify payment {id}: developer has not delivered")
        );
        assert_eq!(err.code(), "precondition_unmet");
    }

    #[test]
    fn request_error_codes() {
        let err = RequestError::RoleNotAllowed {
            role: Role::Developer,
            op: EscrowOp::Release,
        };
        assert_eq!(err.code(), "forbidden");

        let err = RequestError::from(EscrowError::NotFound(PaymentId::generate()));
        assert_eq!(err.code(), "not_found");
    }
}
