//! The escrow service: lifecycle transitions over the payment ledger.
//!
//! [`EscrowService`] owns the ledger and is the sole authority on transition
//! legality. The synchronous core (`apply`, `execute`) takes `&mut self`, so
//! an embedder gets at-most-one in-flight transition by construction; the
//! async [`EscrowService::run`] loop serves the same guarantee to concurrent
//! callers by draining a request stream on a single task.

pub mod error;
pub mod state;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::actions::role_may_request;
use crate::amount::Amount;
use crate::ledger::{LedgerFilter, LedgerStore, MemoryLedger};
use crate::model::{
    Caller, Command, DeliverableInput, EscrowOp, EscrowStatus, PartyId, PaymentId, ProjectId, Role,
};

pub use error::{EscrowError, RequestError};
pub use state::{Deliverable, PaymentRecord, VerificationState};

/// A unit of work for the service actor. Replies travel back over the
/// bundled oneshot; a dropped receiver just discards the answer.
#[derive(Debug)]
pub enum Request {
    Execute {
        caller: Caller,
        command: Command,
        reply: oneshot::Sender<Result<PaymentRecord, RequestError>>,
    },
    Get {
        id: PaymentId,
        reply: oneshot::Sender<Result<PaymentRecord, EscrowError>>,
    },
    Search {
        filter: LedgerFilter,
        reply: oneshot::Sender<Vec<PaymentRecord>>,
    },
}

#[derive(Debug, Default)]
pub struct EscrowService<S = MemoryLedger> {
    ledger: S,
}

impl EscrowService<MemoryLedger> {
    pub fn in_memory() -> Self {
        EscrowService::new(MemoryLedger::new())
    }
}

/// Public API
impl<S: LedgerStore> EscrowService<S> {
    pub fn new(ledger: S) -> Self {
        EscrowService { ledger }
    }

    /// Apply a transition, returning the updated record. Role policy is not
    /// consulted here; use [`EscrowService::execute`] for caller-attributed
    /// requests.
    pub fn apply(&mut self, command: Command) -> Result<PaymentRecord, EscrowError> {
        let op = command.op();
        let result = match command {
            Command::Create {
                project_id,
                amount,
                client_id,
                developer_id,
            } => self.create(project_id, amount, client_id, developer_id),
            Command::Fund { id } => self.fund(id),
            Command::MarkDelivered { id, deliverables } => self.mark_delivered(id, deliverables),
            Command::ClientVerify { id } => self.client_verify(id),
            Command::AdminVerify { id } => self.admin_verify(id),
            Command::VerifyDeliverable { id, index } => self.verify_deliverable(id, index),
            Command::Release { id } => self.release(id),
            Command::Refund { id } => self.refund(id),
            Command::Dispute { id } => self.dispute(id),
        };
        match &result {
            Ok(record) => {
                info!(op = %op, id = %record.id, status = %record.status, "transition applied")
            }
            Err(err) => info!(op = %op, reason = %err, "transition rejected"),
        }
        result
    }

    /// Authorize and apply a caller-attributed request.
    pub fn execute(
        &mut self,
        caller: &Caller,
        command: Command,
    ) -> Result<PaymentRecord, RequestError> {
        if let Err(err) = self.authorize(caller, &command) {
            info!(
                caller = %caller.id,
                role = %caller.role,
                op = %command.op(),
                id = ?command.payment_id(),
                reason = %err,
                "request refused"
            );
            return Err(err);
        }
        Ok(self.apply(command)?)
    }

    pub fn payment(&self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.ledger.get(id).ok_or(EscrowError::NotFound(id))
    }

    pub fn search(&self, filter: &LedgerFilter) -> Vec<PaymentRecord> {
        self.ledger.search(filter)
    }

    /// Serve requests until the stream ends. Run on a dedicated task this
    /// is the single writer: requests against the same payment are applied
    /// in arrival order and can never interleave.
    pub async fn run<R>(&mut self, mut requests: R)
    where
        R: Stream<Item = Request> + Unpin,
    {
        while let Some(request) = requests.next().await {
            match request {
                Request::Execute {
                    caller,
                    command,
                    reply,
                } => {
                    let _ = reply.send(self.execute(&caller, command));
                }
                Request::Get { id, reply } => {
                    let _ = reply.send(self.payment(id));
                }
                Request::Search { filter, reply } => {
                    let _ = reply.send(self.search(&filter));
                }
            }
        }
        info!("request stream closed, escrow service stopping");
    }
}

/// Private API
impl<S: LedgerStore> EscrowService<S> {
    /// Role policy plus counterparty identity. Client and developer callers
    /// must be the matching party on the record; admins act on any record.
    fn authorize(&self, caller: &Caller, command: &Command) -> Result<(), RequestError> {
        let op = command.op();
        if !role_may_request(caller.role, op) {
            return Err(RequestError::RoleNotAllowed {
                role: caller.role,
                op,
            });
        }
        match command {
            Command::Create { client_id, .. } => {
                if &caller.id != client_id {
                    return Err(RequestError::NotCounterparty {
                        caller: caller.id.clone(),
                        role: Role::Client,
                    });
                }
            }
            Command::Fund { id } | Command::ClientVerify { id } | Command::Dispute { id } => {
                let record = self.payment(*id)?;
                if caller.id != record.client_id {
                    return Err(RequestError::NotCounterparty {
                        caller: caller.id.clone(),
                        role: Role::Client,
                    });
                }
            }
            Command::MarkDelivered { id, .. } => {
                let record = self.payment(*id)?;
                if caller.id != record.developer_id {
                    return Err(RequestError::NotCounterparty {
                        caller: caller.id.clone(),
                        role: Role::Developer,
                    });
                }
            }
            Command::AdminVerify { .. }
            | Command::VerifyDeliverable { .. }
            | Command::Release { .. }
            | Command::Refund { .. } => {}
        }
        Ok(())
    }

    /// Shared read-modify-write: fetch, guard and mutate through `f`, stamp
    /// `updated_at`, commit. A rejection from `f` commits nothing.
    fn transition(
        &mut self,
        id: PaymentId,
        f: impl FnOnce(&mut PaymentRecord, DateTime<Utc>) -> Result<(), EscrowError>,
    ) -> Result<PaymentRecord, EscrowError> {
        let mut record = self.ledger.get(id).ok_or(EscrowError::NotFound(id))?;
        let now = Utc::now();
        f(&mut record, now)?;
        record.updated_at = now;
        self.ledger.put(record.clone());
        Ok(record)
    }

    fn create(
        &mut self,
        project_id: ProjectId,
        amount: Amount,
        client_id: PartyId,
        developer_id: PartyId,
    ) -> Result<PaymentRecord, EscrowError> {
        if !amount.is_positive() {
            return Err(EscrowError::InvalidArgument(format!(
                "amount must be positive, got {amount}"
            )));
        }
        // One active escrow per project: the rejection names the record
        // already holding it.
        if let Some(existing) = self.ledger.active_for_project(&project_id) {
            return Err(EscrowError::InvalidState {
                op: EscrowOp::Create,
                id: existing.id,
                status: existing.status,
            });
        }
        let record = PaymentRecord::open(
            PaymentId::generate(),
            project_id,
            amount,
            client_id,
            developer_id,
            Utc::now(),
        );
        self.ledger.put(record.clone());
        Ok(record)
    }

    fn fund(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, _| {
            if record.status != EscrowStatus::Pending {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::Fund,
                    id,
                    status: record.status,
                });
            }
            record.status = EscrowStatus::InEscrow;
            Ok(())
        })
    }

    fn mark_delivered(
        &mut self,
        id: PaymentId,
        deliverables: Vec<DeliverableInput>,
    ) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, now| {
            if record.status != EscrowStatus::InEscrow {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::MarkDelivered,
                    id,
                    status: record.status,
                });
            }
            record.verification.record_delivery(deliverables, now);
            Ok(())
        })
    }

    fn client_verify(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, now| {
            if record.status != EscrowStatus::InEscrow {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::ClientVerify,
                    id,
                    status: record.status,
                });
            }
            if !record.verification.developer_delivered {
                return Err(EscrowError::PreconditionUnmet {
                    op: EscrowOp::ClientVerify,
                    id,
                    missing: "developer has not delivered",
                });
            }
            record.verification.confirm_client(now);
            Ok(())
        })
    }

    fn admin_verify(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, now| {
            if record.status != EscrowStatus::InEscrow {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::AdminVerify,
                    id,
                    status: record.status,
                });
            }
            if !record.verification.client_verified {
                return Err(EscrowError::PreconditionUnmet {
                    op: EscrowOp::AdminVerify,
                    id,
                    missing: "client has not verified",
                });
            }
            record.verification.confirm_admin(now);
            record.status = EscrowStatus::Verified;
            Ok(())
        })
    }

    fn verify_deliverable(
        &mut self,
        id: PaymentId,
        index: usize,
    ) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, _| {
            if record.is_terminal() {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::VerifyDeliverable,
                    id,
                    status: record.status,
                });
            }
            let count = record.verification.deliverables.len();
            if !record.verification.verify_deliverable(index) {
                return Err(EscrowError::InvalidArgument(format!(
                    "deliverable index {index} out of range, record has {count}"
                )));
            }
            Ok(())
        })
    }

    fn release(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, _| {
            // Valid from in_escrow as well: admin release without full
            // verification is an intentional escape hatch.
            if !matches!(
                record.status,
                EscrowStatus::InEscrow | EscrowStatus::Verified
            ) {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::Release,
                    id,
                    status: record.status,
                });
            }
            record.status = EscrowStatus::Released;
            Ok(())
        })
    }

    fn refund(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, _| {
            if record.status != EscrowStatus::InEscrow {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::Refund,
                    id,
                    status: record.status,
                });
            }
            record.status = EscrowStatus::Refunded;
            Ok(())
        })
    }

    fn dispute(&mut self, id: PaymentId) -> Result<PaymentRecord, EscrowError> {
        self.transition(id, |record, _| {
            if record.status != EscrowStatus::InEscrow {
                return Err(EscrowError::InvalidState {
                    op: EscrowOp::Dispute,
                    id,
                    status: record.status,
                });
            }
            record.status = EscrowStatus::Disputed;
            Ok(())
        })
    }
}
