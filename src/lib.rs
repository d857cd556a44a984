//! Escrow payment lifecycle for a client/developer marketplace: a role-gated
//! state machine over funds held in trust, with verification gates before
//! release and terminal settlement outcomes.

pub mod actions;
pub mod amount;
pub mod api;
pub mod config;
pub mod escrow;
pub mod ledger;
pub mod model;
pub mod report;
pub mod summary;

pub use amount::Amount;
pub use escrow::{
    EscrowError, EscrowService, PaymentRecord, Request, RequestError, VerificationState,
};
pub use ledger::{LedgerFilter, LedgerStore, MemoryLedger};
pub use model::{
    Caller, Command, DeliverableInput, EscrowOp, EscrowStatus, PartyId, PaymentId, ProjectId, Role,
};
