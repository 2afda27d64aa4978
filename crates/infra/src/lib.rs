//! Postgres persistence.
//!
//! Every store here leans on the database for coordination instead of
//! in-process locks: guarded conditional updates for order transitions, a
//! unique key for idempotent event recording, and `FOR UPDATE SKIP LOCKED`
//! claiming for the outbox. Queries use runtime binding so the crate builds
//! without a live database.

mod error;
mod ledger;
mod order_store;
mod outbox;
mod schema;

pub use error::{map_sqlx_error, is_unique_violation, StoreError};
pub use ledger::{LedgerInsert, NewPaymentEvent, PaymentEventLedger};
pub use order_store::{OrderStore, TransitionResult};
pub use outbox::{EnqueueResult, NewOutboxEntry, OutboxEntry, OutboxStore, SyncStatus};
pub use schema::ensure_schema;
