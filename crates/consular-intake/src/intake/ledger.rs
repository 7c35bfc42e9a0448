use super::booking::BookingId;
use super::domain::SagaRecord;

/// Idempotency ledger keyed by booking identifier.
///
/// The two downstream systems share no transaction log, so this ledger is
/// the only place that knows how far an attempt got. The saga engine
/// consults it to decide whether a retry may reuse an identifier (no ack
/// ever seen) or must skip recording entirely (ack seen, never re-record).
/// The trait is the seam for a durable table; tests and the default
/// deployment use an in-memory map.
pub trait SagaLedger: Send + Sync {
    /// Insert a fresh row. A duplicate booking id is a conflict.
    fn begin(&self, record: SagaRecord) -> Result<(), LedgerError>;

    fn fetch(&self, id: &BookingId) -> Result<Option<SagaRecord>, LedgerError>;

    /// Replace an existing row; absent rows are an error, never an upsert.
    fn update(&self, record: SagaRecord) -> Result<(), LedgerError>;

    /// Mark a row busy for the duration of one submit. A second submit for
    /// the same booking id while the first is in flight is refused.
    fn acquire(&self, id: &BookingId) -> Result<(), LedgerError>;

    fn release(&self, id: &BookingId) -> Result<(), LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("booking already exists in the ledger")]
    Conflict,
    #[error("booking not found in the ledger")]
    NotFound,
    #[error("booking has a submission in flight")]
    Busy,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}
