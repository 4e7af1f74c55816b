use thiserror::Error;

use super::types::{PageId, TxnId};

/// Reasons a transaction can be aborted by the lock manager.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("lock requested while in the shrinking phase")]
    LockOnShrinking,

    #[error("shared lock requested under READ_UNCOMMITTED")]
    LockSharedOnReadUncommitted,

    #[error("held lock cannot be upgraded to the requested mode")]
    IncompatibleUpgrade,

    #[error("another transaction is already upgrading on this resource")]
    UpgradeConflict,

    #[error("attempted to unlock a resource with no lock held")]
    AttemptedUnlockButNoLockHeld,

    #[error("table unlocked while row locks on it are still held")]
    TableUnlockedBeforeUnlockingRows,

    #[error("intention lock requested on a row")]
    AttemptedIntentionLockOnRow,

    #[error("row lock requested without the required table lock")]
    TableLockNotPresent,

    #[error("aborted to break a deadlock")]
    Deadlock,
}

/// Database error types
#[derive(Error, Debug)]
pub enum TarnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Transaction {txn_id} aborted: {reason}")]
    TransactionAbort { txn_id: TxnId, reason: AbortReason },
}

impl TarnError {
    /// Returns the abort reason if this error carries one.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            TarnError::TransactionAbort { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TarnError>;
