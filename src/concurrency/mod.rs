pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

pub use lock_manager::{
    can_lock_upgrade, locks_compatible, spawn_deadlock_detector, DeadlockDetector, LockManager,
    LockMode,
};
pub use transaction::{
    IsolationLevel, Transaction, TransactionState, WriteRecord, WriteRecordKind,
};
pub use transaction_manager::TransactionManager;
