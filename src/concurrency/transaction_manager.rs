use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{Result, TxnId};

use super::lock_manager::LockManager;
use super::transaction::{IsolationLevel, Transaction, TransactionState};

/// Hands out transactions and drives their completion. Commit and abort
/// both release every lock the transaction still holds (strict 2PL); the
/// registry of running transactions is what the deadlock detector uses to
/// reach its victims.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    txn_map: Mutex<HashMap<TxnId, Arc<Transaction>>>,
    lock_manager: Arc<LockManager>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(0),
            txn_map: Mutex::new(HashMap::new()),
            lock_manager,
        }
    }

    /// Starts a new transaction at the given isolation level.
    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.txn_map.lock().insert(txn_id, Arc::clone(&txn));
        debug!("begin {} at {:?}", txn_id, isolation_level);
        txn
    }

    /// Commits: releases all held locks, then marks the transaction
    /// committed and deregisters it.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<()> {
        self.release_locks(txn)?;
        txn.set_state(TransactionState::Committed);
        self.txn_map.lock().remove(&txn.txn_id());
        debug!("commit {}", txn.txn_id());
        Ok(())
    }

    /// Aborts: releases all held locks and hands the write set back for
    /// the executor's undo pass, then deregisters the transaction.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<()> {
        self.release_locks(txn)?;
        let undo = txn.take_write_set();
        if !undo.is_empty() {
            debug!(
                "abort {} leaves {} write records for rollback",
                txn.txn_id(),
                undo.len()
            );
        }
        txn.set_state(TransactionState::Aborted);
        self.txn_map.lock().remove(&txn.txn_id());
        debug!("abort {}", txn.txn_id());
        Ok(())
    }

    /// Looks up a running transaction by id.
    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.txn_map.lock().get(&txn_id).cloned()
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Releases every held lock: rows first (forced, so the phase rules
    /// don't fire mid-release), then tables.
    fn release_locks(&self, txn: &Arc<Transaction>) -> Result<()> {
        for (oid, rid) in txn.held_row_locks() {
            self.lock_manager.unlock_row(txn, oid, rid, true)?;
        }
        for oid in txn.held_table_locks() {
            self.lock_manager.unlock_table(txn, oid)?;
        }
        Ok(())
    }
}
