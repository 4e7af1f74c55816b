use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::{RecordId, TableOid, TxnId};

use super::lock_manager::LockMode;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Two-phase locking lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// What a write did, so the executor can undo it on rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRecordKind {
    Insert,
    Delete,
    Update,
}

/// One entry of a transaction's write set. The storage core records these
/// and hands them back on abort; interpreting them (undoing tuple changes)
/// is the executor's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub table_oid: TableOid,
    pub rid: RecordId,
    pub kind: WriteRecordKind,
}

/// Which locks a transaction currently holds, one bucket per mode.
#[derive(Debug, Default)]
struct LockSets {
    shared_tables: HashSet<TableOid>,
    exclusive_tables: HashSet<TableOid>,
    intention_shared_tables: HashSet<TableOid>,
    intention_exclusive_tables: HashSet<TableOid>,
    shared_intention_exclusive_tables: HashSet<TableOid>,
    shared_rows: HashMap<TableOid, HashSet<RecordId>>,
    exclusive_rows: HashMap<TableOid, HashSet<RecordId>>,
}

impl LockSets {
    fn table_set(&mut self, mode: LockMode) -> &mut HashSet<TableOid> {
        match mode {
            LockMode::Shared => &mut self.shared_tables,
            LockMode::Exclusive => &mut self.exclusive_tables,
            LockMode::IntentionShared => &mut self.intention_shared_tables,
            LockMode::IntentionExclusive => &mut self.intention_exclusive_tables,
            LockMode::SharedIntentionExclusive => &mut self.shared_intention_exclusive_tables,
        }
    }

    fn row_set(&mut self, mode: LockMode) -> &mut HashMap<TableOid, HashSet<RecordId>> {
        match mode {
            LockMode::Shared => &mut self.shared_rows,
            LockMode::Exclusive => &mut self.exclusive_rows,
            _ => unreachable!("row locks are shared or exclusive only"),
        }
    }
}

/// A transaction: identity, isolation level, 2PL state and lock
/// bookkeeping. Shared across the thread running the transaction and the
/// deadlock detector, hence the interior locking.
pub struct Transaction {
    txn_id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    lock_sets: Mutex<LockSets>,
    write_set: Mutex<Vec<WriteRecord>>,
}

impl Transaction {
    pub fn new(txn_id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            txn_id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            lock_sets: Mutex::new(LockSets::default()),
            write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    /// The mode of the table lock held on `oid`, if any. A transaction
    /// holds at most one table lock per table.
    pub fn table_lock_mode(&self, oid: TableOid) -> Option<LockMode> {
        let sets = self.lock_sets.lock();
        if sets.exclusive_tables.contains(&oid) {
            Some(LockMode::Exclusive)
        } else if sets.shared_intention_exclusive_tables.contains(&oid) {
            Some(LockMode::SharedIntentionExclusive)
        } else if sets.intention_exclusive_tables.contains(&oid) {
            Some(LockMode::IntentionExclusive)
        } else if sets.shared_tables.contains(&oid) {
            Some(LockMode::Shared)
        } else if sets.intention_shared_tables.contains(&oid) {
            Some(LockMode::IntentionShared)
        } else {
            None
        }
    }

    /// The mode of the row lock held on `(oid, rid)`, if any.
    pub fn row_lock_mode(&self, oid: TableOid, rid: RecordId) -> Option<LockMode> {
        let sets = self.lock_sets.lock();
        if sets
            .exclusive_rows
            .get(&oid)
            .is_some_and(|rows| rows.contains(&rid))
        {
            Some(LockMode::Exclusive)
        } else if sets
            .shared_rows
            .get(&oid)
            .is_some_and(|rows| rows.contains(&rid))
        {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    pub fn insert_table_lock(&self, mode: LockMode, oid: TableOid) {
        self.lock_sets.lock().table_set(mode).insert(oid);
    }

    pub fn remove_table_lock(&self, mode: LockMode, oid: TableOid) {
        self.lock_sets.lock().table_set(mode).remove(&oid);
    }

    pub fn insert_row_lock(&self, mode: LockMode, oid: TableOid, rid: RecordId) {
        self.lock_sets
            .lock()
            .row_set(mode)
            .entry(oid)
            .or_default()
            .insert(rid);
    }

    pub fn remove_row_lock(&self, mode: LockMode, oid: TableOid, rid: RecordId) {
        let mut sets = self.lock_sets.lock();
        if let Some(rows) = sets.row_set(mode).get_mut(&oid) {
            rows.remove(&rid);
        }
    }

    /// True while any row lock under `oid` is still held.
    pub fn has_row_locks_on(&self, oid: TableOid) -> bool {
        let sets = self.lock_sets.lock();
        sets.shared_rows.get(&oid).is_some_and(|rows| !rows.is_empty())
            || sets
                .exclusive_rows
                .get(&oid)
                .is_some_and(|rows| !rows.is_empty())
    }

    /// Snapshot of every held table lock.
    pub fn held_table_locks(&self) -> Vec<TableOid> {
        let sets = self.lock_sets.lock();
        sets.shared_tables
            .iter()
            .chain(sets.exclusive_tables.iter())
            .chain(sets.intention_shared_tables.iter())
            .chain(sets.intention_exclusive_tables.iter())
            .chain(sets.shared_intention_exclusive_tables.iter())
            .copied()
            .collect()
    }

    /// Snapshot of every held row lock.
    pub fn held_row_locks(&self) -> Vec<(TableOid, RecordId)> {
        let sets = self.lock_sets.lock();
        sets.shared_rows
            .iter()
            .chain(sets.exclusive_rows.iter())
            .flat_map(|(&oid, rows)| rows.iter().map(move |&rid| (oid, rid)))
            .collect()
    }

    pub fn append_write_record(&self, record: WriteRecord) {
        self.write_set.lock().push(record);
    }

    /// Drains the write set, newest first, for the rollback pass.
    pub fn take_write_set(&self) -> Vec<WriteRecord> {
        let mut records = std::mem::take(&mut *self.write_set.lock());
        records.reverse();
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId};

    fn rid(n: u32) -> RecordId {
        RecordId::new(PageId::new(n), SlotId::new(0))
    }

    #[test]
    fn test_transaction_initial_state() {
        let txn = Transaction::new(TxnId::new(1), IsolationLevel::RepeatableRead);
        assert_eq!(txn.state(), TransactionState::Growing);
        assert_eq!(txn.isolation_level(), IsolationLevel::RepeatableRead);
        assert_eq!(txn.table_lock_mode(1), None);
    }

    #[test]
    fn test_transaction_lock_set_bookkeeping() {
        let txn = Transaction::new(TxnId::new(1), IsolationLevel::RepeatableRead);

        txn.insert_table_lock(LockMode::IntentionExclusive, 1);
        assert_eq!(txn.table_lock_mode(1), Some(LockMode::IntentionExclusive));

        txn.insert_row_lock(LockMode::Exclusive, 1, rid(10));
        assert_eq!(txn.row_lock_mode(1, rid(10)), Some(LockMode::Exclusive));
        assert!(txn.has_row_locks_on(1));
        assert!(!txn.has_row_locks_on(2));

        txn.remove_row_lock(LockMode::Exclusive, 1, rid(10));
        assert!(!txn.has_row_locks_on(1));

        txn.remove_table_lock(LockMode::IntentionExclusive, 1);
        assert_eq!(txn.table_lock_mode(1), None);
    }

    #[test]
    fn test_transaction_write_set_drains_newest_first() {
        let txn = Transaction::new(TxnId::new(1), IsolationLevel::ReadCommitted);

        txn.append_write_record(WriteRecord {
            table_oid: 1,
            rid: rid(1),
            kind: WriteRecordKind::Insert,
        });
        txn.append_write_record(WriteRecord {
            table_oid: 1,
            rid: rid(2),
            kind: WriteRecordKind::Delete,
        });

        let drained = txn.take_write_set();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].rid, rid(2));
        assert!(txn.take_write_set().is_empty());
    }
}
