use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::{AbortReason, RecordId, Result, TableOid, TarnError, TxnId};

use super::transaction::{IsolationLevel, Transaction, TransactionState};
use super::transaction_manager::TransactionManager;

/// Lock modes of the hierarchical protocol. Tables take any of the five;
/// rows take only `Shared` and `Exclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

/// Compatibility matrix of hierarchical locking: can a lock in mode `a`
/// be granted while a lock in mode `b` is held by another transaction?
pub fn locks_compatible(a: LockMode, b: LockMode) -> bool {
    use LockMode::*;
    match a {
        IntentionShared => b != Exclusive,
        IntentionExclusive => matches!(b, IntentionShared | IntentionExclusive),
        Shared => matches!(b, IntentionShared | Shared),
        SharedIntentionExclusive => b == IntentionShared,
        Exclusive => false,
    }
}

/// Upgrade matrix: IS -> {S, X, IX, SIX}, S -> {X, SIX}, IX -> {X, SIX},
/// SIX -> {X}.
pub fn can_lock_upgrade(held: LockMode, requested: LockMode) -> bool {
    use LockMode::*;
    match held {
        IntentionShared => requested != IntentionShared,
        Shared | IntentionExclusive => {
            matches!(requested, Exclusive | SharedIntentionExclusive)
        }
        SharedIntentionExclusive => requested == Exclusive,
        Exclusive => false,
    }
}

/// Whether a held lock already subsumes a requested mode, making the
/// request a no-op.
fn lock_mode_covers(held: LockMode, requested: LockMode) -> bool {
    use LockMode::*;
    held == requested
        || match held {
            Exclusive => true,
            SharedIntentionExclusive => {
                matches!(requested, Shared | IntentionShared | IntentionExclusive)
            }
            Shared | IntentionExclusive => requested == IntentionShared,
            IntentionShared => false,
        }
}

/// One entry in a wait queue.
#[derive(Debug, Clone, Copy)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

impl LockRequest {
    fn new(txn_id: TxnId, mode: LockMode) -> Self {
        Self {
            txn_id,
            mode,
            granted: false,
        }
    }
}

#[derive(Debug, Default)]
struct RequestQueue {
    /// FIFO order of arrival; an upgrading request jumps to the head of
    /// the ungranted region
    requests: VecDeque<LockRequest>,
    /// The transaction currently upgrading on this resource, if any
    upgrading: Option<TxnId>,
}

/// Wait queue for one lockable resource (a table or a row).
#[derive(Default)]
struct LockRequestQueue {
    inner: Mutex<RequestQueue>,
    cv: Condvar,
}

/// Hierarchical two-phase lock manager. Grants are FIFO per resource with
/// upgrade priority; legality of each request is checked against the
/// transaction's isolation level and 2PL phase. A separate detection pass
/// finds wait-for cycles and aborts the youngest participant.
pub struct LockManager {
    table_lock_map: Mutex<HashMap<TableOid, Arc<LockRequestQueue>>>,
    row_lock_map: Mutex<HashMap<RecordId, Arc<LockRequestQueue>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table_lock_map: Mutex::new(HashMap::new()),
            row_lock_map: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires a table lock, blocking until it is granted.
    ///
    /// Returns `Ok(true)` on grant, `Ok(false)` when the wait was
    /// abandoned because the transaction finished elsewhere, and an abort
    /// error on any legality violation (the transaction is already moved
    /// to `Aborted` when that happens).
    pub fn lock_table(&self, txn: &Transaction, mode: LockMode, oid: TableOid) -> Result<bool> {
        debug!(
            "lock_table({}, {:?}, table {}), state {:?}",
            txn.txn_id(),
            mode,
            oid,
            txn.state()
        );
        self.check_txn_can_take_lock(txn, mode)?;

        if let Some(held) = txn.table_lock_mode(oid) {
            if lock_mode_covers(held, mode) {
                return Ok(true);
            }
            if !can_lock_upgrade(held, mode) {
                return Err(Self::abort_txn(txn, AbortReason::IncompatibleUpgrade));
            }
        }

        let queue = self.table_queue(oid);
        let mut q = queue.inner.lock();
        self.enqueue_request(txn, mode, &mut q, |old_mode| {
            txn.remove_table_lock(old_mode, oid)
        })?;

        if !Self::wait_for_grant(&queue, &mut q, txn)? {
            return Ok(false);
        }
        drop(q);

        txn.insert_table_lock(mode, oid);
        Ok(true)
    }

    /// Releases a table lock. All row locks under the table must have been
    /// released first. May move the transaction into its shrinking phase
    /// depending on isolation level.
    pub fn unlock_table(&self, txn: &Transaction, oid: TableOid) -> Result<bool> {
        debug!("unlock_table({}, table {})", txn.txn_id(), oid);
        if txn.has_row_locks_on(oid) {
            return Err(Self::abort_txn(
                txn,
                AbortReason::TableUnlockedBeforeUnlockingRows,
            ));
        }
        let Some(mode) = txn.table_lock_mode(oid) else {
            return Err(Self::abort_txn(txn, AbortReason::AttemptedUnlockButNoLockHeld));
        };

        self.transition_on_unlock(txn, mode);

        let queue = self.table_lock_map.lock().get(&oid).cloned();
        if let Some(queue) = queue {
            let mut q = queue.inner.lock();
            let txn_id = txn.txn_id();
            q.requests.retain(|r| r.txn_id != txn_id);
            queue.cv.notify_all();
        }

        txn.remove_table_lock(mode, oid);
        Ok(true)
    }

    /// Acquires a row lock. Rows take only S and X, and require the
    /// matching intention (or stronger) lock on the owning table.
    pub fn lock_row(
        &self,
        txn: &Transaction,
        mode: LockMode,
        oid: TableOid,
        rid: RecordId,
    ) -> Result<bool> {
        debug!(
            "lock_row({}, {:?}, table {}, {}), state {:?}",
            txn.txn_id(),
            mode,
            oid,
            rid,
            txn.state()
        );
        if let Some(held) = txn.row_lock_mode(oid, rid) {
            if lock_mode_covers(held, mode) {
                return Ok(true);
            }
        }

        self.check_appropriate_lock_on_table(txn, oid, mode)?;
        self.check_txn_can_take_lock(txn, mode)?;

        let queue = self.row_queue(rid);
        let mut q = queue.inner.lock();
        self.enqueue_request(txn, mode, &mut q, |old_mode| {
            txn.remove_row_lock(old_mode, oid, rid)
        })?;

        if !Self::wait_for_grant(&queue, &mut q, txn)? {
            return Ok(false);
        }
        drop(q);

        txn.insert_row_lock(mode, oid, rid);
        Ok(true)
    }

    /// Releases a row lock. `force` skips the isolation-level phase
    /// transition; the commit/abort lock release uses it.
    pub fn unlock_row(
        &self,
        txn: &Transaction,
        oid: TableOid,
        rid: RecordId,
        force: bool,
    ) -> Result<bool> {
        debug!("unlock_row({}, table {}, {})", txn.txn_id(), oid, rid);
        let Some(mode) = txn.row_lock_mode(oid, rid) else {
            return Err(Self::abort_txn(txn, AbortReason::AttemptedUnlockButNoLockHeld));
        };

        if !force {
            self.transition_on_unlock(txn, mode);
        }

        let queue = self.row_lock_map.lock().get(&rid).cloned();
        if let Some(queue) = queue {
            let mut q = queue.inner.lock();
            let txn_id = txn.txn_id();
            q.requests.retain(|r| r.txn_id != txn_id);
            queue.cv.notify_all();
        }

        txn.remove_row_lock(mode, oid, rid);
        Ok(true)
    }

    /// Places a request in the queue: at the tail normally, or — for an
    /// upgrade — at the head of the ungranted region after retiring the
    /// old granted request. At most one transaction may be upgrading per
    /// queue.
    fn enqueue_request(
        &self,
        txn: &Transaction,
        mode: LockMode,
        q: &mut RequestQueue,
        remove_old_lock: impl FnOnce(LockMode),
    ) -> Result<()> {
        let txn_id = txn.txn_id();
        if let Some(pos) = q.requests.iter().position(|r| r.txn_id == txn_id) {
            debug_assert!(q.requests[pos].granted, "duplicate pending request");
            if q.upgrading.is_some() {
                return Err(Self::abort_txn(txn, AbortReason::UpgradeConflict));
            }
            q.upgrading = Some(txn_id);
            let old = q.requests.remove(pos).expect("position just found");
            remove_old_lock(old.mode);

            let insert_at = q
                .requests
                .iter()
                .position(|r| !r.granted)
                .unwrap_or(q.requests.len());
            q.requests.insert(insert_at, LockRequest::new(txn_id, mode));
        } else {
            q.requests.push_back(LockRequest::new(txn_id, mode));
        }
        Ok(())
    }

    /// Blocks on the queue's condition variable until this transaction's
    /// request is granted or the transaction is finished externally.
    /// Returns `Ok(false)`/`Err(Deadlock)` after cleaning up an abandoned
    /// request.
    fn wait_for_grant(
        queue: &LockRequestQueue,
        q: &mut MutexGuard<'_, RequestQueue>,
        txn: &Transaction,
    ) -> Result<bool> {
        let txn_id = txn.txn_id();
        loop {
            let state = txn.state();
            if state == TransactionState::Aborted || state == TransactionState::Committed {
                if q.upgrading == Some(txn_id) {
                    q.upgrading = None;
                }
                q.requests.retain(|r| r.txn_id != txn_id);
                queue.cv.notify_all();
                debug!("{} stopped waiting, state {:?}", txn_id, state);
                if state == TransactionState::Aborted {
                    return Err(TarnError::TransactionAbort {
                        txn_id,
                        reason: AbortReason::Deadlock,
                    });
                }
                return Ok(false);
            }

            if Self::grant_new_locks_if_possible(q) {
                queue.cv.notify_all();
            }

            if q.requests
                .iter()
                .any(|r| r.txn_id == txn_id && r.granted)
            {
                return Ok(true);
            }

            queue.cv.wait(q);
        }
    }

    /// Grants the maximal prefix of ungranted requests that is compatible
    /// with everything already granted. Strict FIFO: the first request
    /// that cannot be granted stops the scan. Returns whether anything was
    /// newly granted.
    fn grant_new_locks_if_possible(q: &mut RequestQueue) -> bool {
        let RequestQueue {
            requests,
            upgrading,
        } = q;

        let mut granted_modes: Vec<LockMode> =
            requests.iter().filter(|r| r.granted).map(|r| r.mode).collect();
        let mut newly_granted = false;

        for request in requests.iter_mut() {
            if request.granted {
                continue;
            }
            if !granted_modes
                .iter()
                .all(|&held| locks_compatible(request.mode, held))
            {
                break;
            }
            request.granted = true;
            newly_granted = true;
            if *upgrading == Some(request.txn_id) {
                *upgrading = None;
            }
            granted_modes.push(request.mode);
        }

        newly_granted
    }

    /// Checks 2PL phase and isolation-level legality of a new request.
    fn check_txn_can_take_lock(&self, txn: &Transaction, mode: LockMode) -> Result<()> {
        use LockMode::*;
        let state = txn.state();
        debug_assert!(
            state != TransactionState::Committed && state != TransactionState::Aborted,
            "lock request on a finished transaction"
        );

        match txn.isolation_level() {
            IsolationLevel::ReadUncommitted => {
                if matches!(mode, Shared | IntentionShared | SharedIntentionExclusive) {
                    return Err(Self::abort_txn(
                        txn,
                        AbortReason::LockSharedOnReadUncommitted,
                    ));
                }
                if state == TransactionState::Shrinking {
                    return Err(Self::abort_txn(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::ReadCommitted => {
                if state == TransactionState::Shrinking
                    && !matches!(mode, Shared | IntentionShared)
                {
                    return Err(Self::abort_txn(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::RepeatableRead => {
                if state == TransactionState::Shrinking {
                    return Err(Self::abort_txn(txn, AbortReason::LockOnShrinking));
                }
            }
        }
        Ok(())
    }

    /// Row-lock prerequisites: no intention modes on rows, and the owning
    /// table must already be locked appropriately.
    fn check_appropriate_lock_on_table(
        &self,
        txn: &Transaction,
        oid: TableOid,
        row_mode: LockMode,
    ) -> Result<()> {
        use LockMode::*;
        if matches!(
            row_mode,
            IntentionShared | IntentionExclusive | SharedIntentionExclusive
        ) {
            return Err(Self::abort_txn(txn, AbortReason::AttemptedIntentionLockOnRow));
        }

        let table_mode = txn.table_lock_mode(oid);
        let satisfied = match row_mode {
            Exclusive => matches!(
                table_mode,
                Some(Exclusive) | Some(IntentionExclusive) | Some(SharedIntentionExclusive)
            ),
            Shared => table_mode.is_some(),
            _ => unreachable!(),
        };
        if !satisfied {
            return Err(Self::abort_txn(txn, AbortReason::TableLockNotPresent));
        }
        Ok(())
    }

    /// Applies the isolation-level shrinking rule after an unlock.
    /// REPEATABLE_READ shrinks on releasing S or X; the weaker levels
    /// shrink only on X.
    fn transition_on_unlock(&self, txn: &Transaction, mode: LockMode) {
        if txn.state() != TransactionState::Growing {
            return;
        }
        let shrink = match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                matches!(mode, LockMode::Shared | LockMode::Exclusive)
            }
            IsolationLevel::ReadCommitted => mode == LockMode::Exclusive,
            IsolationLevel::ReadUncommitted => {
                debug_assert!(
                    mode != LockMode::Shared && mode != LockMode::IntentionShared,
                    "shared lock held under READ_UNCOMMITTED"
                );
                mode == LockMode::Exclusive
            }
        };
        if shrink {
            debug!("{} enters shrinking phase", txn.txn_id());
            txn.set_state(TransactionState::Shrinking);
        }
    }

    /// Moves the transaction to `Aborted` and builds the abort error.
    fn abort_txn(txn: &Transaction, reason: AbortReason) -> TarnError {
        debug!("aborting {}: {}", txn.txn_id(), reason);
        txn.set_state(TransactionState::Aborted);
        TarnError::TransactionAbort {
            txn_id: txn.txn_id(),
            reason,
        }
    }

    fn table_queue(&self, oid: TableOid) -> Arc<LockRequestQueue> {
        Arc::clone(
            self.table_lock_map
                .lock()
                .entry(oid)
                .or_insert_with(|| Arc::new(LockRequestQueue::default())),
        )
    }

    fn row_queue(&self, rid: RecordId) -> Arc<LockRequestQueue> {
        Arc::clone(
            self.row_lock_map
                .lock()
                .entry(rid)
                .or_insert_with(|| Arc::new(LockRequestQueue::default())),
        )
    }

    // ------------------------- deadlock detection -------------------------

    /// Snapshot of the wait-for graph as a flat edge list, `(waiter,
    /// holder)` pairs. Test and introspection hook.
    pub fn wait_for_edges(&self) -> Vec<(TxnId, TxnId)> {
        self.build_wait_for_graph()
            .into_iter()
            .flat_map(|(from, tos)| tos.into_iter().map(move |to| (from, to)))
            .collect()
    }

    /// Builds the wait-for graph under the queue latches: an ungranted
    /// request waits for every granted request ahead of it in its queue.
    /// Adjacency lists come out sorted and deduplicated so traversal is
    /// deterministic.
    fn build_wait_for_graph(&self) -> BTreeMap<TxnId, Vec<TxnId>> {
        let mut graph: BTreeMap<TxnId, Vec<TxnId>> = BTreeMap::new();

        let queues: Vec<Arc<LockRequestQueue>> = {
            let tables = self.table_lock_map.lock();
            let rows = self.row_lock_map.lock();
            tables.values().chain(rows.values()).cloned().collect()
        };

        for queue in queues {
            let q = queue.inner.lock();
            for (i, request) in q.requests.iter().enumerate() {
                if request.granted {
                    continue;
                }
                for holder in q.requests.iter().take(i).filter(|r| r.granted) {
                    if holder.txn_id != request.txn_id {
                        graph.entry(request.txn_id).or_default().push(holder.txn_id);
                    }
                }
            }
        }

        for targets in graph.values_mut() {
            targets.sort();
            targets.dedup();
        }
        graph
    }

    /// Depth-first search for a cycle; returns the youngest (largest id)
    /// transaction on the first cycle found. Sources and neighbors are
    /// visited in ascending id order.
    fn find_cycle_victim(graph: &BTreeMap<TxnId, Vec<TxnId>>) -> Option<TxnId> {
        let mut visited = HashSet::new();

        for &source in graph.keys() {
            if visited.contains(&source) {
                continue;
            }
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            if let Some(victim) = Self::dfs(source, graph, &mut visited, &mut path, &mut on_path) {
                return Some(victim);
            }
        }
        None
    }

    fn dfs(
        node: TxnId,
        graph: &BTreeMap<TxnId, Vec<TxnId>>,
        visited: &mut HashSet<TxnId>,
        path: &mut Vec<TxnId>,
        on_path: &mut HashSet<TxnId>,
    ) -> Option<TxnId> {
        visited.insert(node);
        path.push(node);
        on_path.insert(node);

        if let Some(neighbors) = graph.get(&node) {
            for &next in neighbors {
                if on_path.contains(&next) {
                    let start = path
                        .iter()
                        .position(|&t| t == next)
                        .expect("on_path node missing from path");
                    return path[start..].iter().copied().max();
                }
                if !visited.contains(&next) {
                    if let Some(victim) = Self::dfs(next, graph, visited, path, on_path) {
                        return Some(victim);
                    }
                }
            }
        }

        path.pop();
        on_path.remove(&node);
        None
    }

    /// One detection pass: snapshot the graph, abort the youngest member
    /// of every cycle, then wake all waiters so victims can unwind.
    /// Returns the aborted transaction ids.
    pub fn run_cycle_detection_pass(&self, txn_manager: &TransactionManager) -> Vec<TxnId> {
        let mut graph = self.build_wait_for_graph();
        let mut victims = Vec::new();

        while let Some(victim) = Self::find_cycle_victim(&graph) {
            debug!("deadlock cycle found, aborting youngest {}", victim);
            if let Some(txn) = txn_manager.get_transaction(victim) {
                txn.set_state(TransactionState::Aborted);
            }
            graph.remove(&victim);
            for targets in graph.values_mut() {
                targets.retain(|&t| t != victim);
            }
            victims.push(victim);
        }

        if !victims.is_empty() {
            self.notify_all_queues();
        }
        victims
    }

    fn notify_all_queues(&self) {
        let queues: Vec<Arc<LockRequestQueue>> = {
            let tables = self.table_lock_map.lock();
            let rows = self.row_lock_map.lock();
            tables.values().chain(rows.values()).cloned().collect()
        };
        for queue in queues {
            queue.cv.notify_all();
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the background deadlock detection thread. Dropping it stops
/// the thread and joins it.
pub struct DeadlockDetector {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Granularity at which the detector re-checks the shutdown flag while
/// sleeping between passes.
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Spawns a thread that runs a detection pass every `interval`. The
/// thread holds only weak references, so it also exits once the lock or
/// transaction manager goes away.
pub fn spawn_deadlock_detector(
    lock_manager: &Arc<LockManager>,
    txn_manager: &Arc<TransactionManager>,
    interval: Duration,
) -> DeadlockDetector {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let lock_manager: Weak<LockManager> = Arc::downgrade(lock_manager);
    let txn_manager: Weak<TransactionManager> = Arc::downgrade(txn_manager);

    let handle = thread::spawn(move || loop {
        let deadline = Instant::now() + interval;
        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SHUTDOWN_POLL.min(deadline - now));
        }

        let (Some(lm), Some(tm)) = (lock_manager.upgrade(), txn_manager.upgrade()) else {
            return;
        };
        lm.run_cycle_detection_pass(&tm);
    });

    DeadlockDetector {
        shutdown,
        handle: Some(handle),
    }
}

impl Drop for DeadlockDetector {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_matrix() {
        use LockMode::*;
        let modes = [
            IntentionShared,
            IntentionExclusive,
            Shared,
            SharedIntentionExclusive,
            Exclusive,
        ];

        // Row-major truth table in the order above.
        let expected = [
            [true, true, true, true, false],
            [true, true, false, false, false],
            [true, false, true, false, false],
            [true, false, false, false, false],
            [false, false, false, false, false],
        ];

        for (i, &a) in modes.iter().enumerate() {
            for (j, &b) in modes.iter().enumerate() {
                assert_eq!(
                    locks_compatible(a, b),
                    expected[i][j],
                    "compat({:?}, {:?})",
                    a,
                    b
                );
                // The matrix is symmetric.
                assert_eq!(locks_compatible(a, b), locks_compatible(b, a));
            }
        }
    }

    #[test]
    fn test_upgrade_matrix() {
        use LockMode::*;
        assert!(can_lock_upgrade(IntentionShared, Shared));
        assert!(can_lock_upgrade(IntentionShared, Exclusive));
        assert!(can_lock_upgrade(IntentionShared, IntentionExclusive));
        assert!(can_lock_upgrade(IntentionShared, SharedIntentionExclusive));
        assert!(can_lock_upgrade(Shared, Exclusive));
        assert!(can_lock_upgrade(Shared, SharedIntentionExclusive));
        assert!(can_lock_upgrade(IntentionExclusive, Exclusive));
        assert!(can_lock_upgrade(IntentionExclusive, SharedIntentionExclusive));
        assert!(can_lock_upgrade(SharedIntentionExclusive, Exclusive));

        assert!(!can_lock_upgrade(Shared, IntentionExclusive));
        assert!(!can_lock_upgrade(Exclusive, Shared));
        assert!(!can_lock_upgrade(SharedIntentionExclusive, Shared));
    }

    #[test]
    fn test_cycle_victim_is_youngest() {
        let mut graph: BTreeMap<TxnId, Vec<TxnId>> = BTreeMap::new();
        graph.insert(TxnId::new(1), vec![TxnId::new(2)]);
        graph.insert(TxnId::new(2), vec![TxnId::new(3)]);
        graph.insert(TxnId::new(3), vec![TxnId::new(1)]);

        assert_eq!(LockManager::find_cycle_victim(&graph), Some(TxnId::new(3)));
    }

    #[test]
    fn test_cycle_search_ignores_acyclic_graph() {
        let mut graph: BTreeMap<TxnId, Vec<TxnId>> = BTreeMap::new();
        graph.insert(TxnId::new(1), vec![TxnId::new(2)]);
        graph.insert(TxnId::new(2), vec![TxnId::new(3)]);

        assert_eq!(LockManager::find_cycle_victim(&graph), None);
    }

    #[test]
    fn test_cycle_search_finds_smaller_of_two_cycles_first() {
        // Two disjoint cycles; sources are visited in ascending order, so
        // the cycle containing the smallest id is found first.
        let mut graph: BTreeMap<TxnId, Vec<TxnId>> = BTreeMap::new();
        graph.insert(TxnId::new(1), vec![TxnId::new(2)]);
        graph.insert(TxnId::new(2), vec![TxnId::new(1)]);
        graph.insert(TxnId::new(5), vec![TxnId::new(6)]);
        graph.insert(TxnId::new(6), vec![TxnId::new(5)]);

        assert_eq!(LockManager::find_cycle_victim(&graph), Some(TxnId::new(2)));
    }
}
