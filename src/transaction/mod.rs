//! Transaction coordinator
//!
//! A generic, poll-driven two-phase apply mechanism decoupling "propose a
//! change" from "the change is visually committed". Committing a geometry
//! change before the client has produced a buffer at the new size causes a
//! visible flash, so the change is queued and retried until the client
//! acknowledges the configure serial, or until the bounded sweep count
//! runs out, at which point it is applied anyway so a non-responding
//! client can never stall layout forever.
//!
//! The queue is generic over the context its operations mutate, which
//! keeps it testable without the full shell.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::TransactionConfig;

/// Stable handle to a queued transaction. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

/// Why an operation is being evaluated. On `Forced` the operation must
/// complete: its precondition timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    /// Regular timer sweep.
    Sweep,
    /// The bounded retry count ran out; apply regardless.
    Forced,
    /// Explicit `run_now` outside the timer.
    Explicit,
}

/// A queued operation: returns true when complete (dequeue), false to
/// retry on the next sweep.
type TransactionOp<C> = Box<dyn FnMut(&mut C, RunReason) -> bool>;

struct Pending<C> {
    id: TransactionId,
    op: TransactionOp<C>,
    sweeps: u32,
}

/// The pending-transaction queue with its repeating sweep timer state.
pub struct TransactionQueue<C> {
    pending: Vec<Pending<C>>,
    /// Ids cancelled while the sweep loop had their records checked out.
    cancelled: HashSet<TransactionId>,
    next_id: u64,
    sweep_interval: Duration,
    force_apply_after: u32,
    deadline: Option<Instant>,
}

impl<C> TransactionQueue<C> {
    pub fn new(config: &TransactionConfig) -> Self {
        Self {
            pending: Vec::new(),
            cancelled: HashSet::new(),
            next_id: 1,
            sweep_interval: Duration::from_millis(config.sweep_interval_ms as u64),
            force_apply_after: config.force_apply_after,
            deadline: None,
        }
    }

    pub fn allocate(&mut self) -> TransactionId {
        let id = TransactionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Queue an operation under `id`. Idempotent re-queue: if the id is
    /// already pending its old record is dropped and the new one appended,
    /// resetting the retry count. Arms the sweep timer if not armed.
    pub fn queue<F>(&mut self, id: TransactionId, op: F)
    where
        F: FnMut(&mut C, RunReason) -> bool + 'static,
    {
        self.pending.retain(|p| p.id != id);
        self.cancelled.remove(&id);
        self.pending.push(Pending {
            id,
            op: Box::new(op),
            sweeps: 0,
        });
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.sweep_interval);
        }
        trace!("transaction {:?} queued ({} pending)", id, self.pending.len());
    }

    /// Allocate and queue in one step.
    pub fn add<F>(&mut self, op: F) -> TransactionId
    where
        F: FnMut(&mut C, RunReason) -> bool + 'static,
    {
        let id = self.allocate();
        self.queue(id, op);
        id
    }

    /// Remove a transaction without running it. Idempotent, and safe to
    /// call from inside any transaction's own operation.
    pub fn cancel(&mut self, id: TransactionId) {
        self.pending.retain(|p| p.id != id);
        // The sweep loop checks this set for records it already took out.
        self.cancelled.insert(id);
    }

    pub fn is_queued(&self, id: TransactionId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Next sweep-timer deadline, if the timer is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn take_cancelled(&mut self, id: TransactionId) -> bool {
        self.cancelled.remove(&id)
    }
}

/// Sweep every queued transaction once, in insertion order.
///
/// `access` projects the queue out of the context so operations can borrow
/// the whole context while the loop holds the records. Operations queued
/// from inside a callback run on the *next* sweep; operations cancelled
/// from inside a callback are dropped even if already checked out.
/// Returns how many transactions completed.
pub fn sweep<C>(ctx: &mut C, access: fn(&mut C) -> &mut TransactionQueue<C>) -> usize {
    let queue = access(ctx);
    queue.cancelled.clear();
    let taken = std::mem::take(&mut queue.pending);
    let force_after = queue.force_apply_after;
    let interval = queue.sweep_interval;

    let mut retained: Vec<Pending<C>> = Vec::new();
    let mut completed = 0;
    for mut txn in taken {
        if access(ctx).take_cancelled(txn.id) {
            continue;
        }
        txn.sweeps += 1;
        let reason = if txn.sweeps >= force_after {
            RunReason::Forced
        } else {
            RunReason::Sweep
        };
        let done = (txn.op)(ctx, reason);
        if access(ctx).take_cancelled(txn.id) {
            continue;
        }
        if done || reason == RunReason::Forced {
            if !done {
                debug!(
                    "transaction {:?} force-applied after {} sweeps",
                    txn.id, txn.sweeps
                );
            }
            completed += 1;
        } else {
            retained.push(txn);
        }
    }

    let queue = access(ctx);
    // Operations queued during the sweep are already in `pending`; they
    // sort after the retained survivors to preserve insertion order.
    retained.append(&mut queue.pending);
    queue.pending = retained;
    queue.deadline = if queue.pending.is_empty() {
        None
    } else {
        Some(Instant::now() + interval)
    };
    completed
}

/// Force one evaluation of a single transaction outside the timer, for
/// callers that already know the precondition is satisfied (e.g. the
/// expected configure serial just arrived). Dequeues on success.
/// Returns true if the transaction completed.
pub fn run_now<C>(
    ctx: &mut C,
    access: fn(&mut C) -> &mut TransactionQueue<C>,
    id: TransactionId,
) -> bool {
    let queue = access(ctx);
    let Some(index) = queue.pending.iter().position(|p| p.id == id) else {
        return false;
    };
    let mut txn = queue.pending.remove(index);
    let done = (txn.op)(ctx, RunReason::Explicit);

    let queue = access(ctx);
    if queue.take_cancelled(id) {
        return true;
    }
    if done {
        if queue.pending.is_empty() {
            queue.deadline = None;
        }
        true
    } else {
        // Back to its original position so sweep order stays stable.
        queue.pending.insert(index.min(queue.pending.len()), txn);
        false
    }
}
