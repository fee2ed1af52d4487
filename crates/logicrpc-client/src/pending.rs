//! Correlation ID allocation and the pending-call table.
//!
//! Each connection owns one [`PendingTable`]. A call registers a slot under
//! a fresh ID before its request is written; the read loop resolves the slot
//! when the matching reply arrives, and a reset fails every slot at once.
//! A slot is completed at most once: completion removes it from the table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use logicrpc_frame::CallResponse;
use tokio::sync::oneshot;

use crate::error::{ClientError, TransportFault};

/// What a pending call eventually receives.
pub type SlotResult = std::result::Result<CallResponse, TransportFault>;

/// Receiving half of one registered call.
#[derive(Debug)]
pub struct PendingSlot {
    id: u32,
    rx: oneshot::Receiver<SlotResult>,
}

impl PendingSlot {
    /// Correlation ID this slot was registered under.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wait for the reply or the fault that ends this call.
    ///
    /// Safe to use inside `select!`: a dropped wait leaves the slot intact.
    pub async fn wait(&mut self) -> SlotResult {
        match (&mut self.rx).await {
            Ok(result) => result,
            // Sender dropped without completing: the table itself went away.
            Err(_) => Err(TransportFault::TransportClosed("connection dropped".into())),
        }
    }
}

/// Per-connection table of in-flight calls.
#[derive(Debug)]
pub struct PendingTable {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    next_id: u32,
    slots: HashMap<u32, oneshot::Sender<SlotResult>>,
    closed: Option<TransportFault>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn starting_at(first_id: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: first_id,
                slots: HashMap::new(),
                closed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next correlation ID not held by a pending call.
    ///
    /// IDs increase monotonically and wrap at `u32::MAX`. After a wrap, IDs
    /// still in use are skipped.
    pub fn next_id(&self) -> Result<u32, ClientError> {
        let mut inner = self.lock();
        if inner.slots.len() > u32::MAX as usize {
            return Err(ClientError::IdsExhausted);
        }
        loop {
            let candidate = inner.next_id;
            inner.next_id = candidate.wrapping_add(1);
            if !inner.slots.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Register a slot for `id`.
    ///
    /// Fails with the closing fault once the table has been failed, and with
    /// [`ClientError::DuplicateId`] if `id` is already pending.
    pub fn register(&self, id: u32) -> Result<PendingSlot, ClientError> {
        let mut inner = self.lock();
        if let Some(fault) = &inner.closed {
            return Err(fault.clone().into());
        }
        if inner.slots.contains_key(&id) {
            return Err(ClientError::DuplicateId(id));
        }
        let (tx, rx) = oneshot::channel();
        inner.slots.insert(id, tx);
        Ok(PendingSlot { id, rx })
    }

    /// Complete the slot for `id` with a reply.
    ///
    /// Returns `false` when no slot is pending under `id`; the reply is
    /// dropped.
    pub fn resolve(&self, id: u32, response: CallResponse) -> bool {
        let sender = self.lock().slots.remove(&id);
        match sender {
            Some(tx) => {
                // The caller may have stopped listening; the slot is still consumed.
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Fail every pending slot with `fault` and close the table.
    ///
    /// Later registrations fail with the first closing fault. Returns the
    /// number of slots failed by this call.
    pub fn fail_all(&self, fault: TransportFault) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.lock();
            if inner.closed.is_none() {
                inner.closed = Some(fault.clone());
            }
            inner.slots.drain().collect()
        };
        let failed = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(fault.clone()));
        }
        failed
    }

    /// Drop the slot for `id` without completing it.
    ///
    /// Used by the owning call when it gives up waiting.
    pub fn evict(&self, id: u32) -> bool {
        self.lock().slots.remove(&id).is_some()
    }

    /// Number of calls currently waiting.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// The fault that closed this table, if any.
    pub fn closed_reason(&self) -> Option<TransportFault> {
        self.lock().closed.clone()
    }
}
