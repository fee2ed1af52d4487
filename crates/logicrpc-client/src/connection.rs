use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use logicrpc_frame::{FrameConfig, FrameReader, FrameWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatcher;
use crate::error::TransportFault;
use crate::multiplexer::{Multiplexer, Outbound};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One established socket plus the calls pending on it.
pub(crate) struct Connection {
    generation: u64,
    mux: Multiplexer,
    tasks: Mutex<Tasks>,
}

/// The read and write loops driving one socket.
#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Connection {
    fn new(generation: u64) -> (Self, mpsc::Receiver<Outbound>) {
        let (mux, queue) = Multiplexer::new();
        let conn = Self {
            generation,
            mux,
            tasks: Mutex::new(Tasks::default()),
        };
        (conn, queue)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn mux(&self) -> &Multiplexer {
        &self.mux
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.mux.pending().is_closed()
    }

    fn attach_tasks(&self, reader: JoinHandle<()>, writer: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        if self.is_closed() {
            reader.abort();
            writer.abort();
        } else {
            tasks.reader = Some(reader);
            tasks.writer = Some(writer);
        }
    }

    /// Detach the read loop handle so a later shutdown does not abort it.
    pub(crate) fn take_reader(&self) -> Option<JoinHandle<()>> {
        lock(&self.tasks).reader.take()
    }

    /// Detach the write loop handle so a later shutdown does not abort it.
    pub(crate) fn take_writer(&self) -> Option<JoinHandle<()>> {
        lock(&self.tasks).writer.take()
    }

    /// Stop both loops and fail every pending call with `fault`.
    ///
    /// Idempotent. Aborting the loops drops both socket halves, which
    /// closes the socket.
    pub(crate) fn shutdown(&self, fault: TransportFault) -> usize {
        let failed = self.mux.fail_all(fault);
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for handle in [tasks.reader, tasks.writer].into_iter().flatten() {
            handle.abort();
        }
        failed
    }
}

pub(crate) struct Shared {
    socket_path: PathBuf,
    frame: FrameConfig,
    current: Mutex<Option<Arc<Connection>>>,
    connecting: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    connect_attempts: AtomicU64,
}

impl Shared {
    fn live(&self) -> Option<Arc<Connection>> {
        lock(&self.current)
            .as_ref()
            .filter(|conn| !conn.is_closed())
            .cloned()
    }

    /// Tear down `conn`, detaching it first if it is still current.
    ///
    /// A reset for a connection that has already been replaced never
    /// touches the replacement.
    pub(crate) fn reset(&self, conn: &Arc<Connection>, fault: TransportFault) {
        let detached = {
            let mut current = lock(&self.current);
            match current.as_ref() {
                Some(active) if Arc::ptr_eq(active, conn) => current.take(),
                _ => None,
            }
        };
        let failed = conn.shutdown(fault.clone());
        if detached.is_some() || failed > 0 {
            warn!(
                generation = conn.generation(),
                failed_calls = failed,
                error = %fault,
                "connection reset"
            );
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let current = self
            .current
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(conn) = current {
            conn.shutdown(TransportFault::TransportClosed("client dropped".into()));
        }
    }
}

/// Owns the single shared connection for one socket path.
///
/// Connects lazily, at most one connect runs at a time, and a reset
/// detaches the connection so the next call dials a fresh one.
pub(crate) struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub(crate) fn new(socket_path: impl AsRef<Path>, frame: FrameConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                socket_path: socket_path.as_ref().to_path_buf(),
                frame,
                current: Mutex::new(None),
                connecting: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                connect_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Return the live connection, dialing one if none exists.
    pub(crate) async fn connect(&self) -> Result<Arc<Connection>, TransportFault> {
        if let Some(conn) = self.shared.live() {
            return Ok(conn);
        }

        let _connecting = self.shared.connecting.lock().await;
        if let Some(conn) = self.shared.live() {
            return Ok(conn);
        }

        self.shared.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let stream = logicrpc_transport::connect(&self.shared.socket_path)
            .await
            .map_err(|e| {
                warn!(path = ?self.shared.socket_path, error = %e, "connect to logic backend failed");
                TransportFault::ConnectFailed(e.to_string())
            })?;

        let (read_half, write_half) = stream.into_split();
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (conn, queue) = Connection::new(generation);
        let conn = Arc::new(conn);
        let reader = tokio::spawn(dispatcher::run_reader(
            FrameReader::with_config(read_half, self.shared.frame.clone()),
            Arc::clone(&conn),
            Arc::downgrade(&self.shared),
        ));
        let writer = tokio::spawn(dispatcher::run_writer(
            FrameWriter::with_config(write_half, self.shared.frame.clone()),
            queue,
            Arc::clone(&conn),
            Arc::downgrade(&self.shared),
        ));
        conn.attach_tasks(reader, writer);

        *lock(&self.shared.current) = Some(Arc::clone(&conn));
        info!(path = ?self.shared.socket_path, generation, "connected to logic backend");
        Ok(conn)
    }

    pub(crate) fn reset(&self, conn: &Arc<Connection>, fault: TransportFault) {
        self.shared.reset(conn, fault);
    }

    /// Reset whatever connection is current.
    pub(crate) fn disconnect(&self, fault: TransportFault) {
        let current = lock(&self.shared.current).clone();
        if let Some(conn) = current {
            self.shared.reset(&conn, fault);
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.shared.live().is_some()
    }

    pub(crate) fn pending_calls(&self) -> usize {
        self.shared
            .live()
            .map_or(0, |conn| conn.mux().pending().len())
    }

    pub(crate) fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn socket_path(&self) -> &Path {
        &self.shared.socket_path
    }
}
