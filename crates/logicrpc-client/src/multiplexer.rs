use bytes::Bytes;
use logicrpc_frame::{CallResponse, FrameWriter};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ClientError, TransportFault};
use crate::pending::{PendingSlot, PendingTable};

/// Frames queued for the writer task before senders wait.
const OUTBOUND_QUEUE: usize = 64;

/// One encoded request waiting for the writer task.
pub(crate) struct Outbound {
    correlation_id: u32,
    payload: Bytes,
    written: oneshot::Sender<Result<(), TransportFault>>,
}

/// Shares one connection between many concurrent calls.
///
/// Calls hand whole frames to a single writer task ([`write_loop`]), so
/// frames never interleave on the wire and a caller that gives up halfway
/// through a send cannot leave a partial frame behind. Reads happen in the
/// connection's read loop, which hands replies back through
/// [`Multiplexer::resolve`].
pub(crate) struct Multiplexer {
    pending: PendingTable,
    outbound: mpsc::Sender<Outbound>,
}

impl Multiplexer {
    /// Create the multiplexer and the queue its writer task drains.
    pub(crate) fn new() -> (Self, mpsc::Receiver<Outbound>) {
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE);
        let mux = Self {
            pending: PendingTable::new(),
            outbound,
        };
        (mux, queue)
    }

    pub(crate) fn next_id(&self) -> Result<u32, ClientError> {
        self.pending.next_id()
    }

    pub(crate) fn register(&self, id: u32) -> Result<PendingSlot, ClientError> {
        self.pending.register(id)
    }

    /// Queue one frame and wait until it has been written and flushed.
    ///
    /// Dropping the returned future never cuts a frame short: once queued,
    /// the writer task finishes it regardless.
    pub(crate) async fn send(&self, correlation_id: u32, payload: Bytes) -> Result<(), TransportFault> {
        if let Some(fault) = self.pending.closed_reason() {
            return Err(fault);
        }

        let (written, done) = oneshot::channel();
        self.outbound
            .send(Outbound {
                correlation_id,
                payload,
                written,
            })
            .await
            .map_err(|_| writer_stopped())?;
        done.await.unwrap_or_else(|_| Err(writer_stopped()))
    }

    pub(crate) fn resolve(&self, id: u32, response: CallResponse) -> bool {
        self.pending.resolve(id, response)
    }

    pub(crate) fn fail_all(&self, fault: TransportFault) -> usize {
        self.pending.fail_all(fault)
    }

    pub(crate) fn evict(&self, id: u32) -> bool {
        self.pending.evict(id)
    }

    pub(crate) fn pending(&self) -> &PendingTable {
        &self.pending
    }
}

/// Write queued frames until a write fails.
///
/// Returns the fault that stopped the loop, or `None` once every sender
/// is gone.
pub(crate) async fn write_loop<W>(
    writer: &mut FrameWriter<W>,
    queue: &mut mpsc::Receiver<Outbound>,
) -> Option<TransportFault>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        match writer.send(frame.correlation_id, &frame.payload).await {
            Ok(()) => {
                let _ = frame.written.send(Ok(()));
            }
            Err(err) => {
                let fault = TransportFault::from_frame(&err);
                let _ = frame.written.send(Err(fault.clone()));
                return Some(fault);
            }
        }
    }
    None
}

fn writer_stopped() -> TransportFault {
    TransportFault::TransportClosed("connection writer stopped".into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use logicrpc_frame::{decode_payload, encode_payload, from_json, to_json, FrameReader};
    use serde_json::json;
    use tokio::io::duplex;

    use super::*;

    fn spawn_writer<W>(writer: W, mut queue: mpsc::Receiver<Outbound>) -> tokio::task::JoinHandle<Option<TransportFault>>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            write_loop(&mut writer, &mut queue).await
        })
    }

    fn body(n: u32, pad: usize) -> Bytes {
        Bytes::from(encode_payload(&from_json(&json!({"n": n, "pad": "x".repeat(pad)}))).unwrap())
    }

    #[tokio::test]
    async fn concurrent_sends_never_interleave() {
        let (client, server) = duplex(1024);
        let (mux, queue) = Multiplexer::new();
        let mux = Arc::new(mux);
        let _writer = spawn_writer(client, queue);

        let mut tasks = Vec::new();
        for n in 0..16u32 {
            let mux = Arc::clone(&mux);
            tasks.push(tokio::spawn(async move {
                let id = mux.next_id().unwrap();
                let _slot = mux.register(id).unwrap();
                mux.send(id, body(n, 4096)).await.unwrap();
                id
            }));
        }

        let mut reader = FrameReader::new(server);
        let mut seen = Vec::new();
        for _ in 0..16 {
            let frame = reader.read_frame().await.unwrap();
            let value = to_json(&decode_payload(&frame.payload).unwrap());
            assert_eq!(value["pad"].as_str().map(str::len), Some(4096));
            seen.push(frame.correlation_id);
        }
        for task in tasks {
            assert!(seen.contains(&task.await.unwrap()));
        }
    }

    #[tokio::test]
    async fn dropped_send_still_writes_whole_frame() {
        let (client, server) = duplex(1024);
        let (mux, queue) = Multiplexer::new();
        let _writer = spawn_writer(client, queue);

        // Nothing reads yet, so the big frame cannot finish before the
        // caller gives up on it.
        let abandoned = tokio::time::timeout(Duration::from_millis(50), mux.send(1, body(1, 256 * 1024))).await;
        assert!(abandoned.is_err());

        let mut reader = FrameReader::new(server);
        let reading = tokio::spawn(async move {
            let first = reader.read_frame().await.unwrap();
            let second = reader.read_frame().await.unwrap();
            (first, second)
        });
        mux.send(2, body(2, 8)).await.unwrap();

        let (first, second) = reading.await.unwrap();
        assert_eq!(first.correlation_id, 1);
        assert_eq!(to_json(&decode_payload(&first.payload).unwrap())["n"], 1);
        assert_eq!(second.correlation_id, 2);
        assert_eq!(to_json(&decode_payload(&second.payload).unwrap())["n"], 2);
    }

    #[tokio::test]
    async fn write_failure_stops_loop_and_reports_fault() {
        let (client, server) = duplex(64);
        drop(server);
        let (mux, queue) = Multiplexer::new();
        let writer = spawn_writer(client, queue);

        let fault = mux.send(1, body(1, 8)).await.unwrap_err();
        assert!(matches!(fault, TransportFault::TransportClosed(_)));
        assert!(matches!(writer.await.unwrap(), Some(TransportFault::TransportClosed(_))));

        let fault = mux.send(2, body(2, 8)).await.unwrap_err();
        assert_eq!(fault, writer_stopped());
    }

    #[tokio::test]
    async fn send_after_fail_all_is_rejected() {
        let (mux, _queue) = Multiplexer::new();
        mux.fail_all(TransportFault::TransportClosed("reset".into()));

        let fault = mux.send(1, Bytes::from_static(b"late")).await.unwrap_err();
        assert_eq!(fault, TransportFault::TransportClosed("reset".into()));
        assert!(mux.register(1).is_err());
    }

    #[tokio::test]
    async fn resolve_and_evict_route_through_table() {
        let (mux, _queue) = Multiplexer::new();
        let mut slot = mux.register(4).unwrap();
        let _other = mux.register(5).unwrap();

        assert!(mux.evict(5));
        assert!(mux.resolve(4, CallResponse::success(from_json(&json!({"result": 4})))));
        assert!(mux.pending().is_empty());
        assert!(slot.wait().await.unwrap().ok);
    }
}
