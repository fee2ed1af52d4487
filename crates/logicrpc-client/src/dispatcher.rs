//! Per-connection background loops.

use std::sync::{Arc, Weak};

use logicrpc_frame::{CallResponse, FrameReader, FrameWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::{Connection, Shared};
use crate::error::TransportFault;
use crate::multiplexer::{write_loop, Multiplexer, Outbound};

/// Route replies to pending calls until the connection fails.
///
/// Returns the fault that ended the loop. Replies whose correlation ID has
/// no pending call are dropped.
pub(crate) async fn read_loop<R>(reader: &mut FrameReader<R>, mux: &Multiplexer) -> TransportFault
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(err) => return TransportFault::from_frame(&err),
        };
        let response = match CallResponse::decode(&frame.payload) {
            Ok(response) => response,
            Err(err) => return TransportFault::from_frame(&err),
        };
        if !mux.resolve(frame.correlation_id, response) {
            debug!(
                correlation_id = frame.correlation_id,
                "discarding reply with no pending call"
            );
        }
    }
}

pub(crate) async fn run_reader<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    conn: Arc<Connection>,
    manager: Weak<Shared>,
) {
    let fault = read_loop(&mut reader, conn.mux()).await;
    debug!(generation = conn.generation(), error = %fault, "read loop stopped");

    // This task is finishing; keep the reset from aborting it.
    drop(conn.take_reader());
    stop(&conn, &manager, fault);
}

pub(crate) async fn run_writer<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut queue: mpsc::Receiver<Outbound>,
    conn: Arc<Connection>,
    manager: Weak<Shared>,
) {
    let Some(fault) = write_loop(&mut writer, &mut queue).await else {
        return;
    };
    debug!(generation = conn.generation(), error = %fault, "write loop stopped");

    drop(conn.take_writer());
    stop(&conn, &manager, fault);
}

fn stop(conn: &Arc<Connection>, manager: &Weak<Shared>, fault: TransportFault) {
    match manager.upgrade() {
        Some(shared) => shared.reset(conn, fault),
        None => {
            conn.shutdown(fault);
        }
    }
}
