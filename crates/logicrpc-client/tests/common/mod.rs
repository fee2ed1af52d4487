//! In-process stand-in for the logic backend.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logicrpc_client::{from_json, to_json, CallRequest, CallResponse, ClientConfig};
use logicrpc_frame::{FrameReader, FrameWriter};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// What the backend does in response to one request.
pub enum Reply {
    /// Reply under the request's correlation ID.
    Respond(CallResponse),
    /// Reply under some other correlation ID.
    RespondAs(u32, CallResponse),
    /// Reply after a delay without blocking later requests.
    After(Duration, CallResponse),
    /// Send raw bytes as the payload of a correctly framed reply.
    Raw(Vec<u8>),
    /// Drop the connection.
    Close,
}

type Handler = dyn Fn(usize, u32, &CallRequest) -> Vec<Reply> + Send + Sync;
type SharedWriter = Arc<tokio::sync::Mutex<FrameWriter<OwnedWriteHalf>>>;

pub struct MockBackend {
    dir: PathBuf,
    path: PathBuf,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u32, CallRequest)>>>,
    reading: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MockBackend {
    /// Start a backend; `handler` gets the connection index, correlation
    /// ID and request, and returns the replies to send.
    pub fn start<F>(tag: &str, handler: F) -> Self
    where
        F: Fn(usize, u32, &CallRequest) -> Vec<Reply> + Send + Sync + 'static,
    {
        Self::spawn(tag, true, handler)
    }

    /// Like [`MockBackend::start`], but connections are accepted and left
    /// unread until [`MockBackend::resume`].
    pub fn start_paused<F>(tag: &str, handler: F) -> Self
    where
        F: Fn(usize, u32, &CallRequest) -> Vec<Reply> + Send + Sync + 'static,
    {
        Self::spawn(tag, false, handler)
    }

    fn spawn<F>(tag: &str, reading: bool, handler: F) -> Self
    where
        F: Fn(usize, u32, &CallRequest) -> Vec<Reply> + Send + Sync + 'static,
    {
        let dir = PathBuf::from(format!(
            "/tmp/lrpc-mock-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("mock dir should be created");
        let path = dir.join("logic.sock");
        let listener = UnixListener::bind(&path).expect("mock listener should bind");

        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let (reading, gate) = watch::channel(reading);

        let task = {
            let accepted = Arc::clone(&accepted);
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                let mut connections = JoinSet::new();
                while let Ok((stream, _)) = listener.accept().await {
                    let index = accepted.fetch_add(1, Ordering::SeqCst);
                    let (read_half, write_half) = stream.into_split();
                    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(FrameWriter::new(write_half)));
                    connections.spawn(serve(
                        index,
                        FrameReader::new(read_half),
                        writer,
                        Arc::clone(&handler),
                        Arc::clone(&requests),
                        gate.clone(),
                    ));
                }
            })
        };

        Self {
            dir,
            path,
            accepted,
            requests,
            reading,
            task,
        }
    }

    /// Start reading on every connection, held or future.
    pub fn resume(&self) {
        self.reading.send_replace(true);
    }

    /// Replies `{"result": value * 2}` to every request.
    pub fn doubling(tag: &str) -> Self {
        Self::start(tag, |_, _, req| vec![Reply::Respond(double(req))])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(u32, CallRequest)> {
        self.requests.lock().expect("request log should lock").clone()
    }

    /// Client settings pointed at this backend with a short retry delay.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.path).with_retry_delay(Duration::from_millis(20))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// The request's `params["value"]` as an integer.
pub fn value_of(req: &CallRequest) -> Option<i64> {
    to_json(&req.params)["value"].as_i64()
}

pub fn double(req: &CallRequest) -> CallResponse {
    let value = value_of(req).unwrap_or(0);
    CallResponse::success(from_json(&serde_json::json!({ "result": value * 2 })))
}

async fn serve(
    index: usize,
    mut reader: FrameReader<tokio::net::unix::OwnedReadHalf>,
    writer: SharedWriter,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<(u32, CallRequest)>>>,
    mut gate: watch::Receiver<bool>,
) {
    if gate.wait_for(|reading| *reading).await.is_err() {
        return;
    }
    let mut delayed = JoinSet::new();
    while let Ok(frame) = reader.read_frame().await {
        let id = frame.correlation_id;
        let Ok(request) = CallRequest::decode(&frame.payload) else {
            return;
        };
        requests
            .lock()
            .expect("request log should lock")
            .push((id, request.clone()));

        for reply in handler(index, id, &request) {
            match reply {
                Reply::Respond(response) => send(&writer, id, &response).await,
                Reply::RespondAs(other, response) => send(&writer, other, &response).await,
                Reply::After(delay, response) => {
                    let writer = Arc::clone(&writer);
                    delayed.spawn(async move {
                        tokio::time::sleep(delay).await;
                        send(&writer, id, &response).await;
                    });
                }
                Reply::Raw(bytes) => {
                    let _ = writer.lock().await.send(id, &bytes).await;
                }
                Reply::Close => return,
            }
        }
    }
    // Let delayed replies drain before the socket goes away.
    while delayed.join_next().await.is_some() {}
}

async fn send(writer: &SharedWriter, id: u32, response: &CallResponse) {
    let bytes = response.encode().expect("mock reply should encode");
    let _ = writer.lock().await.send(id, &bytes).await;
}
