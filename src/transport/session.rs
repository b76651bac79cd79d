// src/transport/session.rs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use fastwebsockets::{FragmentCollector, Frame, OpCode, Payload};
use http_body_util::Empty;
use hyper::header::{CONNECTION, UPGRADE};
use hyper::upgrade::Upgraded;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_rustls::rustls::ServerName;
use tokio_rustls::TlsConnector;

/// The session lifecycle, advanced strictly in order on the way up
/// (`Idle` -> ... -> `Open`) and collapsing straight to `Closed` from any
/// state on error or explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Connecting,
    TlsHandshaking,
    WsHandshaking,
    Open,
    Closing,
    Closed,
}

/// Coarse classification of a connect-time failure, passed to
/// `on_conn_err` in place of the original's raw error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnErrorKind {
    Resolve,
    Connect,
    Tls,
    WsHandshake,
    Io,
}

pub type OnConnectHook = Arc<dyn Fn(&Arc<TransportSession>) + Send + Sync>;
pub type OnWriteHook = Arc<dyn Fn(&Arc<TransportSession>, usize) + Send + Sync>;
pub type OnReadHook = Arc<dyn Fn(&Arc<TransportSession>, &[u8]) -> usize + Send + Sync>;
pub type OnCloseHook = Arc<dyn Fn(&Arc<TransportSession>) + Send + Sync>;
pub type OnConnErrHook = Arc<dyn Fn(&Arc<TransportSession>, ConnErrorKind, &str) + Send + Sync>;

/// One WebSocket connection, owned by a [`crate::transport::host::TransportHost`].
///
/// Ported from the original `WebsocketSession`: a FIFO write queue with a
/// single write in flight, and pull-driven reads gated by an atomic
/// read-credit counter (`read()` always issues one read regardless of
/// credit; `read_after()` only bumps the counter, and each completed read
/// decrements it, chaining one more read while it stays positive).
///
/// The session's write and read sides are driven by a single background
/// task (see [`TransportSession::start`]) rather than split halves of the
/// underlying stream: `fastwebsockets`'s `unstable-split` feature would let
/// reads and writes proceed fully concurrently, but serializing them behind
/// one `tokio::select!` loop is enough to satisfy "one write in flight" and
/// keeps the frame accumulation buffer single-owned.
pub struct TransportSession {
    host: String,
    port: u16,
    uri: String,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    keepalive_interval: Duration,
    tls: TlsConnector,
    rt: tokio::runtime::Handle,

    state: Mutex<SessionState>,
    on_connect: Mutex<Option<OnConnectHook>>,
    on_write: Mutex<Option<OnWriteHook>>,
    on_read: Mutex<Option<OnReadHook>>,
    on_close: Mutex<Option<OnCloseHook>>,
    on_conn_err: Mutex<Option<OnConnErrHook>>,

    write_queue: Mutex<VecDeque<Bytes>>,
    write_notify: Notify,
    read_credit: AtomicI64,
    read_notify: Notify,
    close_notify: Notify,
}

impl TransportSession {
    pub(crate) fn new(
        host: String,
        port: u16,
        uri: String,
        tls: TlsConnector,
        rt: tokio::runtime::Handle,
        connect_timeout: Duration,
        handshake_timeout: Duration,
        keepalive_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            port,
            uri,
            connect_timeout,
            handshake_timeout,
            keepalive_interval,
            tls,
            rt,
            state: Mutex::new(SessionState::Idle),
            on_connect: Mutex::new(None),
            on_write: Mutex::new(None),
            on_read: Mutex::new(None),
            on_close: Mutex::new(None),
            on_conn_err: Mutex::new(None),
            write_queue: Mutex::new(VecDeque::new()),
            write_notify: Notify::new(),
            read_credit: AtomicI64::new(0),
            read_notify: Notify::new(),
            close_notify: Notify::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    fn set_state(&self, s: SessionState) {
        *self.state.lock().expect("session state lock poisoned") = s;
    }

    pub fn set_on_connect(&self, cb: OnConnectHook) {
        *self.on_connect.lock().unwrap() = Some(cb);
    }

    pub fn set_on_write(&self, cb: OnWriteHook) {
        *self.on_write.lock().unwrap() = Some(cb);
    }

    pub fn set_on_read(&self, cb: OnReadHook) {
        *self.on_read.lock().unwrap() = Some(cb);
    }

    pub fn set_on_close(&self, cb: OnCloseHook) {
        *self.on_close.lock().unwrap() = Some(cb);
    }

    pub fn set_on_conn_err(&self, cb: OnConnErrHook) {
        *self.on_conn_err.lock().unwrap() = Some(cb);
    }

    /// Enqueues `payload` for write. Safe to call before the session is
    /// `Open`: queued writes are flushed in enqueue order once the
    /// handshake completes. Fails if the queue's backing allocation can't
    /// grow (§7 `OutOfMemory`) rather than aborting the process.
    pub fn write(
        self: &Arc<Self>,
        payload: impl Into<Bytes>,
    ) -> Result<(), crate::error::WriteQueueError> {
        let mut queue = self.write_queue.lock().unwrap();
        queue.try_reserve(1)?;
        queue.push_back(payload.into());
        drop(queue);
        self.write_notify.notify_one();
        Ok(())
    }

    /// Snapshot of the currently enqueued (not-yet-flushed) writes, in
    /// order. Used by adapter tests to assert on frame shape without
    /// needing a live connection.
    pub fn peek_write_queue(&self) -> Vec<Bytes> {
        self.write_queue.lock().unwrap().iter().cloned().collect()
    }

    /// Initiates a single async read regardless of the current read
    /// credit.
    pub fn read(self: &Arc<Self>) {
        self.read_notify.notify_one();
    }

    /// Bumps the read-credit counter by one. Does not itself guarantee
    /// forward progress unless something (an initial `read()`, or a prior
    /// completed read) is already driving the loop -- see the type docs.
    pub fn read_after(self: &Arc<Self>) {
        self.read_credit.fetch_add(1, Ordering::SeqCst);
        self.read_notify.notify_one();
    }

    /// Requests a graceful close: sends a WS close frame if currently
    /// `Open` and tears the connection down.
    pub fn close(self: &Arc<Self>) {
        let state = self.state();
        if state == SessionState::Closed || state == SessionState::Closing {
            return;
        }
        self.set_state(SessionState::Closing);
        self.close_notify.notify_one();
    }

    /// Spawns the connect-and-pump task on the host's runtime. Call once,
    /// after wiring hooks with the `set_on_*` methods.
    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        self.rt.spawn(async move {
            this.run().await;
        });
    }

    async fn run(self: Arc<Self>) {
        let mut ws = match self.connect().await {
            Ok(ws) => ws,
            Err((kind, msg)) => {
                self.set_state(SessionState::Closed);
                if let Some(cb) = self.on_conn_err.lock().unwrap().clone() {
                    cb(&self, kind, &msg);
                }
                return;
            }
        };

        self.set_state(SessionState::Open);
        if let Some(cb) = self.on_connect.lock().unwrap().clone() {
            cb(&self);
        }
        self.flush_writes(&mut ws).await;

        let mut keepalive = tokio::time::interval(self.keepalive_interval);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        keepalive.tick().await; // first tick fires immediately; consume it

        let mut read_buf: Vec<u8> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = self.close_notify.notified() => {
                    let _ = ws.write_frame(Frame::close_raw(Vec::new().into())).await;
                    break;
                }
                _ = self.write_notify.notified() => {
                    self.flush_writes(&mut ws).await;
                }
                _ = self.read_notify.notified() => {
                    if !self.do_read(&mut ws, &mut read_buf).await {
                        break;
                    }
                }
                _ = keepalive.tick() => {
                    if ws.write_frame(Frame::new(true, OpCode::Ping, None, Payload::Borrowed(&[]))).await.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Closed);
        if let Some(cb) = self.on_close.lock().unwrap().clone() {
            cb(&self);
        }
    }

    async fn flush_writes(self: &Arc<Self>, ws: &mut FragmentCollector<TokioIo<Upgraded>>) {
        loop {
            let next = self.write_queue.lock().unwrap().pop_front();
            let Some(payload) = next else { break };
            let len = payload.len();
            if let Err(e) = ws.write_frame(Frame::text(Payload::Owned(payload.to_vec()))).await {
                tracing::warn!(error = %e, "write_frame failed");
                self.close();
                break;
            }
            if let Some(cb) = self.on_write.lock().unwrap().clone() {
                cb(self, len);
            }
        }
    }

    /// Performs exactly one read, returning `false` if the connection
    /// should stop (close frame or transport error).
    async fn do_read(
        self: &Arc<Self>,
        ws: &mut FragmentCollector<TokioIo<Upgraded>>,
        read_buf: &mut Vec<u8>,
    ) -> bool {
        let frame = match ws.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "read_frame failed");
                return false;
            }
        };

        match frame.opcode {
            OpCode::Text | OpCode::Binary => {
                read_buf.extend_from_slice(&frame.payload);
                let consumed = match self.on_read.lock().unwrap().clone() {
                    Some(cb) => cb(self, read_buf),
                    None => read_buf.len(),
                };
                let consumed = consumed.min(read_buf.len());
                read_buf.drain(..consumed);
            }
            OpCode::Close => return false,
            _ => {}
        }

        if self.read_credit.fetch_sub(1, Ordering::SeqCst) > 0 {
            self.read_notify.notify_one();
        } else {
            self.read_credit.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    async fn connect(
        self: &Arc<Self>,
    ) -> std::result::Result<FragmentCollector<TokioIo<Upgraded>>, (ConnErrorKind, String)> {
        self.set_state(SessionState::Resolving);
        let addr = format!("{}:{}", self.host, self.port);

        self.set_state(SessionState::Connecting);
        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| (ConnErrorKind::Connect, "connect timed out".to_string()))?
            .map_err(|e| (ConnErrorKind::Connect, e.to_string()))?;

        self.set_state(SessionState::TlsHandshaking);
        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|_| (ConnErrorKind::Tls, "invalid DNS name".to_string()))?;
        let tls_stream = tokio::time::timeout(
            self.handshake_timeout,
            self.tls.connect(server_name, tcp),
        )
        .await
        .map_err(|_| (ConnErrorKind::Tls, "TLS handshake timed out".to_string()))?
        .map_err(|e| (ConnErrorKind::Tls, e.to_string()))?;

        self.set_state(SessionState::WsHandshaking);
        let req = Request::builder()
            .method("GET")
            .uri(self.uri.clone())
            .header("Host", &self.host)
            .header(UPGRADE, "websocket")
            .header(CONNECTION, "upgrade")
            .header(
                "Sec-WebSocket-Key",
                fastwebsockets::handshake::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .body(Empty::<Bytes>::new())
            .map_err(|e| (ConnErrorKind::WsHandshake, e.to_string()))?;

        let (ws, _response) = tokio::time::timeout(
            self.handshake_timeout,
            fastwebsockets::handshake::client(&SpawnExecutor, req, tls_stream),
        )
        .await
        .map_err(|_| (ConnErrorKind::WsHandshake, "WS handshake timed out".to_string()))?
        .map_err(|e| (ConnErrorKind::WsHandshake, e.to_string()))?;

        Ok(FragmentCollector::new(ws))
    }
}

struct SpawnExecutor;

impl<Fut> hyper::rt::Executor<Fut> for SpawnExecutor
where
    Fut: std::future::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    fn execute(&self, fut: Fut) {
        tokio::task::spawn(fut);
    }
}

/// Builds the `rustls`/`webpki-roots` TLS connector shared by all sessions
/// created by one host.
pub(crate) fn build_tls_connector() -> Result<TlsConnector> {
    let root_store = tokio_rustls::rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = tokio_rustls::rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}
