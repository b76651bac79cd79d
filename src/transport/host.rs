// src/transport/host.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;

use crate::config::FoundationConfig;
use crate::transport::session::{build_tls_connector, TransportSession};

/// Owner of the reactor and the TLS trust store (§4.2). Every
/// [`TransportSession`] created through this host shares its single
/// `rustls` trust anchor set and runs on its runtime.
///
/// Ported from the original `Websocket` class: one `io_context`/`ssl::context`
/// pair owned by the host, `createSession` handing out sessions the host
/// keeps alive in a `Vec`, and `run`/`bgRun` choosing whether the reactor
/// drives on the caller's thread or a dedicated worker.
pub struct TransportHost {
    rt: tokio::runtime::Runtime,
    tls: tokio_rustls::TlsConnector,
    sessions: Mutex<Vec<Arc<TransportSession>>>,
    open_count: AtomicUsize,
    idle: Arc<Notify>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    keepalive_interval: Duration,
    bg_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl TransportHost {
    pub fn new(config: &FoundationConfig) -> Result<Arc<Self>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build transport host runtime")?;
        let tls = build_tls_connector()?;

        Ok(Arc::new(Self {
            rt,
            tls,
            sessions: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            idle: Arc::new(Notify::new()),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            keepalive_interval: Duration::from_secs(config.keepalive_interval_secs),
            bg_thread: Mutex::new(None),
        }))
    }

    /// Creates a new session attached to this host. The session is kept
    /// alive by the host until [`TransportHost::close_session`] releases it.
    /// Call [`TransportSession::start`] on the returned handle (after
    /// wiring its hooks) to begin connecting.
    pub fn create_session(
        self: &Arc<Self>,
        host: impl Into<String>,
        port: u16,
        uri: impl Into<String>,
    ) -> Arc<TransportSession> {
        let session = TransportSession::new(
            host.into(),
            port,
            uri.into(),
            self.tls.clone(),
            self.rt.handle().clone(),
            self.connect_timeout,
            self.handshake_timeout,
            self.keepalive_interval,
        );
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(session.clone());
        session
    }

    /// Releases `session` from the host's keep-alive set. Does not itself
    /// request a WS close; callers that want a graceful close should call
    /// `session.close()` first.
    pub fn close_session(&self, session: &Arc<TransportSession>) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(pos) = sessions.iter().position(|s| Arc::ptr_eq(s, session)) {
            sessions.remove(pos);
            if self.open_count.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.idle.notify_waiters();
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Handle onto the host's runtime, for adapters that need to spawn
    /// their own housekeeping tasks (reconnect backoff) alongside session
    /// I/O.
    pub fn handle(&self) -> tokio::runtime::Handle {
        self.rt.handle().clone()
    }

    /// Drives the reactor on the calling thread until every session
    /// attached through `create_session` has been released (no more work
    /// exists). Intended for programs that have nothing else to do on
    /// their main thread.
    pub fn run(self: &Arc<Self>) {
        if self.open_count.load(Ordering::SeqCst) == 0 {
            return;
        }
        let idle = self.idle.clone();
        let open_count = &self.open_count;
        self.rt.block_on(async move {
            loop {
                if open_count.load(Ordering::SeqCst) == 0 {
                    break;
                }
                idle.notified().await;
            }
        });
    }

    /// Drives the reactor on a dedicated worker thread, returning
    /// immediately. The host's `Drop` joins the worker if it is still
    /// running.
    pub fn bg_run(self: &Arc<Self>) {
        let this = self.clone();
        let handle = std::thread::Builder::new()
            .name("transport-host".into())
            .spawn(move || this.run())
            .expect("failed to spawn transport host worker thread");
        *self.bg_thread.lock().unwrap() = Some(handle);
    }
}
