// src/adapters/binance.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::config::ReconnectConfig;
use crate::foundation::{ExchangeFoundation, VenueCapability};
use crate::price::PriceUpdate;
use crate::symbol::Symbol;
use crate::transport::{ConnErrorKind, TransportHost, TransportSession};

/// Binance's combined-stream endpoint (§4.7).
pub const HOST: &str = "stream.binance.com";
pub const PORT: u16 = 443;
pub const URI: &str = "/stream";

/// Binance venue adapter: subscribes to `<symbol>@aggTrade` streams,
/// normalizing the canonical `BASE-QUOTE` symbol to Binance's lowercase
/// hyphen-free form on the way out and keeping a reverse map back to the
/// canonical form for decoding.
///
/// Ported from `original_source/wbx/exc/exc_binance/Binance.{hpp,cpp}`: the
/// same `normalize_pair`/reverse-map shape, the same `SUBSCRIBE` frame with
/// a monotonic `id`, and the same `rtrim_trailing_zeroes` policy applied to
/// `p` before it reaches the foundation. Reconnect-with-backoff (§9) is
/// new: the original let the process supervisor restart on disconnect.
pub struct Binance {
    foundation: Arc<ExchangeFoundation>,
    transport: Arc<TransportHost>,
    session: Mutex<Option<Arc<TransportSession>>>,
    normalized_pairs: Mutex<HashMap<String, Symbol>>,
    next_id: AtomicU64,
    reconnect: ReconnectConfig,
    attempt: AtomicU32,
}

impl Binance {
    pub fn new(transport: Arc<TransportHost>) -> Arc<Self> {
        Self::new_with_reconnect(transport, ReconnectConfig::default())
    }

    pub fn new_with_reconnect(transport: Arc<TransportHost>, reconnect: ReconnectConfig) -> Arc<Self> {
        Arc::new(Self {
            foundation: Arc::new(ExchangeFoundation::new()),
            transport,
            session: Mutex::new(None),
            normalized_pairs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reconnect,
            attempt: AtomicU32::new(0),
        })
    }

    pub fn foundation(&self) -> &Arc<ExchangeFoundation> {
        &self.foundation
    }

    pub fn start(self: &Arc<Self>) {
        self.open_session();
        self.foundation.set_venue(self.clone() as Arc<dyn VenueCapability>);
        self.foundation.start();
    }

    fn open_session(self: &Arc<Self>) {
        let session = self.transport.create_session(HOST, PORT, URI);
        *self.session.lock().unwrap() = Some(session.clone());

        let this = self.clone();
        session.set_on_connect(Arc::new(move |sess| {
            this.attempt.store(0, Ordering::SeqCst);
            sess.read_after();
        }));
        session.set_on_write(Arc::new(|sess, _len| sess.read()));

        let this = self.clone();
        session.set_on_read(Arc::new(move |sess, buf| {
            this.handle_read(buf);
            sess.read_after();
            buf.len()
        }));

        let this = self.clone();
        session.set_on_close(Arc::new(move |_sess| this.schedule_reconnect()));
        let this = self.clone();
        session.set_on_conn_err(Arc::new(move |_sess, _kind: ConnErrorKind, _detail| {
            this.schedule_reconnect()
        }));

        session.start();
    }

    /// Sleeps for the next backoff delay on the host's runtime, then opens
    /// a fresh session and resubscribes every symbol the foundation still
    /// has listeners for. No-op if reconnecting is disabled.
    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.reconnect.enabled {
            return;
        }
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst);
        let delay = self.reconnect.delay_for_attempt(attempt);
        let this = self.clone();
        self.transport.handle().spawn(async move {
            tokio::time::sleep(delay).await;
            this.open_session();
            let symbols = this.foundation.active_symbols();
            if !symbols.is_empty() {
                this.venue_subscribe(&symbols);
            }
        });
    }

    pub fn close(&self) {
        if let Some(session) = self.session.lock().unwrap().take() {
            session.close();
            self.transport.close_session(&session);
        }
        self.foundation.close();
    }

    /// Decodes one raw Binance combined-stream frame and folds an
    /// `aggTrade` payload into the foundation. Also the entry point for
    /// replaying captured frames against a live adapter in tests.
    pub fn handle_read(&self, buf: &[u8]) {
        let msg: BinanceMessage = match serde_json::from_slice(buf) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode Binance frame");
                return;
            }
        };

        let Some(stream) = msg.stream else { return };
        if !stream.ends_with("@aggTrade") {
            return;
        }
        let Some(data) = msg.data else { return };

        let normalized = normalize_pair(&data.s);
        let symbol = {
            let pairs = self.normalized_pairs.lock().unwrap();
            match pairs.get(&normalized) {
                Some(s) => s.clone(),
                None => {
                    tracing::debug!(symbol = %data.s, "Binance tick for an unsubscribed symbol");
                    return;
                }
            }
        };

        let price = rtrim_trailing_zeroes(&data.p);
        if let Err(e) = self.foundation.invoke_price_update(PriceUpdate {
            symbol,
            price,
            ts: data.t,
        }) {
            tracing::warn!(error = %e, "failed to fold Binance price update");
        }
    }

    fn send_batch(&self, method: &'static str, symbols: &[Symbol]) {
        let Some(session) = self.session.lock().unwrap().clone() else {
            return;
        };

        let mut params = Vec::with_capacity(symbols.len());
        {
            let mut pairs = self.normalized_pairs.lock().unwrap();
            for symbol in symbols {
                let normalized = normalize_pair(symbol.as_str());
                pairs.insert(normalized.clone(), symbol.clone());
                params.push(format!("{normalized}@aggTrade"));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::json!({ "method": method, "params": params, "id": id });
        if let Err(e) = session.write(frame.to_string()) {
            tracing::warn!(error = %e, "failed to enqueue Binance subscribe frame");
        }
    }
}

impl VenueCapability for Binance {
    fn venue_subscribe(&self, symbols: &[Symbol]) {
        self.send_batch("SUBSCRIBE", symbols);
    }

    fn venue_unsubscribe(&self, symbols: &[Symbol]) {
        self.send_batch("UNSUBSCRIBE", symbols);
    }
}

/// `BTC-USDT` -> `btcusdt`: lowercase, hyphen removed.
fn normalize_pair(pair: &str) -> String {
    pair.chars()
        .filter(|c| *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Strips trailing fractional zeros (and a bare trailing `.`) from a
/// decimal string: `"65000.10000"` -> `"65000.1"`, `"65000.00000"` ->
/// `"65000"`. Strings with no `.` pass through unchanged.
fn rtrim_trailing_zeroes(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Deserialize)]
struct BinanceMessage {
    stream: Option<String>,
    data: Option<BinanceAggTrade>,
}

#[derive(Debug, Deserialize)]
struct BinanceAggTrade {
    s: String,
    p: String,
    #[serde(rename = "T")]
    t: u64,
}
