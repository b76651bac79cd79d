// src/adapters/okx.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::config::ReconnectConfig;
use crate::foundation::{ExchangeFoundation, VenueCapability};
use crate::price::PriceUpdate;
use crate::symbol::Symbol;
use crate::transport::{ConnErrorKind, TransportHost, TransportSession};

/// OKX's public ticker endpoint (§4.7). Canonical symbols pass through
/// unchanged — OKX's own `instId` form already matches `BASE-QUOTE`.
pub const HOST: &str = "wspri.okx.com";
pub const PORT: u16 = 8443;
pub const URI: &str = "/ws/v5/ipublic";

/// OKX venue adapter: opens one public session on [`Okx::start`], wires the
/// pull-read hooks, and decodes `tickers`/`mark-price` channel frames into
/// [`PriceUpdate`]s for the foundation it owns.
///
/// Ported from `original_source/wbx/exc/exc_okx/OKX.{hpp,cpp}`: the same
/// `handlePubWsChan` dispatch on `arg.channel`, the same on-connect/
/// on-write/on-read pull-read wiring (`wss_pub_->read()` after write,
/// `wss_pub_->read()` after each decode), the same subscribe/unsubscribe
/// frame shape. Reconnect-with-backoff (§9) is new: the original let the
/// process supervisor restart on disconnect.
pub struct Okx {
    foundation: Arc<ExchangeFoundation>,
    transport: Arc<TransportHost>,
    session: Mutex<Option<Arc<TransportSession>>>,
    reconnect: ReconnectConfig,
    attempt: AtomicU32,
}

impl Okx {
    pub fn new(transport: Arc<TransportHost>) -> Arc<Self> {
        Self::new_with_reconnect(transport, ReconnectConfig::default())
    }

    pub fn new_with_reconnect(transport: Arc<TransportHost>, reconnect: ReconnectConfig) -> Arc<Self> {
        Arc::new(Self {
            foundation: Arc::new(ExchangeFoundation::new()),
            transport,
            session: Mutex::new(None),
            reconnect,
            attempt: AtomicU32::new(0),
        })
    }

    pub fn foundation(&self) -> &Arc<ExchangeFoundation> {
        &self.foundation
    }

    /// Opens the public session, wires its hooks, and starts the
    /// foundation. Call once.
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

    /// Decodes one raw OKX frame and folds any ticker/mark-price entries
    /// into the foundation. Also the entry point for replaying captured
    /// frames against a live adapter in tests.
    pub fn handle_read(&self, buf: &[u8]) {
        let msg: OkxMessage = match serde_json::from_slice(buf) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode OKX frame");
                return;
            }
        };

        let Some(data) = msg.data else { return };
        for entry in data {
            let Some(inst_id) = entry.inst_id else { continue };
            let Some(price) = entry.last.or(entry.mark_px) else { continue };
            let Some(ts_str) = entry.ts else { continue };
            let Ok(ts) = ts_str.parse::<u64>() else {
                tracing::debug!(ts = %ts_str, "OKX ts field is not a decimal integer");
                continue;
            };
            let symbol = match Symbol::parse(&inst_id) {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(error = %e, inst_id, "OKX instId is not a canonical symbol");
                    continue;
                }
            };
            if let Err(e) = self
                .foundation
                .invoke_price_update(PriceUpdate { symbol, price, ts })
            {
                tracing::warn!(error = %e, "failed to fold OKX price update");
            }
        }
    }

    fn send_batch(&self, op: &'static str, symbols: &[Symbol]) {
        let Some(session) = self.session.lock().unwrap().clone() else {
            return;
        };
        let args: Vec<_> = symbols
            .iter()
            .map(|s| serde_json::json!({"channel": "tickers", "instId": s.as_str()}))
            .collect();
        let frame = serde_json::json!({ "op": op, "args": args });
        if let Err(e) = session.write(frame.to_string()) {
            tracing::warn!(error = %e, "failed to enqueue OKX subscribe frame");
        }
    }
}

impl VenueCapability for Okx {
    fn venue_subscribe(&self, symbols: &[Symbol]) {
        self.send_batch("subscribe", symbols);
    }

    fn venue_unsubscribe(&self, symbols: &[Symbol]) {
        self.send_batch("unsubscribe", symbols);
    }
}

#[derive(Debug, Deserialize)]
struct OkxMessage {
    data: Option<Vec<OkxTickerEntry>>,
}

#[derive(Debug, Deserialize)]
struct OkxTickerEntry {
    #[serde(rename = "instId")]
    inst_id: Option<String>,
    last: Option<String>,
    #[serde(rename = "markPx")]
    mark_px: Option<String>,
    ts: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tickers_channel() {
        let raw = br#"{"arg":{"channel":"tickers"},"data":[{"instId":"BTC-USDT","last":"65000.1","ts":"1700000000000"}]}"#;
        let msg: OkxMessage = serde_json::from_slice(raw).unwrap();
        let entry = &msg.data.unwrap()[0];
        assert_eq!(entry.inst_id.as_deref(), Some("BTC-USDT"));
        assert_eq!(entry.last.as_deref(), Some("65000.1"));
        assert_eq!(entry.ts.as_deref(), Some("1700000000000"));
    }

    #[test]
    fn decodes_mark_price_channel_via_mark_px() {
        let raw = br#"{"arg":{"channel":"mark-price"},"data":[{"instId":"ETH-USDT","markPx":"3500.5","ts":"1700000000001"}]}"#;
        let msg: OkxMessage = serde_json::from_slice(raw).unwrap();
        let entry = &msg.data.unwrap()[0];
        assert_eq!(entry.mark_px.as_deref(), Some("3500.5"));
        assert!(entry.last.is_none());
    }

    #[test]
    fn subscribe_batch_frame_shape() {
        let host = TransportHost::new(&crate::config::FoundationConfig::default()).unwrap();
        let okx = Okx::new(host);
        okx.start();

        let symbols = [
            Symbol::parse("BTC-USDT").unwrap(),
            Symbol::parse("ETH-USDT").unwrap(),
            Symbol::parse("SOL-USDT").unwrap(),
        ];
        okx.venue_subscribe(&symbols);

        let session = okx.session.lock().unwrap().clone().unwrap();
        let queued = session.peek_write_queue();
        assert_eq!(queued.len(), 1);
        let frame: serde_json::Value = serde_json::from_slice(&queued[0]).unwrap();
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"].as_array().unwrap().len(), 3);
    }
}
