// tests/okx_integration.rs
//
// Drives the real `Okx` adapter and its `ExchangeFoundation` against the
// scripted mock exchange server in `tests/common`: a raw `tokio-tungstenite`
// client stands in for `TransportSession`'s WSS handshake (exercised
// directly in `src/transport/session.rs`'s unit tests instead), but every
// byte it receives is handed to `Okx::handle_read` so the decode, price
// store, and registry dispatch are the crate's own code, not a reparse of
// the mock server's JSON.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use xfeed::adapters::Okx;
use xfeed::config::FoundationConfig;
use xfeed::symbol::Symbol;
use xfeed::transport::TransportHost;

#[tokio::test]
async fn subscribes_and_decodes_tickers_channel() {
    let ticks = vec![
        common::okx_ticker_frame("BTC-USDT", "65000.1", 1_700_000_000_000),
        common::okx_ticker_frame("BTC-USDT", "65010.2", 1_700_000_000_500),
    ];
    let addr = common::spawn_scripted_server(ticks).await;

    let host = TransportHost::new(&FoundationConfig::default()).unwrap();
    let okx = Okx::new(host);
    okx.start();

    let symbol = Symbol::parse("BTC-USDT").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    okx.foundation()
        .listen_price_update(
            symbol.clone(),
            Arc::new(move |update, _| {
                seen_clone.lock().unwrap().push(update.price.clone());
            }),
        )
        .unwrap();

    let url = format!("ws://{addr}/ws/v5/ipublic");
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("connect to mock OKX server");

    let result = timeout(Duration::from_secs(2), async {
        while seen.lock().unwrap().len() < 2 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                break;
            };
            okx.handle_read(text.as_bytes());
        }
    })
    .await;

    assert!(result.is_ok(), "timed out waiting for ticks");
    assert_eq!(*seen.lock().unwrap(), vec!["65000.1", "65010.2"]);

    let cached = Arc::new(Mutex::new(None));
    let cached_clone = cached.clone();
    okx.foundation()
        .get_last_price(&symbol, Box::new(move |p| *cached_clone.lock().unwrap() = Some(p)))
        .unwrap();
    assert_eq!(cached.lock().unwrap().as_deref(), Some("65010.2"));
}
