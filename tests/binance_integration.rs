// tests/binance_integration.rs
//
// Binance counterpart to `tests/okx_integration.rs`: same scripted mock
// server and raw client standing in for the WSS-handshaking
// `TransportSession`, but every received frame is handed to
// `Binance::handle_read` so the combined-stream decode, reverse symbol
// map, and `ExchangeFoundation` dispatch are the crate's own code.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use xfeed::adapters::Binance;
use xfeed::config::FoundationConfig;
use xfeed::symbol::Symbol;
use xfeed::transport::TransportHost;
use xfeed::VenueCapability;

#[tokio::test]
async fn subscribes_and_decodes_agg_trade_stream() {
    let ticks = vec![
        common::binance_agg_trade_frame("BTCUSDT", "65000.10000", 1_700_000_000_000),
        common::binance_agg_trade_frame("BTCUSDT", "65000.00000", 1_700_000_000_900),
    ];
    let addr = common::spawn_scripted_server(ticks).await;

    let host = TransportHost::new(&FoundationConfig::default()).unwrap();
    let binance = Binance::new(host);
    binance.start();

    // Registers the reverse symbol map Binance's decoder needs to turn
    // `BTCUSDT` back into the canonical `BTC-USDT`.
    let symbol = Symbol::parse("BTC-USDT").unwrap();
    binance.venue_subscribe(std::slice::from_ref(&symbol));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    binance
        .foundation()
        .listen_price_update(
            symbol.clone(),
            Arc::new(move |update, _| {
                seen_clone.lock().unwrap().push(update.price.clone());
            }),
        )
        .unwrap();

    let url = format!("ws://{addr}/stream");
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("connect to mock Binance server");

    let result = timeout(Duration::from_secs(2), async {
        while seen.lock().unwrap().len() < 2 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                break;
            };
            binance.handle_read(text.as_bytes());
        }
    })
    .await;

    assert!(result.is_ok(), "timed out waiting for ticks");
    assert_eq!(*seen.lock().unwrap(), vec!["65000.1", "65000"]);
}
