// tests/common/mod.rs
//
// A tiny in-process mock exchange server, descended from the teacher's
// `mock_feed::ws_server`/`mock_feed::hot_cache` (random `bookTicker` feed
// over a fixed local port): generalized here to speak either venue's own
// subscribe/tick framing over an ephemeral port, driven by a fixed script
// of ticks rather than a random generator, since integration tests want
// deterministic assertions.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Binds an ephemeral local port and, on the first incoming connection,
/// reads exactly one subscribe message (discarded) and then writes each of
/// `ticks` as a text frame with a short delay between them.
///
/// Returns the bound address; the server runs to completion on a spawned
/// task.
pub async fn spawn_scripted_server(ticks: Vec<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock exchange");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            serve_one(stream, ticks).await;
        }
    });

    addr
}

async fn serve_one(stream: TcpStream, ticks: Vec<String>) {
    let mut ws: WebSocketStream<TcpStream> = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };

    // Drain the client's subscribe frame before streaming ticks, mirroring
    // the original exchange's own request/response ordering.
    let _subscribe = ws.next().await;

    for tick in ticks {
        if ws.send(Message::text(tick)).await.is_err() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

/// One OKX `tickers`-channel frame for `inst_id`/`last`/`ts`.
pub fn okx_ticker_frame(inst_id: &str, last: &str, ts: u64) -> String {
    serde_json::json!({
        "arg": {"channel": "tickers"},
        "data": [{"instId": inst_id, "last": last, "ts": ts.to_string()}],
    })
    .to_string()
}

/// One Binance `aggTrade` combined-stream frame for `symbol`/`price`/`ts`.
/// `symbol` is Binance's own upper-case, hyphen-free form (e.g. `BTCUSDT`).
pub fn binance_agg_trade_frame(symbol: &str, price: &str, ts: u64) -> String {
    let stream = format!("{}@aggTrade", symbol.to_lowercase());
    serde_json::json!({
        "stream": stream,
        "data": {"s": symbol, "p": price, "T": ts},
    })
    .to_string()
}
