// src/transport/mod.rs

//! The exchange-foundation layer's asynchronous TLS WebSocket transport
//! (C1/C2): a reactor-owning [`host::TransportHost`] that creates and keeps
//! alive many [`session::TransportSession`]s.

pub mod host;
pub mod session;

pub use host::TransportHost;
pub use session::{ConnErrorKind, OnConnErrHook, OnCloseHook, OnConnectHook, OnReadHook, OnWriteHook, SessionState, TransportSession};
