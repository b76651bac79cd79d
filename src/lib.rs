// src/lib.rs

//! Client-side market-data aggregation: subscribe to one or more
//! cryptocurrency exchanges over persistent WSS streams, decode each
//! venue's trade/ticker messages into a uniform [`price::PriceUpdate`],
//! maintain a per-symbol last-price cache and multi-resolution OHLC
//! time-series, and dispatch updates to registered callbacks.
//!
//! [`transport`] is the reusable async TLS WebSocket layer; [`foundation`]
//! glues it to [`price_store`], [`ohlc`], and [`registry`]; [`adapters`]
//! contributes the venue-specific endpoint, subscribe/unsubscribe framing,
//! and decode step for each exchange.

pub mod adapters;
pub mod config;
pub mod error;
pub mod foundation;
pub mod ohlc;
pub mod price;
pub mod price_store;
pub mod registry;
pub mod symbol;
pub mod transport;

pub use config::{FoundationConfig, ReconnectConfig};
pub use error::{ConfigError, WriteQueueError};
pub use foundation::{ExchangeFoundation, VenueCapability};
pub use price::{FixedPrice, PriceUpdate};
pub use symbol::Symbol;
pub use transport::TransportHost;
