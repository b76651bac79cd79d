// src/adapters/mod.rs

//! Venue adapters (C7): endpoint, subscribe/unsubscribe framing, and JSON
//! decoding for each exchange, layered over the exchange-foundation core
//! via [`crate::foundation::VenueCapability`].

pub mod binance;
pub mod okx;

pub use binance::Binance;
pub use okx::Okx;
