// src/price_store.rs

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ohlc::{OHLCGroup, OHLCPrice};
use crate::price::{format_price, parse_decimal_str, rescale_up, FixedPrice};
use crate::symbol::Symbol;

/// Per-symbol last price, decimal scale, and OHLC state, guarded by one
/// lock.
///
/// The original implementation this is ported from (`ExchangeFoundation`'s
/// `m_last_prices_mtx_`) guards its last-price map, its precision map, and
/// its OHLC map with the same single mutex, and this crate keeps that
/// grouping: a tick's price-store update and its OHLC fold are one
/// atomic step, which is also what lets `invoke_price_update` read a
/// consistent (value, scale) pair to hand to the OHLC fold.
pub struct PriceStore {
    inner: Mutex<Inner>,
}

struct Inner {
    last_value: HashMap<Symbol, u64>,
    scale: HashMap<Symbol, u64>,
    ohlc: HashMap<Symbol, OHLCGroup>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_value: HashMap::new(),
                scale: HashMap::new(),
                ohlc: HashMap::new(),
            }),
        }
    }

    /// Folds a raw decimal price into the last-price map (applying the
    /// non-decreasing-scale rule) and into all eight OHLC resolutions for
    /// `symbol`, in one critical section.
    pub fn set_last_price(&self, symbol: &Symbol, price: &str, ts: u64) -> anyhow::Result<FixedPrice> {
        let incoming = parse_decimal_str(price)?;
        let mut inner = self.inner.lock().expect("price store lock poisoned");

        let resolved = match inner.scale.get(symbol).copied() {
            Some(stored_scale) if incoming.scale < stored_scale => FixedPrice {
                value: rescale_up(incoming.value, incoming.scale, stored_scale),
                scale: stored_scale,
            },
            Some(_) | None => incoming,
        };

        inner.last_value.insert(symbol.clone(), resolved.value);
        inner.scale.insert(symbol.clone(), resolved.scale);
        inner
            .ohlc
            .entry(symbol.clone())
            .or_default()
            .fold(resolved.value, resolved.scale, ts);

        Ok(resolved)
    }

    /// Returns the formatted decimal string for a symbol's last known price,
    /// or an empty string if the symbol has never been seen.
    pub fn get_last_price(&self, symbol: &Symbol) -> String {
        let inner = self.inner.lock().expect("price store lock poisoned");
        match (inner.last_value.get(symbol), inner.scale.get(symbol)) {
            (Some(&value), Some(&scale)) => format_price(value, scale),
            _ => String::new(),
        }
    }

    /// Returns the most recent 1-minute bar for `symbol`, used by the
    /// `dump_ohlc` diagnostic.
    pub fn last_1m_bar(&self, symbol: &Symbol) -> Option<OHLCPrice> {
        let inner = self.inner.lock().expect("price store lock poisoned");
        inner.ohlc.get(symbol).and_then(|g| g.last_1m().copied())
    }

    /// Returns a snapshot of the full `OHLCGroup` for `symbol`, if any ticks
    /// have been observed for it.
    pub fn ohlc_group(&self, symbol: &Symbol) -> Option<OHLCGroup> {
        let inner = self.inner.lock().expect("price store lock poisoned");
        inner.ohlc.get(symbol).cloned()
    }
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new()
    }
}
