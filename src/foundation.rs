// src/foundation.rs

use std::sync::Arc;

use crate::error::ConfigError;
use crate::ohlc::OHLCPrice;
use crate::price::PriceUpdate;
use crate::price_store::PriceStore;
use crate::registry::{ListenCb, OneShotCb, OneShotOutcome, Registry};
use crate::symbol::Symbol;

/// What an adapter does in response to the foundation deciding a symbol
/// needs (un)subscribing. Implemented by each venue module; the foundation
/// never speaks venue wire format itself.
pub trait VenueCapability: Send + Sync {
    fn venue_subscribe(&self, symbols: &[Symbol]);
    fn venue_unsubscribe(&self, symbols: &[Symbol]);
}

/// Glues the price store, OHLC engine, subscription registry, and a venue
/// adapter together. One `ExchangeFoundation` per venue connection; this is
/// the object adapters and application code both hold a handle to.
///
/// Ported wholesale from the original `ExchangeFoundation` class, with the
/// adapter's `virtual __listenPriceUpdate`/`__getLastPrice` dispatch
/// replaced by the `VenueCapability` trait object the spec's design notes
/// call for in place of virtual inheritance.
pub struct ExchangeFoundation {
    store: PriceStore,
    registry: Registry<()>,
    venue: std::sync::OnceLock<Arc<dyn VenueCapability>>,
    started: std::sync::atomic::AtomicBool,
}

impl ExchangeFoundation {
    pub fn new() -> Self {
        Self {
            store: PriceStore::new(),
            registry: Registry::new(),
            venue: std::sync::OnceLock::new(),
            started: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Wires the venue adapter in. Must be called exactly once, before
    /// `start()`.
    pub fn set_venue(&self, venue: Arc<dyn VenueCapability>) {
        let _ = self.venue.set(venue);
    }

    /// Marks the foundation ready to accept `listen_price_update` and
    /// `get_last_price` calls. Before this, both return
    /// [`ConfigError::NotStarted`].
    pub fn start(&self) {
        self.started.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.started.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn require_started(&self) -> Result<(), ConfigError> {
        if self.started.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConfigError::NotStarted)
        }
    }

    fn venue(&self) -> Option<&Arc<dyn VenueCapability>> {
        self.venue.get()
    }

    /// Registers a persistent listener for `symbol`'s price updates,
    /// subscribing with the venue if this is the first interest in the
    /// symbol.
    pub fn listen_price_update(
        &self,
        symbol: Symbol,
        cb: ListenCb<()>,
    ) -> Result<(), ConfigError> {
        self.require_started()?;
        let already_subscribed = self.registry.has_listener(&symbol);
        self.registry.listen(symbol.clone(), cb, ());
        if !already_subscribed {
            if let Some(venue) = self.venue() {
                venue.venue_subscribe(std::slice::from_ref(&symbol));
            }
        }
        Ok(())
    }

    pub fn unlisten_price_update(&self, symbol: &Symbol) -> Result<(), ConfigError> {
        self.require_started()?;
        self.registry.unlisten(symbol);
        if let Some(venue) = self.venue() {
            venue.venue_unsubscribe(std::slice::from_ref(symbol));
        }
        Ok(())
    }

    /// Batch variant with one callback shared across every symbol, emitted
    /// as a single venue subscribe request for whichever symbols weren't
    /// already listened to.
    pub fn listen_price_update_batch_shared(
        &self,
        symbols: Vec<Symbol>,
        cb: ListenCb<()>,
    ) -> Result<(), ConfigError> {
        if symbols.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        let cbs = std::iter::repeat(cb).take(symbols.len()).collect();
        self.listen_price_update_batch(symbols, cbs)
    }

    /// Batch variant: `symbols`, `cbs` must be equal length (§4.3:
    /// `BatchLengthMismatch` if not). Emitted as a single venue subscribe
    /// request covering every symbol not already listened to.
    pub fn listen_price_update_batch(
        &self,
        symbols: Vec<Symbol>,
        cbs: Vec<ListenCb<()>>,
    ) -> Result<(), ConfigError> {
        self.require_started()?;
        if symbols.len() != cbs.len() {
            return Err(ConfigError::BatchLengthMismatch {
                symbols: symbols.len(),
                cbs: cbs.len(),
                ctxs: symbols.len(),
            });
        }

        let mut fresh = Vec::new();
        for (symbol, cb) in symbols.into_iter().zip(cbs.into_iter()) {
            let already_subscribed = self.registry.has_listener(&symbol);
            self.registry.listen(symbol.clone(), cb, ());
            if !already_subscribed {
                fresh.push(symbol);
            }
        }
        if !fresh.is_empty() {
            if let Some(venue) = self.venue() {
                venue.venue_subscribe(&fresh);
            }
        }
        Ok(())
    }

    /// Unsubscribes every symbol in `symbols` in one venue request.
    pub fn unlisten_price_update_batch(&self, symbols: &[Symbol]) -> Result<(), ConfigError> {
        self.require_started()?;
        for symbol in symbols {
            self.registry.unlisten(symbol);
        }
        if !symbols.is_empty() {
            if let Some(venue) = self.venue() {
                venue.venue_unsubscribe(symbols);
            }
        }
        Ok(())
    }

    /// Returns the cached last price synchronously if `symbol` already has
    /// one, else registers a one-shot callback for the next tick
    /// (subscribing with the venue if nothing was already listening).
    pub fn get_last_price(&self, symbol: &Symbol, cb: OneShotCb) -> Result<(), ConfigError> {
        self.require_started()?;
        let cached = self.store.get_last_price(symbol);
        if !cached.is_empty() {
            cb(cached);
            return Ok(());
        }

        let outcome = self.registry.register_one_shot(symbol, cb);
        if outcome == OneShotOutcome::NeedsSubscribe {
            if let Some(venue) = self.venue() {
                venue.venue_subscribe(std::slice::from_ref(symbol));
            }
        }
        Ok(())
    }

    /// Entry point for adapters: folds `update` into the price store and
    /// OHLC engine, then dispatches it to the registry. The persistent
    /// listener and drained one-shots are invoked here, after the
    /// dispatch's internal locks have been released (re-entrancy: a
    /// callback may itself call `listen_price_update`/`get_last_price`).
    pub fn invoke_price_update(&self, update: PriceUpdate) -> anyhow::Result<()> {
        self.store
            .set_last_price(&update.symbol, &update.price, update.ts)?;

        let dispatch = self.registry.dispatch(&update);
        let price_str = self.store.get_last_price(&update.symbol);

        if let Some((cb, ctx)) = dispatch.listener {
            cb(&update, &ctx);
        }
        for one_shot in dispatch.one_shots {
            one_shot(price_str.clone());
        }
        if dispatch.needs_unsubscribe {
            if let Some(venue) = self.venue() {
                venue.venue_unsubscribe(std::slice::from_ref(&update.symbol));
            }
        }
        Ok(())
    }

    /// Every symbol currently listened to (persistent or one-shot),
    /// deduplicated. Adapters use this to resubscribe the whole active set
    /// after a reconnect.
    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.registry.active_symbols()
    }

    /// Returns the most recent 1-minute bar for `symbol`, colorized for
    /// terminal output the way the original `dumpOHLCData` diagnostic did:
    /// green when the bar closed up from its open, red when down, plain
    /// otherwise.
    pub fn dump_ohlc(&self, symbol: &Symbol) -> Option<String> {
        let bar = self.store.last_1m_bar(symbol)?;
        Some(colorize_bar(symbol, &bar))
    }
}

impl Default for ExchangeFoundation {
    fn default() -> Self {
        Self::new()
    }
}

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

fn colorize_bar(symbol: &Symbol, bar: &OHLCPrice) -> String {
    let color = if bar.close > bar.open {
        ANSI_GREEN
    } else if bar.close < bar.open {
        ANSI_RED
    } else {
        ""
    };
    let reset = if color.is_empty() { "" } else { ANSI_RESET };
    format!(
        "{color}{symbol} 1m O:{} H:{} L:{} C:{} (scale {}){reset}",
        bar.open, bar.high, bar.low, bar.close, bar.scale,
    )
}
