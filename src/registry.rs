// src/registry.rs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::price::PriceUpdate;
use crate::symbol::Symbol;

/// A persistent listener callback: invoked with the price update and the
/// opaque context supplied at `listen` time.
pub type ListenCb<Ctx> = Arc<dyn Fn(&PriceUpdate, &Ctx) + Send + Sync>;

/// A one-shot "give me the next price" callback: invoked once with the
/// formatted decimal price string, then discarded.
pub type OneShotCb = Box<dyn FnOnce(String) + Send>;

struct ListenerEntry<Ctx> {
    cb: ListenCb<Ctx>,
    ctx: Ctx,
}

/// Whether registering a one-shot callback requires the caller to also ask
/// the adapter to subscribe (no persistent listener is already driving
/// traffic for this symbol).
#[derive(Debug, PartialEq, Eq)]
pub enum OneShotOutcome {
    NeedsSubscribe,
    AlreadyCovered,
}

/// Result of dispatching a price update: whether a persistent listener was
/// invoked, the drained one-shot callbacks (to be invoked with the lock
/// released), and whether the adapter should now be asked to unsubscribe.
pub struct Dispatch<Ctx> {
    pub listener: Option<(ListenCb<Ctx>, Ctx)>,
    pub one_shots: Vec<OneShotCb>,
    pub needs_unsubscribe: bool,
}

/// Maps symbol -> active persistent listener, and symbol -> FIFO queue of
/// one-shot callbacks, under two separate locks (per §5: the registry,
/// price/OHLC, and one-shot locks never nest within a foundation
/// operation — the one-shot queue keeping its own lock lets `dispatch`
/// drain it without holding the listener lock across a lookup it doesn't
/// need).
pub struct Registry<Ctx> {
    listeners: Mutex<HashMap<Symbol, ListenerEntry<Ctx>>>,
    one_shots: Mutex<HashMap<Symbol, VecDeque<OneShotCb>>>,
}

impl<Ctx: Clone> Registry<Ctx> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            one_shots: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts or replaces the persistent listener for `symbol`. A second
    /// `listen` on the same symbol replaces the first (the old callback is
    /// simply dropped, never invoked again).
    pub fn listen(&self, symbol: Symbol, cb: ListenCb<Ctx>, ctx: Ctx) {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.insert(symbol, ListenerEntry { cb, ctx });
    }

    /// Removes the persistent listener for `symbol`, if any.
    pub fn unlisten(&self, symbol: &Symbol) {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.remove(symbol);
    }

    pub fn has_listener(&self, symbol: &Symbol) -> bool {
        let listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.contains_key(symbol)
    }

    /// Every symbol with a persistent listener or a pending one-shot,
    /// deduplicated. Used to resubscribe the full active set after a
    /// reconnect.
    pub fn active_symbols(&self) -> Vec<Symbol> {
        let mut set: std::collections::HashSet<Symbol> = self
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .keys()
            .cloned()
            .collect();
        set.extend(
            self.one_shots
                .lock()
                .expect("one-shot lock poisoned")
                .keys()
                .cloned(),
        );
        set.into_iter().collect()
    }

    /// Registers a one-shot callback for the next price update on `symbol`.
    /// Tells the caller whether a subscribe request is needed (no
    /// persistent listener is already present for this symbol).
    pub fn register_one_shot(&self, symbol: &Symbol, cb: OneShotCb) -> OneShotOutcome {
        {
            let mut one_shots = self.one_shots.lock().expect("one-shot lock poisoned");
            one_shots.entry(symbol.clone()).or_default().push_back(cb);
        }

        if self.has_listener(symbol) {
            OneShotOutcome::AlreadyCovered
        } else {
            OneShotOutcome::NeedsSubscribe
        }
    }

    /// Looks up the persistent listener and drains the one-shot queue for
    /// `update.symbol`. Callbacks are returned rather than invoked here so
    /// the caller can invoke them with all registry locks released
    /// (re-entrancy: a callback may call `listen`/`get_last_price` on the
    /// same foundation).
    pub fn dispatch(&self, update: &PriceUpdate) -> Dispatch<Ctx> {
        let listener = {
            let listeners = self.listeners.lock().expect("listener lock poisoned");
            listeners
                .get(&update.symbol)
                .map(|e| (e.cb.clone(), e.ctx.clone()))
        };

        let one_shots = {
            let mut queues = self.one_shots.lock().expect("one-shot lock poisoned");
            queues
                .remove(&update.symbol)
                .map(|q| q.into_iter().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        let needs_unsubscribe = listener.is_none() && one_shots.is_empty();

        Dispatch {
            listener,
            one_shots,
            needs_unsubscribe,
        }
    }
}

impl<Ctx: Clone> Default for Registry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
