//! Operator watchlist.
//!
//! An explicit, capacity-bounded store of monitored instruments owned
//! by the orchestrating layer. When populated, a scan runs over the
//! watchlist instead of the full exchange pool.

use crate::types::Instrument;

/// Maximum entries a watchlist can hold.
pub const WATCHLIST_CAPACITY: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WatchlistError {
    #[error("watchlist is full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("{0} is already on the watchlist")]
    Duplicate(String),

    #[error("not a valid instrument symbol: {0}")]
    InvalidSymbol(String),
}

/// Bounded, duplicate-free list of instruments to monitor.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    entries: Vec<Instrument>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured symbols. Invalid symbols fail the whole
    /// load — a typo in config should be loud, not silently dropped.
    pub fn from_symbols(symbols: &[String]) -> Result<Self, WatchlistError> {
        let mut list = Self::new();
        for symbol in symbols {
            let inst = Instrument::parse(symbol)
                .ok_or_else(|| WatchlistError::InvalidSymbol(symbol.clone()))?;
            list.add(inst)?;
        }
        Ok(list)
    }

    /// Add an instrument. Capacity and duplicate checks happen under
    /// the same call, so the ≤ capacity invariant holds at every
    /// insertion point.
    pub fn add(&mut self, instrument: Instrument) -> Result<(), WatchlistError> {
        if self.entries.contains(&instrument) {
            return Err(WatchlistError::Duplicate(instrument.symbol()));
        }
        if self.entries.len() >= WATCHLIST_CAPACITY {
            return Err(WatchlistError::Full {
                capacity: WATCHLIST_CAPACITY,
            });
        }
        self.entries.push(instrument);
        Ok(())
    }

    /// Remove by symbol. Returns whether anything was removed.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|i| i.symbol() != symbol);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in insertion order.
    pub fn list(&self) -> &[Instrument] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
