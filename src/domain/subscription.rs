//! Per-session subscription set (component "Subscription" in spec §3).
//! A set of (symbol, timeframe) pairs plus an optional indicator-name
//! filter. Two sessions may hold identical or overlapping subscriptions;
//! there is no deduplication across sessions.

use crate::domain::timeframe::Timeframe;
use std::collections::HashSet;

pub type SubscriptionKey = (String, Timeframe);

#[derive(Debug, Clone, Default)]
pub struct Subscription {
    pub pairs: HashSet<SubscriptionKey>,
    pub indicator_filter: Option<HashSet<String>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// `subscribe(S,X); subscribe(S,X)` is idempotent: duplicate interest
    /// collapses into the same `HashSet` entry.
    pub fn add(&mut self, symbol: &str, timeframe: Timeframe) {
        self.pairs.insert((symbol.to_string(), timeframe));
    }

    /// `subscribe(S,X); unsubscribe(S,X)` returns the session to the
    /// state before the pair.
    pub fn remove(&mut self, symbol: &str, timeframe: Timeframe) {
        self.pairs.remove(&(symbol.to_string(), timeframe));
    }

    pub fn contains(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.pairs.contains(&(symbol.to_string(), timeframe))
    }

    pub fn wants_indicator(&self, name: &str) -> bool {
        match &self.indicator_filter {
            None => true,
            Some(set) => set.contains(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let mut s = Subscription::new();
        s.add("AAPL", Timeframe::M1);
        s.add("AAPL", Timeframe::M1);
        assert_eq!(s.pairs.len(), 1);
    }

    #[test]
    fn subscribe_then_unsubscribe_round_trips() {
        let mut s = Subscription::new();
        let before = s.clone();
        s.add("AAPL", Timeframe::M1);
        s.remove("AAPL", Timeframe::M1);
        assert_eq!(s.pairs, before.pairs);
    }

    #[test]
    fn indicator_filter_defaults_to_allow_all() {
        let s = Subscription::new();
        assert!(s.wants_indicator("RSI"));
    }
}
