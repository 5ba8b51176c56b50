//! Insertion-ordered map keyed by ticker.
//!
//! Request order drives trace order in the aggregated chart, so per-ticker
//! results are kept in the order tickers were requested.

use crate::domain::ticker::TickerSymbol;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerMap<T> {
    entries: Vec<(TickerSymbol, T)>,
}

impl<T> TickerMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace; a replaced entry keeps its original position.
    pub fn insert(&mut self, ticker: TickerSymbol, value: T) -> Option<T> {
        match self.entries.iter_mut().find(|(t, _)| *t == ticker) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((ticker, value));
                None
            }
        }
    }

    pub fn get(&self, ticker: &TickerSymbol) -> Option<&T> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, ticker: &TickerSymbol) -> bool {
        self.get(ticker).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TickerSymbol, &T)> {
        self.entries.iter().map(|(t, v)| (t, v))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &TickerSymbol> {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<T> Default for TickerMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(TickerSymbol, T)> for TickerMap<T> {
    fn from_iter<I: IntoIterator<Item = (TickerSymbol, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (ticker, value) in iter {
            map.insert(ticker, value);
        }
        map
    }
}

impl<T> IntoIterator for TickerMap<T> {
    type Item = (TickerSymbol, T);
    type IntoIter = std::vec::IntoIter<(TickerSymbol, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
