//! Transaction wait-for graph.
//!
//! An edge `A -> B` means transaction A is blocked on a lock that B holds.
//! A cycle through a transaction means it can never be granted its lock, so
//! the lock manager fails that request with a deadlock instead of waiting.

use std::collections::{HashMap, HashSet};

use crate::common::TransactionId;

/// Directed graph of blocked transactions.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` is blocked on `holders`, replacing whatever it
    /// was waiting on before. A transaction never waits on itself.
    pub fn set_waiting<I>(&mut self, waiter: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let targets: HashSet<TransactionId> =
            holders.into_iter().filter(|&h| h != waiter).collect();
        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Drop the outgoing edges of `waiter` (it is no longer blocked).
    pub fn clear_waiting(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Remove `tid` from the graph entirely: its own edges and every edge
    /// pointing at it.
    pub fn remove_transaction(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        self.edges.retain(|_, targets| {
            targets.remove(&tid);
            !targets.is_empty()
        });
    }

    /// Transactions `waiter` is currently blocked on.
    #[cfg(test)]
    pub(crate) fn waiting_on(&self, waiter: TransactionId) -> Option<&HashSet<TransactionId>> {
        self.edges.get(&waiter)
    }

    /// Whether `tid` can reach itself along wait-for edges.
    pub fn is_on_cycle(&self, tid: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = match self.edges.get(&tid) {
            Some(targets) => targets.iter().copied().collect(),
            None => return false,
        };

        while let Some(node) = stack.pop() {
            if node == tid {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(targets) = self.edges.get(&node) {
                stack.extend(targets.iter().copied());
            }
        }
        false
    }

    /// Number of transactions with outgoing edges.
    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: u64) -> TransactionId {
        TransactionId::from_raw(id)
    }

    #[test]
    fn test_no_cycle_in_chain() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(2)]);
        g.set_waiting(t(2), [t(3)]);
        assert!(!g.is_on_cycle(t(1)));
        assert!(!g.is_on_cycle(t(3)));
    }

    #[test]
    fn test_two_cycle() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(2)]);
        g.set_waiting(t(2), [t(1)]);
        assert!(g.is_on_cycle(t(1)));
        assert!(g.is_on_cycle(t(2)));
    }

    #[test]
    fn test_three_cycle_and_bystander() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(2)]);
        g.set_waiting(t(2), [t(3)]);
        g.set_waiting(t(3), [t(1)]);
        // 4 waits into the cycle but is not on it
        g.set_waiting(t(4), [t(1)]);
        assert!(g.is_on_cycle(t(3)));
        assert!(!g.is_on_cycle(t(4)));
    }

    #[test]
    fn test_self_edges_ignored() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(1)]);
        assert!(g.waiting_on(t(1)).is_none());
        assert!(!g.is_on_cycle(t(1)));
    }

    #[test]
    fn test_set_waiting_replaces_edges() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(2)]);
        g.set_waiting(t(2), [t(1)]);
        g.set_waiting(t(1), [t(3)]);
        assert!(!g.is_on_cycle(t(2)));
    }

    #[test]
    fn test_remove_transaction_breaks_cycle() {
        let mut g = WaitForGraph::new();
        g.set_waiting(t(1), [t(2), t(3)]);
        g.set_waiting(t(2), [t(1)]);
        g.remove_transaction(t(2));

        assert!(!g.is_on_cycle(t(1)));
        assert_eq!(g.waiting_on(t(1)).unwrap().len(), 1);
        assert_eq!(g.waiter_count(), 1);

        g.remove_transaction(t(3));
        assert_eq!(g.waiter_count(), 0);
    }
}
