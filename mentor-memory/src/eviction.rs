//! Capacity hooks for the parent store.
//!
//! The store grows monotonically by default ([`Unbounded`]). A retriever
//! configured with another [`EvictionPolicy`] removes the selected parents
//! and their child chunks together, so the index never points at a missing
//! parent.

/// Chooses which parents to evict after an ingestion.
pub trait EvictionPolicy: Send + Sync {
    /// Given every stored parent id, oldest first, return the ids to evict.
    fn select_victims(&self, ids_oldest_first: &[String]) -> Vec<String>;
}

/// Never evicts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn select_victims(&self, _ids_oldest_first: &[String]) -> Vec<String> {
        Vec::new()
    }
}

/// Keeps at most `n` parents, evicting the oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxParents(pub usize);

impl EvictionPolicy for MaxParents {
    fn select_victims(&self, ids_oldest_first: &[String]) -> Vec<String> {
        let excess = ids_oldest_first.len().saturating_sub(self.0);
        ids_oldest_first[..excess].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{i}")).collect()
    }

    #[test]
    fn unbounded_keeps_everything() {
        assert!(Unbounded.select_victims(&ids(1000)).is_empty());
    }

    #[test]
    fn max_parents_evicts_oldest() {
        assert_eq!(MaxParents(2).select_victims(&ids(4)), vec!["p0", "p1"]);
        assert!(MaxParents(5).select_victims(&ids(4)).is_empty());
    }
}
