//! Population / empty-test (C8).
//!
//! Grounded on `hlifealgo::calcpop`/`isEmpty` in
//! `examples/original_source/gollybase/hlifealgo.cpp`, which memoises the
//! population sum by temporarily repurposing each marked node's `next`
//! (hash-chain) pointer as a `bigint*`. Per the "Bit-twiddled result slot"
//! design note this rewrite uses a dedicated memo table keyed by `NodeId`
//! instead of stealing a pointer field.

use rustc_hash::FxHashMap;

use crate::bigint::BigInt;
use crate::node::{NodeArena, NodeId, NodeKind};

#[derive(Default)]
pub struct PopulationCache {
    memo: FxHashMap<NodeId, BigInt>,
}

impl PopulationCache {
    pub fn new() -> Self {
        PopulationCache { memo: FxHashMap::default() }
    }

    /// Drops all memoised sums. Call after a GC sweep: freed `NodeId`s may
    /// be reused by the arena with a new generation, and a stale entry
    /// would otherwise never be evicted.
    pub fn invalidate(&mut self) {
        self.memo.clear();
    }

    /// Population of the square rooted at `id` (level `level`), per
    /// `calcpop`. `zero` is the engine's canonical all-dead node at each
    /// level, so an empty subtree short-circuits without touching the
    /// arena.
    pub fn population(&mut self, arena: &NodeArena, zero: &[NodeId], id: NodeId, level: u8) -> BigInt {
        if zero.get(level as usize) == Some(&id) {
            return BigInt::zero();
        }
        match arena[id].kind {
            NodeKind::Leaf(data) => BigInt::from_u64(data.population() as u64),
            NodeKind::Branch { nw, ne, sw, se } => {
                if let Some(v) = self.memo.get(&id) {
                    return v.clone();
                }
                let sum = self
                    .population(arena, zero, nw, level - 1)
                    .add(&self.population(arena, zero, ne, level - 1))
                    .add(&self.population(arena, zero, sw, level - 1))
                    .add(&self.population(arena, zero, se, level - 1));
                self.memo.insert(id, sum.clone());
                sum
            }
        }
    }

    /// `isEmpty`: true iff `id` is the canonical all-dead node at `level`.
    pub fn is_empty(zero: &[NodeId], id: NodeId, level: u8) -> bool {
        zero.get(level as usize) == Some(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::SaveStack;
    use crate::index::HashIndex;
    use crate::node::LeafData;

    #[test]
    fn population_sums_leaves_through_branches() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let dead = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
        let z_leaf = index.find_leaf(&mut arena, &mut stack, dead);
        let alive = index.find_leaf(&mut arena, &mut stack, LeafData { nw: 0b11, ne: 0, sw: 0, se: 0 });
        let branch = index.find_node(&mut arena, &mut stack, alive, z_leaf, z_leaf, z_leaf, 3);
        let zero_level3 = index.find_node(&mut arena, &mut stack, z_leaf, z_leaf, z_leaf, z_leaf, 3);
        let zero = vec![z_leaf, z_leaf, z_leaf, zero_level3];

        let mut pop = PopulationCache::new();
        assert_eq!(pop.population(&arena, &zero, branch, 3), BigInt::from_u64(2));
        assert!(PopulationCache::is_empty(&zero, z_leaf, 2));
        assert!(!PopulationCache::is_empty(&zero, branch, 3));
    }

    #[test]
    fn memoised_population_is_reused() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let dead = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
        let z_leaf = index.find_leaf(&mut arena, &mut stack, dead);
        let branch = index.find_node(&mut arena, &mut stack, z_leaf, z_leaf, z_leaf, z_leaf, 3);
        let zero = vec![z_leaf, z_leaf, z_leaf, branch];

        let mut pop = PopulationCache::new();
        assert_eq!(pop.population(&arena, &zero, branch, 3), BigInt::zero());
    }
}
