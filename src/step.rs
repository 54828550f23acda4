//! Step driver (C6): advances the universe by an arbitrary generation
//! increment, expanding and trimming the root as needed.
//!
//! Grounded on `hlifealgo::setIncrement`/`step`/`runpattern`/`pushroot` in
//! `examples/original_source/gollybase/hlifealgo.cpp`. The original factors
//! the increment into `2^k * odd` once in `setIncrement` and then calls
//! `runpattern` `odd` times in `step()`, each call advancing by `2^k`
//! generations; this rewrite keeps the same split.

use crate::bigint::BigInt;
use crate::cache::{get_result, Ctx};
use crate::error::EngineError;
use crate::gc::SaveStack;
use crate::index::HashIndex;
use crate::node::NodeArena;
use crate::node::NodeId;

/// A factored generation increment: advance by `2^pow2` generations,
/// `odd` times per call to [`step`].
#[derive(Debug, Clone, Copy)]
pub struct Increment {
    pow2: u32,
    odd: u64,
}

impl Increment {
    /// `setIncrement`: factors `amount` as `2^k * odd`. The odd part must
    /// fit in 31 bits, mirroring Golly's own limit — an increment with a
    /// larger odd factor would require looping `runpattern` more times than
    /// is practical in one `step` call.
    pub fn new(amount: &BigInt) -> Result<Increment, EngineError> {
        let (pow2, odd) = amount.factor_power_of_two();
        if odd.is_zero() && !amount.is_zero() {
            return Err(EngineError::InternalInvariantViolation(
                "factor_power_of_two produced zero odd part for a nonzero increment".into(),
            ));
        }
        if odd > BigInt::from_u64(1) && odd.low_bits(32) > 0x7fff_ffff {
            return Err(EngineError::IncrementFactor(amount.to_decimal_string()));
        }
        Ok(Increment { pow2, odd: odd.low_bits(63) })
    }

    pub fn pow2(&self) -> u32 {
        self.pow2
    }
}

/// The live root plus its bookkeeping: level and generation count, mutated
/// in place by [`step`].
pub struct Universe {
    pub root: NodeId,
    pub level: u8,
    pub generation: BigInt,
}

fn zero_at(empty: &[NodeId], level: u8) -> NodeId {
    empty[level as usize]
}

/// `pushroot`: expands the root by one level, surrounding the existing
/// pattern with a border of dead cells one quadrant wide.
pub(crate) fn push_root(arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, empty: &[NodeId], root: NodeId, level: u8) -> NodeId {
    let (nw, ne, sw, se) = arena[root].children().expect("push_root on a leaf root");
    let z = zero_at(empty, level - 1);
    let new_nw = index.find_node(arena, stack, z, z, z, nw, level);
    let new_ne = index.find_node(arena, stack, z, z, ne, z, level);
    let new_sw = index.find_node(arena, stack, z, sw, z, z, level);
    let new_se = index.find_node(arena, stack, se, z, z, z, level);
    index.find_node(arena, stack, new_nw, new_ne, new_sw, new_se, level + 1)
}

/// `popzeros`: shrinks the root back down while its outer ring of
/// grandchildren is entirely empty, to a floor of level 3.
fn pop_zeros(arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, empty: &[NodeId], mut root: NodeId, mut level: u8) -> (NodeId, u8) {
    while level > 3 {
        let (nw, ne, sw, se) = arena[root].children().expect("pop_zeros on a leaf root");
        let (nw_nw, nw_ne, nw_sw, nw_se) = arena[nw].children().expect("pop_zeros: nw is a leaf");
        let (ne_nw, ne_ne, ne_sw, ne_se) = arena[ne].children().expect("pop_zeros: ne is a leaf");
        let (sw_nw, sw_ne, sw_sw, sw_se) = arena[sw].children().expect("pop_zeros: sw is a leaf");
        let (se_nw, se_ne, se_sw, se_se) = arena[se].children().expect("pop_zeros: se is a leaf");
        let z = zero_at(empty, level - 2);
        let outer_empty = nw_nw == z && nw_ne == z && nw_sw == z
            && ne_nw == z && ne_ne == z && ne_se == z
            && sw_nw == z && sw_sw == z && sw_se == z
            && se_ne == z && se_sw == z && se_se == z;
        if !outer_empty {
            break;
        }
        root = index.find_node(arena, stack, nw_se, ne_sw, sw_ne, se_nw, level - 1);
        level -= 1;
    }
    (root, level)
}

/// Grows `empty` (direct-indexed by level) up to and including `level`,
/// building each new all-dead node from the previous one.
pub(crate) fn ensure_empty_level(arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, empty: &mut Vec<NodeId>, level: u8) {
    while empty.len() <= level as usize {
        let z = *empty.last().unwrap();
        let lvl = empty.len() as u8;
        empty.push(index.find_node(arena, stack, z, z, z, z, lvl));
    }
}

/// `runpattern`: one full `2^ngens`-generation jump, expanding the root
/// until it has enough headroom, recursing into the result cache, then
/// trimming back down.
fn run_pattern(ctx_arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, table: &[u8; 65536], empty: &mut Vec<NodeId>, interrupt: &mut dyn FnMut() -> bool, root: NodeId, level: u8, ngens: u32) -> (NodeId, u8) {
    let mut root = root;
    let mut level = level;
    while (ngens as u8) + 2 > level {
        ensure_empty_level(ctx_arena, index, stack, empty, level);
        root = push_root(ctx_arena, index, stack, empty, root, level);
        level += 1;
    }
    ensure_empty_level(ctx_arena, index, stack, empty, level);
    let mut ctx = Ctx {
        arena: ctx_arena,
        index,
        stack,
        table,
        empty,
        ngens,
        interrupt,
    };
    let new_root = get_result(&mut ctx, root, level as u32);
    let new_level = level - 1;
    pop_zeros(ctx_arena, index, stack, empty, new_root, new_level)
}

/// `step`: advances `universe` by the increment previously set with
/// [`Increment::new`], `inc.odd` times, each a `2^inc.pow2`-generation jump.
pub fn step(
    arena: &mut NodeArena,
    index: &mut HashIndex,
    stack: &mut SaveStack,
    table: &[u8; 65536],
    empty: &mut Vec<NodeId>,
    interrupt: &mut dyn FnMut() -> bool,
    universe: &mut Universe,
    inc: Increment,
) {
    let step_amount = BigInt::from_u64(1).shl(inc.pow2 as u64);
    for _ in 0..inc.odd.max(1) {
        if interrupt() {
            break;
        }
        let (root, level) = run_pattern(arena, index, stack, table, empty, interrupt, universe.root, universe.level, inc.pow2);
        universe.root = root;
        universe.level = level;
        universe.generation = universe.generation.add(&step_amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LeafData;
    use crate::rule::compile;

    /// Builds `empty` indexed directly by level (`empty[level]` is the
    /// canonical all-dead node at that level); indices 0 and 1 are never
    /// read since the tree bottoms out at level 2, but are filled with the
    /// leaf anyway so indexing stays direct.
    fn make_empty_chain(arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, top: u8) -> Vec<NodeId> {
        let leaf = index.find_leaf(arena, stack, LeafData { nw: 0, ne: 0, sw: 0, se: 0 });
        let mut levels = vec![leaf, leaf, leaf];
        for level in 3..=top {
            let z = *levels.last().unwrap();
            levels.push(index.find_node(arena, stack, z, z, z, z, level));
        }
        levels
    }

    #[test]
    fn stepping_an_empty_universe_leaves_it_empty_and_advances_generation() {
        let rule = compile("B3/S23").unwrap();
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(64);
        let mut stack = SaveStack::new();
        let mut empty = make_empty_chain(&mut arena, &mut index, &mut stack, 5);
        let root = *empty.last().unwrap();
        let level = arena[root].level;

        let mut universe = Universe { root, level, generation: BigInt::zero() };
        let inc = Increment::new(&BigInt::from_u64(4)).unwrap();
        assert_eq!(inc.pow2(), 2);

        let mut interrupt = || false;
        step(&mut arena, &mut index, &mut stack, &rule.table, &mut empty, &mut interrupt, &mut universe, inc);

        assert_eq!(universe.generation, BigInt::from_u64(4));
        assert_eq!(arena[universe.root].level, 3);
    }

    #[test]
    fn increment_rejects_an_oversized_odd_factor() {
        let huge_odd = BigInt::from_u64(1).shl(40).add(&BigInt::from_u64(1));
        assert!(Increment::new(&huge_odd).is_err());
    }
}
