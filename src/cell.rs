//! Cell API: point read/write and pattern-bounds queries against the
//! quadtree.
//!
//! Grounded on `hlifealgo::gsetbit`/`getbit`/`nextbit`/`getedges` in
//! `examples/original_source/gollybase/hlifealgo.cpp`. The original packs
//! 32 levels of quadrant choice into a single machine word for speed; this
//! rewrite recurses one level at a time instead, which is the same
//! algorithm without the bit-packing, and uses `i64` coordinates rather
//! than Golly's 32-bit ones (noted in DESIGN.md as a deliberate scope cut:
//! plain `i64` already reaches a universe far larger than any pattern in
//! practice; arbitrary precision is reserved for generation counts and
//! populations, which actually need it).
//!
//! The leaf-level bit formula (`1 << (3 - lx + 4*ly)`, selecting one of the
//! four 4x4 words by sign of x/y) is transcribed literally from `gsetbit`
//! so that cell coordinates agree with the neighbour bit layout
//! `leaf.rs`'s windows already assume.

use crate::gc::SaveStack;
use crate::index::HashIndex;
use crate::node::{LeafData, NodeArena, NodeId, NodeKind};

fn half_span(level: u8) -> i64 {
    1i64 << level
}

pub(crate) fn leaf_data(arena: &NodeArena, id: NodeId) -> LeafData {
    match arena[id].kind {
        NodeKind::Leaf(d) => d,
        NodeKind::Branch { .. } => panic!("leaf_data() called on a branch"),
    }
}

pub(crate) fn leaf_bit(x: i64, y: i64) -> (bool, bool, u16) {
    let west = x < 0;
    let south = y < 0;
    let lx = if west { x + 4 } else { x };
    let ly = if south { y + 4 } else { y };
    let bit = 1u16 << (3 - lx as u16 + 4 * ly as u16);
    (west, south, bit)
}

/// Sets or clears the cell at `(x, y)` in the square rooted at `id`
/// (level `level`), returning the new canonical root for that square.
pub fn set_cell(
    arena: &mut NodeArena,
    index: &mut HashIndex,
    stack: &mut SaveStack,
    id: NodeId,
    level: u8,
    x: i64,
    y: i64,
    state: bool,
) -> NodeId {
    if level == 2 {
        let mut data = leaf_data(arena, id);
        let (west, south, bit) = leaf_bit(x, y);
        let word = match (west, south) {
            (true, true) => &mut data.sw,
            (true, false) => &mut data.nw,
            (false, true) => &mut data.se,
            (false, false) => &mut data.ne,
        };
        if state {
            *word |= bit;
        } else {
            *word &= !bit;
        }
        return index.find_leaf(arena, stack, data);
    }
    let (nw, ne, sw, se) = arena[id].children().expect("set_cell on unexpanded node");
    let half = half_span(level - 1);
    let west = x < 0;
    let south = y < 0;
    let xm = if west { x + half } else { x - half };
    let ym = if south { y + half } else { y - half };
    let (nw, ne, sw, se) = match (west, south) {
        (true, true) => (nw, ne, set_cell(arena, index, stack, sw, level - 1, xm, ym, state), se),
        (true, false) => (set_cell(arena, index, stack, nw, level - 1, xm, ym, state), ne, sw, se),
        (false, true) => (nw, ne, sw, set_cell(arena, index, stack, se, level - 1, xm, ym, state)),
        (false, false) => (nw, set_cell(arena, index, stack, ne, level - 1, xm, ym, state), sw, se),
    };
    index.find_node(arena, stack, nw, ne, sw, se, level)
}

/// Reads the cell at `(x, y)` in the square rooted at `id` (level `level`).
pub fn get_cell(arena: &NodeArena, id: NodeId, level: u8, x: i64, y: i64) -> bool {
    if level == 2 {
        let data = leaf_data(arena, id);
        let (west, south, bit) = leaf_bit(x, y);
        let word = match (west, south) {
            (true, true) => data.sw,
            (true, false) => data.nw,
            (false, true) => data.se,
            (false, false) => data.ne,
        };
        return word & bit != 0;
    }
    let (nw, ne, sw, se) = arena[id].children().expect("get_cell on unexpanded node");
    let half = half_span(level - 1);
    let west = x < 0;
    let south = y < 0;
    let xm = if west { x + half } else { x - half };
    let ym = if south { y + half } else { y - half };
    let child = match (west, south) {
        (true, true) => sw,
        (true, false) => nw,
        (false, true) => se,
        (false, false) => ne,
    };
    get_cell(arena, child, level - 1, xm, ym)
}

/// Tightest axis-aligned bounding box containing every live cell, or
/// `None` for an empty universe (§6.1 `find_edges`).
pub fn find_edges(
    arena: &NodeArena,
    zero: &[NodeId],
    id: NodeId,
    level: u8,
) -> Option<(i64, i64, i64, i64)> {
    if zero.get(level as usize) == Some(&id) {
        return None;
    }
    match arena[id].kind {
        NodeKind::Leaf(data) => {
            let mut bounds: Option<(i64, i64, i64, i64)> = None;
            for ly in 0..8i64 {
                for lx in 0..8i64 {
                    let x = lx - 4;
                    let y = ly - 4;
                    if get_cell(arena, id, 2, x, y) {
                        bounds = Some(match bounds {
                            None => (x, x, y, y),
                            Some((minx, maxx, miny, maxy)) => {
                                (minx.min(x), maxx.max(x), miny.min(y), maxy.max(y))
                            }
                        });
                    }
                }
            }
            bounds
        }
        NodeKind::Branch { nw, ne, sw, se } => {
            let half = half_span(level - 1);
            let merge = |a: Option<(i64, i64, i64, i64)>, b: Option<(i64, i64, i64, i64)>| match (a, b) {
                (None, x) => x,
                (x, None) => x,
                (Some((a0, a1, a2, a3)), Some((b0, b1, b2, b3))) => {
                    Some((a0.min(b0), a1.max(b1), a2.min(b2), a3.max(b3)))
                }
            };
            let shift = |b: Option<(i64, i64, i64, i64)>, dx: i64, dy: i64| {
                b.map(|(minx, maxx, miny, maxy)| (minx + dx, maxx + dx, miny + dy, maxy + dy))
            };
            let mut total = None;
            total = merge(total, shift(find_edges(arena, zero, nw, level - 1), -half, half));
            total = merge(total, shift(find_edges(arena, zero, ne, level - 1), half, half));
            total = merge(total, shift(find_edges(arena, zero, sw, level - 1), -half, -half));
            total = merge(total, shift(find_edges(arena, zero, se, level - 1), half, -half));
            total
        }
    }
}

/// `nextcell`: the smallest `x' >= x` in row `y` that is alive, within the
/// square rooted at `id` (level `level`), or `None` if none exists between
/// `x` and the right edge of the square. Mirrors `nextbit`'s scan-rightward
/// recursion (search the half containing `x` first, then continue into the
/// other half from its left edge) rather than its packed-word bit-twiddling,
/// matching the rest of this module's one-level-at-a-time style.
pub fn next_cell(arena: &NodeArena, zero: &[NodeId], id: NodeId, level: u8, x: i64, y: i64) -> Option<i64> {
    let bound = half_span(level);
    if x >= bound || y < -bound || y >= bound {
        return None;
    }
    if zero.get(level as usize) == Some(&id) {
        return None;
    }
    if level == 2 {
        let mut cx = x.max(-4);
        while cx <= 3 {
            if get_cell(arena, id, 2, cx, y) {
                return Some(cx);
            }
            cx += 1;
        }
        return None;
    }
    let (nw, ne, sw, se) = arena[id].children().expect("next_cell on unexpanded node");
    let half = half_span(level - 1);
    let south = y < 0;
    let (west_child, east_child) = if south { (sw, se) } else { (nw, ne) };
    let ym = if south { y + half } else { y - half };

    if x < 0 {
        let xm = x + half;
        if let Some(found) = next_cell(arena, zero, west_child, level - 1, xm, ym) {
            return Some(found - half);
        }
        if let Some(found) = next_cell(arena, zero, east_child, level - 1, -half, ym) {
            return Some(found + half);
        }
        None
    } else {
        let xm = x - half;
        next_cell(arena, zero, east_child, level - 1, xm, ym).map(|found| found + half)
    }
}

/// True iff the universe has no live cells (an alias over
/// `population::PopulationCache::is_empty`, kept here for API symmetry
/// with `find_edges`).
pub fn end_of_pattern(zero: &[NodeId], id: NodeId, level: u8) -> bool {
    crate::population::PopulationCache::is_empty(zero, id, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::SaveStack;
    use crate::index::HashIndex;

    #[test]
    fn set_then_get_round_trips() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let dead = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
        let z_leaf = index.find_leaf(&mut arena, &mut stack, dead);
        let mut root = index.find_node(&mut arena, &mut stack, z_leaf, z_leaf, z_leaf, z_leaf, 3);

        root = set_cell(&mut arena, &mut index, &mut stack, root, 3, 1, 1, true);
        assert!(get_cell(&arena, root, 3, 1, 1));
        assert!(!get_cell(&arena, root, 3, -3, -3));

        root = set_cell(&mut arena, &mut index, &mut stack, root, 3, 1, 1, false);
        assert!(!get_cell(&arena, root, 3, 1, 1));
    }

    #[test]
    fn find_edges_tracks_a_single_live_cell() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let dead = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
        let z_leaf = index.find_leaf(&mut arena, &mut stack, dead);
        let root = index.find_node(&mut arena, &mut stack, z_leaf, z_leaf, z_leaf, z_leaf, 3);
        let zero = vec![z_leaf, z_leaf, z_leaf];
        assert_eq!(find_edges(&arena, &zero, root, 3), None);

        let root2 = set_cell(&mut arena, &mut index, &mut stack, root, 3, 2, -5, true);
        assert_eq!(find_edges(&arena, &zero, root2, 3), Some((2, 2, -5, -5)));
    }

    #[test]
    fn next_cell_scans_rightward_and_reports_none_past_the_last_live_column() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let dead = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
        let z_leaf = index.find_leaf(&mut arena, &mut stack, dead);
        let mut root = index.find_node(&mut arena, &mut stack, z_leaf, z_leaf, z_leaf, z_leaf, 3);
        let zero = vec![z_leaf, z_leaf, z_leaf];

        root = set_cell(&mut arena, &mut index, &mut stack, root, 3, -2, 0, true);
        root = set_cell(&mut arena, &mut index, &mut stack, root, 3, 3, 0, true);

        assert_eq!(next_cell(&arena, &zero, root, 3, -7, 0), Some(-2));
        assert_eq!(next_cell(&arena, &zero, root, 3, -1, 0), Some(3));
        assert_eq!(next_cell(&arena, &zero, root, 3, 4, 0), None);
        assert_eq!(next_cell(&arena, &zero, root, 3, -2, 1), None);
    }
}
