//! Macrocell codec (C10): the `.mc` node-list serialisation.
//!
//! Grounded on `hlifealgo::readmacrocell`/`writecell`/`writeNativeFormat` in
//! `examples/original_source/gollybase/hlifealgo.cpp`. The original's
//! writer marks progress by temporarily repurposing each node's `next`
//! pointer as its file index (mirroring the same anti-pattern
//! `population.rs` was rewritten to avoid); this rewrite numbers nodes with
//! a dedicated `FxHashMap<NodeId, u64>` built during a single post-order
//! pass instead, so no pointer field doubles as scratch space.
//!
//! Format: one leaf (an 8-row `.`/`*`/`$` pattern) or branch (`d nw ne sw
//! se`) per line, each implicitly numbered from 1 in file order; 0 always
//! means "the canonical empty node at whatever depth this reference
//! implies". `#R <rule>` and `#G <generation>` header lines, plus the
//! `#FRAMES`/`#FRAME` timeline extension, may appear before the first node
//! line.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::bigint::BigInt;
use crate::cell::{leaf_bit, leaf_data};
use crate::error::EngineError;
use crate::gc::SaveStack;
use crate::index::HashIndex;
use crate::node::{LeafData, NodeArena, NodeId, NodeKind};
use crate::timeline::TimelineFrame;

/// Renders one leaf's 8x8 bitmap as up to 8 `.`/`*` rows terminated by `$`,
/// top (`y=3`) to bottom (`y=-4`), trailing all-dead rows omitted — per
/// `writecell`'s early exit once the remaining packed bits are all zero.
fn render_leaf(data: LeafData) -> String {
    let mut rows: Vec<[bool; 8]> = Vec::new();
    for y in (-4..4).rev() {
        let mut row = [false; 8];
        for (col, x) in (-4..4).enumerate() {
            let (west, south, bit) = leaf_bit(x, y);
            let word = match (west, south) {
                (true, true) => data.sw,
                (true, false) => data.nw,
                (false, true) => data.se,
                (false, false) => data.ne,
            };
            row[col] = word & bit != 0;
        }
        rows.push(row);
    }
    while rows.last().is_some_and(|r| r.iter().all(|&c| !c)) {
        rows.pop();
    }
    let mut out = String::new();
    for row in rows {
        for cell in row {
            out.push(if cell { '*' } else { '.' });
        }
        out.push('$');
    }
    out.push('\n');
    out
}

/// Parses one `.`/`*`/`$`-encoded leaf pattern line back into `LeafData`.
fn parse_leaf_line(line: &str) -> Result<LeafData, EngineError> {
    let mut data = LeafData { nw: 0, ne: 0, sw: 0, se: 0 };
    let mut x = 0i64;
    let mut y = 3i64;
    for ch in line.chars() {
        match ch {
            '*' => {
                if x > 7 || y < -4 {
                    return Err(EngineError::macrocell("coordinates out of range in leaf pattern"));
                }
                let (west, south, bit) = leaf_bit(x - 4, y);
                let word = match (west, south) {
                    (true, true) => &mut data.sw,
                    (true, false) => &mut data.nw,
                    (false, true) => &mut data.se,
                    (false, false) => &mut data.ne,
                };
                *word |= bit;
                x += 1;
            }
            '.' => x += 1,
            '$' => {
                x = 0;
                y -= 1;
            }
            _ => return Err(EngineError::macrocell(format!("illegal character `{ch}` in leaf pattern"))),
        }
    }
    Ok(data)
}

/// Writes `root` (a branch or leaf at `level`) in macrocell format to `out`,
/// with an `#R`/`#G` header, `comment` re-emitted as one `#C` line per
/// input line, and `frames` (the timeline, if any) written as `#FRAMES`/
/// `#FRAME` lines ahead of the live root. `zero[level]` must be the
/// canonical all-dead node at that level for every level up to and
/// including `level`.
pub fn write_macrocell(
    arena: &NodeArena,
    zero: &[NodeId],
    root: NodeId,
    level: u8,
    rule_name: &str,
    generation: &BigInt,
    comment: &str,
    frames: &[TimelineFrame],
) -> String {
    let mut out = String::new();
    out.push_str("[M2] (hashlife engine)\n");
    let _ = writeln!(out, "#R {rule_name}");
    let _ = writeln!(out, "#G {generation}");
    for line in comment.lines() {
        let _ = writeln!(out, "#C {line}");
    }
    if !frames.is_empty() {
        let _ = writeln!(out, "#FRAMES {}", frames.len());
    }

    let mut memo: FxHashMap<NodeId, u64> = FxHashMap::default();
    let mut counter: u64 = 0;
    for frame in frames {
        let idx = write_node(&mut out, arena, zero, &mut memo, &mut counter, frame.root, frame.level);
        let _ = writeln!(out, "#FRAME {} {}", frame.generation, idx);
    }
    write_node(&mut out, arena, zero, &mut memo, &mut counter, root, level);
    out
}

fn write_node(
    out: &mut String,
    arena: &NodeArena,
    zero: &[NodeId],
    memo: &mut FxHashMap<NodeId, u64>,
    counter: &mut u64,
    id: NodeId,
    level: u8,
) -> u64 {
    if zero.get(level as usize) == Some(&id) {
        return 0;
    }
    if let Some(&idx) = memo.get(&id) {
        return idx;
    }
    if level == 2 {
        let data = leaf_data(arena, id);
        out.push_str(&render_leaf(data));
        *counter += 1;
        memo.insert(id, *counter);
        *counter
    } else {
        let (nw, ne, sw, se) = arena[id].children().expect("write_node: branch expected");
        let a = write_node(out, arena, zero, memo, counter, nw, level - 1);
        let b = write_node(out, arena, zero, memo, counter, ne, level - 1);
        let c = write_node(out, arena, zero, memo, counter, sw, level - 1);
        let d = write_node(out, arena, zero, memo, counter, se, level - 1);
        let _ = writeln!(out, "{} {} {} {} {}", level + 1, a, b, c, d);
        *counter += 1;
        memo.insert(id, *counter);
        *counter
    }
}

/// Result of reading a macrocell file: the reconstructed root plus any
/// header metadata found.
pub struct ReadMacrocell {
    pub root: NodeId,
    pub level: u8,
    pub rule_name: Option<String>,
    pub generation: Option<BigInt>,
    pub comment: Option<String>,
    pub frames: Vec<TimelineFrame>,
}

/// Reads a macrocell file. Node references in a `d nw ne sw se` line index
/// into the 1-based list of lines already parsed (0 is the canonical empty
/// at that reference's implied depth); nodes that multiple branch lines
/// reference share the same index, so no node is reconstructed twice.
pub fn read_macrocell(
    arena: &mut NodeArena,
    index: &mut HashIndex,
    stack: &mut SaveStack,
    zero_of_depth: &mut dyn FnMut(&mut NodeArena, &mut HashIndex, &mut SaveStack, u8) -> NodeId,
    text: &str,
) -> Result<ReadMacrocell, EngineError> {
    let mut ind: Vec<Option<NodeId>> = vec![None];
    let mut levels: Vec<u8> = vec![2];
    let mut rule_name = None;
    let mut generation = None;
    let mut comment_lines: Vec<String> = Vec::new();
    let mut frames = Vec::new();
    let mut root = None;
    let mut level = 2u8;
    let mut last_level = 2u8;

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        if line.is_empty() {
            continue;
        }
        if line.starts_with('.') || line.starts_with('*') || line.starts_with('$') {
            let data = parse_leaf_line(line)?;
            let id = index.find_leaf(arena, stack, data);
            ind.push(Some(id));
            levels.push(2);
            last_level = 2;
        } else if let Some(rest) = line.strip_prefix("#R") {
            rule_name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("#G") {
            generation = Some(BigInt::from_decimal_str(rest.trim())?);
        } else if let Some(rest) = line.strip_prefix("#C") {
            comment_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if line.strip_prefix("#FRAMES").is_some() {
            continue; // informational only; frames are counted as parsed
        } else if let Some(rest) = line.strip_prefix("#FRAME") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(EngineError::macrocell(format!("malformed #FRAME line: `{line}`")));
            }
            let gen = BigInt::from_decimal_str(fields[0])?;
            let idx: usize = fields[1].parse().map_err(|_| EngineError::macrocell(format!("bad frame node index `{}`", fields[1])))?;
            let frame_root = ind.get(idx).copied().flatten().ok_or_else(|| EngineError::macrocell(format!("frame node index {idx} out of range")))?;
            let frame_level = levels.get(idx).copied().unwrap_or(last_level);
            frames.push(TimelineFrame { generation: gen, root: frame_root, level: frame_level });
        } else if line.starts_with('#') {
            continue;
        } else {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 5 {
                return Err(EngineError::macrocell(format!("malformed node line: `{line}`")));
            }
            let d: i64 = fields[0].parse().map_err(|_| EngineError::macrocell(format!("bad depth in `{line}`")))?;
            if d < 4 {
                return Err(EngineError::macrocell("depth below 4 in node line".to_string()));
            }
            let node_level = (d - 1) as u8;
            let child_level = node_level - 1;
            ind[0] = Some(zero_of_depth(arena, index, stack, child_level));
            let lookup = |field: &str, ind: &[Option<NodeId>]| -> Result<NodeId, EngineError> {
                let idx: usize = field.parse().map_err(|_| EngineError::macrocell(format!("bad index `{field}`")))?;
                ind.get(idx).copied().flatten().ok_or_else(|| EngineError::macrocell(format!("node index {idx} out of range")))
            };
            let nw = lookup(fields[1], &ind)?;
            let ne = lookup(fields[2], &ind)?;
            let sw = lookup(fields[3], &ind)?;
            let se = lookup(fields[4], &ind)?;
            let id = index.find_node(arena, stack, nw, ne, sw, se, node_level);
            ind.push(Some(id));
            levels.push(node_level);
            last_level = node_level;
            root = Some(id);
            level = node_level;
        }
    }

    let root = root.ok_or_else(|| EngineError::macrocell("no root node found".to_string()))?;
    let comment = if comment_lines.is_empty() { None } else { Some(comment_lines.join("\n")) };
    Ok(ReadMacrocell { root, level, rule_name, generation, comment, frames })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_chain(arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, up_to: u8) -> Vec<NodeId> {
        let leaf = index.find_leaf(arena, stack, LeafData { nw: 0, ne: 0, sw: 0, se: 0 });
        let mut levels = vec![leaf, leaf, leaf];
        for level in 3..=up_to {
            let z = *levels.last().unwrap();
            levels.push(index.find_node(arena, stack, z, z, z, z, level));
        }
        levels
    }

    #[test]
    fn write_then_read_round_trips_a_small_pattern() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(64);
        let mut stack = SaveStack::new();
        let zero = zero_chain(&mut arena, &mut index, &mut stack, 4);

        let glider_nw = LeafData { nw: 0, ne: 0, sw: 0, se: 0b0100_0010_0111_0000 };
        let glider_leaf = index.find_leaf(&mut arena, &mut stack, glider_nw);
        let dead_leaf = zero[2];
        let row = index.find_node(&mut arena, &mut stack, glider_leaf, dead_leaf, dead_leaf, dead_leaf, 3);
        let root = index.find_node(&mut arena, &mut stack, row, zero[3], zero[3], zero[3], 4);

        let frames = vec![TimelineFrame { generation: BigInt::from_u64(0), root, level: 4 }];
        let text = write_macrocell(&arena, &zero, root, 4, "B3/S23", &BigInt::from_u64(1), "glider test", &frames);
        assert!(text.contains("#R B3/S23"));
        assert!(text.contains("#C glider test"));
        assert!(text.contains("#FRAMES 1"));

        let mut arena2 = NodeArena::new();
        let mut index2 = HashIndex::new(64);
        let mut stack2 = SaveStack::new();
        let mut zero2 = zero_chain(&mut arena2, &mut index2, &mut stack2, 4);
        let mut zero_of = |arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, level: u8| -> NodeId {
            while zero2.len() <= level as usize {
                let z = *zero2.last().unwrap();
                let lvl = zero2.len() as u8;
                zero2.push(index.find_node(arena, stack, z, z, z, z, lvl));
            }
            zero2[level as usize]
        };
        let parsed = read_macrocell(&mut arena2, &mut index2, &mut stack2, &mut zero_of, &text).unwrap();
        assert_eq!(parsed.rule_name.as_deref(), Some("B3/S23"));
        assert_eq!(parsed.level, 4);
        assert_eq!(parsed.comment.as_deref(), Some("glider test"));
        assert_eq!(parsed.frames.len(), 1);
        assert_eq!(parsed.frames[0].generation, BigInt::from_u64(0));
        assert_eq!(parsed.frames[0].level, 4);

        let orig_pop = crate::population::PopulationCache::new().population(&arena, &zero, root, 4);
        let mut pop2 = crate::population::PopulationCache::new();
        let read_pop = pop2.population(&arena2, &zero2, parsed.root, parsed.level);
        assert_eq!(orig_pop, read_pop);

        let mut frame_pop = crate::population::PopulationCache::new();
        let frame_read_pop = frame_pop.population(&arena2, &zero2, parsed.frames[0].root, parsed.frames[0].level);
        assert_eq!(orig_pop, frame_read_pop);
    }
}
