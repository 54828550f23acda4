//! Quadtree node representation.
//!
//! Nodes live in a single arena and are addressed by stable index rather
//! than by pointer or `Rc`/`Arc`: this is what lets garbage collection be a
//! bitmap sweep and lets the hash index store plain indices instead of fat
//! pointers. `thunderdome` provides the generational arena; `NodeId` is its
//! index type re-exported under a domain name.
//!
//! The C++ original packs three unrelated meanings (cache pointer,
//! population-memo pointer with a tag bit, serialisation ordinal) into one
//! `result` field, selected by engine phase. Per the "Bit-twiddled result
//! slot" design note this rewrite keeps them as separate fields instead.

use thunderdome::Arena;

pub type NodeId = thunderdome::Index;

/// A leaf covers an 8x8 area as four 16-bit words (§3.2). `res1`/`res2` are
/// the cached one- and two-generation-forward results, lazily filled the
/// first time the leaf engine (C3) is asked to evolve this leaf; they are
/// cheap (table lookups, no recursion) so computing them is not worth
/// deferring past leaf construction in practice, but the fields stay
/// `Option` to keep the "null means not yet computed" contract explicit
/// and symmetric with `Node::result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafData {
    pub nw: u16,
    pub ne: u16,
    pub sw: u16,
    pub se: u16,
}

impl LeafData {
    pub fn population(&self) -> u32 {
        self.nw.count_ones() + self.ne.count_ones() + self.sw.count_ones() + self.se.count_ones()
    }

    pub fn hash_key(&self) -> u64 {
        leaf_hash(self.nw, self.ne, self.sw, self.se)
    }
}

/// `hash(a, b, c, d) = 65537*d + 257*c + 17*b + 5*a` (§4.4), applied to the
/// leaf's four 16-bit words or a branch's four child indices alike.
pub fn leaf_hash(a: u16, b: u16, c: u16, d: u16) -> u64 {
    65537u64
        .wrapping_mul(d as u64)
        .wrapping_add(257u64.wrapping_mul(c as u64))
        .wrapping_add(17u64.wrapping_mul(b as u64))
        .wrapping_add(5u64.wrapping_mul(a as u64))
}

/// Same mixing formula over the four children's arena generations +
/// slot indices, folded into a single `u64` (§4.4's `node_hash`).
pub fn node_hash(nw: NodeId, ne: NodeId, sw: NodeId, se: NodeId) -> u64 {
    let key = |id: NodeId| -> u64 { (id.slot() as u64) | ((id.generation() as u64) << 32) };
    let r = 65537u64
        .wrapping_mul(key(se))
        .wrapping_add(257u64.wrapping_mul(key(sw)))
        .wrapping_add(17u64.wrapping_mul(key(ne)))
        .wrapping_add(5u64.wrapping_mul(key(nw)));
    r.wrapping_add(r >> 11)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf(LeafData),
    Branch {
        nw: NodeId,
        ne: NodeId,
        sw: NodeId,
        se: NodeId,
    },
}

pub struct Node {
    pub kind: NodeKind,
    /// 2 for a leaf; `d` for an internal node whose children are at `d-1`.
    pub level: u8,
    pub hash: u64,

    /// Full-jump cache: the centred child `2^(level-2)` generations
    /// forward, assigned only once computed for that horizon (§4.3).
    pub result: Option<NodeId>,
    /// Exactly-one-generation cache, used when the leaf/branch recursion
    /// needs a half jump or an odd-sized step (§4.3, §4.5).
    pub result_step1: Option<NodeId>,

    /// One- and two-generation-forward leaf results (§3.2). `None` until
    /// first requested. Unused for `NodeKind::Branch`.
    pub leaf_res1: Option<u16>,
    pub leaf_res2: Option<u16>,

    /// GC mark bit (§4.7), a dedicated field rather than a stolen pointer
    /// bit.
    pub gc_mark: bool,

    /// Intrusive hash-chain link (§4.4), owned by `crate::index::HashIndex`.
    pub hash_next: Option<NodeId>,
}

impl Node {
    pub fn new_leaf(data: LeafData) -> Node {
        Node {
            kind: NodeKind::Leaf(data),
            level: 2,
            hash: data.hash_key(),
            result: None,
            result_step1: None,
            leaf_res1: None,
            leaf_res2: None,
            gc_mark: false,
            hash_next: None,
        }
    }

    pub fn new_branch(nw: NodeId, ne: NodeId, sw: NodeId, se: NodeId, level: u8) -> Node {
        Node {
            kind: NodeKind::Branch { nw, ne, sw, se },
            level,
            hash: node_hash(nw, ne, sw, se),
            result: None,
            result_step1: None,
            leaf_res1: None,
            leaf_res2: None,
            gc_mark: false,
            hash_next: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn children(&self) -> Option<(NodeId, NodeId, NodeId, NodeId)> {
        match self.kind {
            NodeKind::Branch { nw, ne, sw, se } => Some((nw, ne, sw, se)),
            NodeKind::Leaf(_) => None,
        }
    }
}

pub type NodeArena = Arena<Node>;
