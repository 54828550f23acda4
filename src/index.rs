//! Hash index (C4): canonicalises nodes and leaves so that structural
//! equality implies identity (§3.4). Chained buckets, move-to-front on
//! lookup hit, doubling resize at load factor 0.7 (§4.4).

use crate::gc::SaveStack;
use crate::node::{leaf_hash, node_hash, LeafData, Node, NodeArena, NodeId, NodeKind};

const MAX_LOAD_FACTOR: f64 = 0.7;

pub struct HashIndex {
    buckets: Vec<Option<NodeId>>,
    mask: u64,
    len: usize,
    max_load_factor: f64,
}

impl HashIndex {
    pub fn new(initial_capacity: usize) -> Self {
        let cap = initial_capacity.next_power_of_two().max(16);
        HashIndex {
            buckets: vec![None; cap],
            mask: (cap - 1) as u64,
            len: 0,
            max_load_factor: MAX_LOAD_FACTOR,
        }
    }

    pub fn with_max_load_factor(mut self, f: f64) -> Self {
        self.max_load_factor = f;
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Canonicalise a leaf. Returns the existing entry if one with the same
    /// four words exists, otherwise allocates and inserts a fresh one.
    /// Pushes the result onto `stack` per the save-stack coupling rule.
    pub fn find_leaf(
        &mut self,
        arena: &mut NodeArena,
        stack: &mut SaveStack,
        data: LeafData,
    ) -> NodeId {
        let hash = leaf_hash(data.nw, data.ne, data.sw, data.se);
        if let Some(existing) = self.lookup_leaf(arena, hash, data) {
            self.move_to_front(arena, hash, existing);
            stack.push(existing);
            return existing;
        }
        let id = arena.insert(Node::new_leaf(data));
        self.insert_new(arena, id, hash);
        self.maybe_resize(arena);
        stack.push(id);
        id
    }

    /// Canonicalise a branch node from its four already-canonical children.
    pub fn find_node(
        &mut self,
        arena: &mut NodeArena,
        stack: &mut SaveStack,
        nw: NodeId,
        ne: NodeId,
        sw: NodeId,
        se: NodeId,
        level: u8,
    ) -> NodeId {
        let hash = node_hash(nw, ne, sw, se);
        if let Some(existing) = self.lookup_branch(arena, hash, nw, ne, sw, se) {
            self.move_to_front(arena, hash, existing);
            stack.push(existing);
            return existing;
        }
        let id = arena.insert(Node::new_branch(nw, ne, sw, se, level));
        self.insert_new(arena, id, hash);
        self.maybe_resize(arena);
        stack.push(id);
        id
    }

    fn lookup_leaf(&self, arena: &NodeArena, hash: u64, data: LeafData) -> Option<NodeId> {
        let bucket = self.bucket_of(hash);
        let mut cur = self.buckets[bucket];
        while let Some(id) = cur {
            let node = &arena[id];
            let matches = node.hash == hash
                && matches!(node.kind, NodeKind::Leaf(d) if d == data);
            if matches {
                return Some(id);
            }
            cur = node.hash_next;
        }
        None
    }

    fn lookup_branch(
        &self,
        arena: &NodeArena,
        hash: u64,
        nw: NodeId,
        ne: NodeId,
        sw: NodeId,
        se: NodeId,
    ) -> Option<NodeId> {
        let bucket = self.bucket_of(hash);
        let mut cur = self.buckets[bucket];
        while let Some(id) = cur {
            let node = &arena[id];
            // `nw` is the most-discriminating field in typical patterns
            // (§4.4 "Ordering trick"): compare it first so mismatches short
            // circuit before touching the other three children.
            let matches = node.hash == hash
                && match node.kind {
                    NodeKind::Branch { nw: a, ne: b, sw: c, se: d } => {
                        a == nw && b == ne && c == sw && d == se
                    }
                    NodeKind::Leaf(_) => false,
                };
            if matches {
                return Some(id);
            }
            cur = node.hash_next;
        }
        None
    }

    /// Relink `id` to the head of its bucket's chain if it is not already
    /// there (§4.4 "Move-to-front").
    fn move_to_front(&mut self, arena: &mut NodeArena, hash: u64, id: NodeId) {
        let bucket = self.bucket_of(hash);
        if self.buckets[bucket] == Some(id) {
            return;
        }
        let mut prev = self.buckets[bucket];
        while let Some(cur_id) = prev {
            let next = arena[cur_id].hash_next;
            if next == Some(id) {
                arena[cur_id].hash_next = arena[id].hash_next;
                break;
            }
            prev = next;
        }
        let old_head = self.buckets[bucket];
        arena[id].hash_next = old_head;
        self.buckets[bucket] = Some(id);
    }

    fn insert_new(&mut self, arena: &mut NodeArena, id: NodeId, hash: u64) {
        let bucket = self.bucket_of(hash);
        let head = self.buckets[bucket];
        arena[id].hash_next = head;
        self.buckets[bucket] = Some(id);
        self.len += 1;
    }

    fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    fn maybe_resize(&mut self, arena: &mut NodeArena) {
        if self.load_factor() <= self.max_load_factor {
            return;
        }
        let new_cap = self.buckets.len() * 2;
        let new_cap = match new_cap.checked_mul(1) {
            Some(c) if c > 0 => c,
            _ => {
                // Allocator could not satisfy the doubling; degrade by
                // raising the load-factor ceiling instead of resizing
                // (§4.4 "if the allocator cannot satisfy a resize").
                tracing::warn!(target: "hashlife.memory", "resize_degraded");
                self.max_load_factor = f64::INFINITY;
                return;
            }
        };
        self.rehash(arena, new_cap);
    }

    fn rehash(&mut self, arena: &mut NodeArena, new_cap: usize) {
        let old_count = self.buckets.len();
        let mut new_buckets: Vec<Option<NodeId>> = vec![None; new_cap];
        let new_mask = (new_cap - 1) as u64;
        for bucket in 0..old_count {
            let mut cur = self.buckets[bucket];
            while let Some(id) = cur {
                let next = arena[id].hash_next;
                let new_bucket = (arena[id].hash & new_mask) as usize;
                arena[id].hash_next = new_buckets[new_bucket];
                new_buckets[new_bucket] = Some(id);
                cur = next;
            }
        }
        tracing::debug!(
            target: "hashlife.resize",
            old_buckets = old_count,
            new_buckets = new_cap,
            entries = self.len,
            "hash_index_resized"
        );
        self.buckets = new_buckets;
        self.mask = new_mask;
    }

    /// Rebuild the index from scratch after a GC sweep has decided which
    /// nodes survive (§4.7 "Re-initialise the hash buckets to empty; scan
    /// the contiguous allocation blocks"). `arena` must already contain
    /// only surviving nodes.
    pub fn rebuild(&mut self, arena: &mut NodeArena, capacity_hint: usize) {
        let cap = capacity_hint.next_power_of_two().max(16);
        self.buckets = vec![None; cap];
        self.mask = (cap - 1) as u64;
        self.len = 0;
        let ids: Vec<NodeId> = arena.iter().map(|(id, _)| id).collect();
        for id in ids {
            let hash = arena[id].hash;
            arena[id].hash_next = None;
            self.insert_new(arena, id, hash);
        }
    }
}
