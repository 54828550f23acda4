//! Save-stack (§4.4 "save-stack coupling") and mark-sweep garbage collector
//! (C7, §4.7).
//!
//! Grounded on `hlifealgo::gcollect`/`resize` in
//! `examples/original_source/gollybase/hlifealgo.cpp`: recursion keeps every
//! node it touches alive by pushing it on a stack rather than holding a
//! reference, and collection marks from that stack plus the engine's
//! explicit roots before sweeping the arena.

use rustc_hash::FxHashSet;

use crate::index::HashIndex;
use crate::node::{NodeArena, NodeId};

/// Protects nodes created or looked up mid-recursion from being swept
/// before the recursion that produced them has returned them to a caller
/// who will root them properly.
#[derive(Default)]
pub struct SaveStack {
    entries: Vec<NodeId>,
}

impl SaveStack {
    pub fn new() -> Self {
        SaveStack { entries: Vec::new() }
    }

    pub fn push(&mut self, id: NodeId) {
        self.entries.push(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.entries.iter()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Opens a scope: entries pushed after this call are dropped from the
    /// stack once the returned guard goes out of scope, the way a
    /// recursive call's intermediate lookups stop needing protection once
    /// it has returned its result to an already-rooted caller.
    pub fn scope(&mut self) -> SaveStackScope<'_> {
        let mark = self.entries.len();
        SaveStackScope { stack: self, mark }
    }
}

pub struct SaveStackScope<'a> {
    stack: &'a mut SaveStack,
    mark: usize,
}

impl Drop for SaveStackScope<'_> {
    fn drop(&mut self) {
        self.stack.truncate(self.mark);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    pub marked: usize,
    pub freed: usize,
}

/// Walks from `roots` (the engine's explicit root node(s), the `empty[]`
/// array, and any recorded timeline frames) and the save stack, marking
/// every reachable node, then frees everything unmarked and rebuilds the
/// hash index from the survivors (§4.7).
///
/// When `invalidate` is true, cached full-jump (`result`/`result_step1`)
/// and leaf (`leaf_res1`/`leaf_res2`) results are cleared on every surviving
/// node instead of being preserved — used after a rule change, where
/// structure survives but every cached evolution is now wrong.
pub fn collect(
    arena: &mut NodeArena,
    index: &mut HashIndex,
    roots: &[NodeId],
    save_stack: &SaveStack,
    invalidate: bool,
) -> GcStats {
    let mut marked: FxHashSet<NodeId> = FxHashSet::default();
    let mut frontier: Vec<NodeId> = Vec::new();
    frontier.extend(roots.iter().copied());
    frontier.extend(save_stack.iter().copied());

    while let Some(id) = frontier.pop() {
        if !marked.insert(id) {
            continue;
        }
        let Some(node) = arena.get(id) else { continue };
        if let Some((nw, ne, sw, se)) = node.children() {
            frontier.push(nw);
            frontier.push(ne);
            frontier.push(sw);
            frontier.push(se);
        }
        if let Some(r) = node.result {
            frontier.push(r);
        }
        if let Some(r) = node.result_step1 {
            frontier.push(r);
        }
    }

    let to_free: Vec<NodeId> = arena
        .iter()
        .map(|(id, _)| id)
        .filter(|id| !marked.contains(id))
        .collect();
    let freed = to_free.len();
    for id in to_free {
        arena.remove(id);
    }

    for &id in &marked {
        if let Some(node) = arena.get_mut(id) {
            node.gc_mark = false;
            if invalidate {
                node.result = None;
                node.result_step1 = None;
                node.leaf_res1 = None;
                node.leaf_res2 = None;
            }
        }
    }

    index.rebuild(arena, marked.len().max(16));

    tracing::info!(
        target: "hashlife.gc",
        marked = marked.len(),
        freed,
        invalidate,
        "gc_collected"
    );

    GcStats { marked: marked.len(), freed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{LeafData, Node};

    #[test]
    fn unreferenced_node_is_freed() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();

        let kept = index.find_leaf(&mut arena, &mut stack, LeafData { nw: 1, ne: 0, sw: 0, se: 0 });
        let orphan = arena.insert(Node::new_leaf(LeafData { nw: 0, ne: 1, sw: 0, se: 0 }));
        assert!(arena.get(orphan).is_some());

        let stats = collect(&mut arena, &mut index, &[kept], &SaveStack::new(), false);
        assert_eq!(stats.freed, 1);
        assert!(arena.get(kept).is_some());
        assert!(arena.get(orphan).is_none());
    }

    #[test]
    fn save_stack_scope_truncates_on_drop() {
        let mut stack = SaveStack::new();
        stack.push(thunderdome::Arena::<()>::new().insert(()));
        let mark = stack.len();
        {
            let mut scope = stack.scope();
            scope.stack.push(thunderdome::Arena::<()>::new().insert(()));
            assert_eq!(scope.stack.len(), mark + 1);
        }
        assert_eq!(stack.len(), mark);
    }

    #[test]
    fn invalidate_clears_cached_results() {
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(16);
        let mut stack = SaveStack::new();
        let leaf = index.find_leaf(&mut arena, &mut stack, LeafData { nw: 1, ne: 0, sw: 0, se: 0 });
        arena[leaf].leaf_res1 = Some(7);

        collect(&mut arena, &mut index, &[leaf], &SaveStack::new(), true);
        assert_eq!(arena[leaf].leaf_res1, None);
    }
}
