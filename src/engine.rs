//! Top-level engine (§6.1): owns the arena, hash index, rule, cache
//! context, and every auxiliary cache, and exposes the operations an
//! embedder actually calls.
//!
//! Grounded on `hlifealgo`'s public method surface in
//! `examples/original_source/gollybase/hlifealgo.h`/`.cpp`, which is the
//! one object a host application drives; this struct plays the same role,
//! composed from the smaller components built in the sibling modules
//! rather than as one monolithic class.

use crate::bigint::BigInt;
use crate::cache;
use crate::cell;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gc::{self, SaveStack};
use crate::index::HashIndex;
use crate::macrocell;
use crate::node::{LeafData, NodeArena, NodeId};
use crate::poller::{ErrorSink, NullPoller, Poller, TracingErrorSink};
use crate::population::PopulationCache;
use crate::rule::{self, CompiledRule};
use crate::step::{self, Increment, Universe};
use crate::timeline::Timeline;

/// Rough bytes-per-node used to translate `EngineConfig::max_memory_mb`
/// into a node-count budget; a `Node` is a handful of `Option<NodeId>`s and
/// small scalars; 64 is a deliberately conservative (i.e. high) estimate so
/// the engine GCs a little early rather than late.
const BYTES_PER_NODE_ESTIMATE: usize = 64;

pub struct Engine {
    arena: NodeArena,
    index: HashIndex,
    stack: SaveStack,
    rule: CompiledRule,
    /// `empty[level]` is the canonical all-dead node at that level.
    empty: Vec<NodeId>,
    universe: Universe,
    increment: Increment,
    population: PopulationCache,
    timeline: Timeline,
    config: EngineConfig,
    poller: Box<dyn Poller>,
    errors: Box<dyn ErrorSink>,
    comment: String,
}

impl Engine {
    /// `new_engine` (§6.1): builds an engine with an empty universe under
    /// `rule_str`.
    pub fn new_engine(rule_str: &str, mut config: EngineConfig) -> Result<Engine, EngineError> {
        config.clamp_memory();
        let rule = rule::compile(rule_str)?;
        let mut arena = NodeArena::new();
        let mut index = HashIndex::new(config.initial_hash_capacity).with_max_load_factor(config.max_load_factor);
        let mut stack = SaveStack::new();
        let leaf = index.find_leaf(&mut arena, &mut stack, LeafData { nw: 0, ne: 0, sw: 0, se: 0 });
        let mut empty = vec![leaf, leaf, leaf];
        step::ensure_empty_level(&mut arena, &mut index, &mut stack, &mut empty, 3);
        let root = empty[3];

        let mut timeline = Timeline::new();
        timeline.set_interval(config.timeline_interval);

        Ok(Engine {
            arena,
            index,
            stack,
            rule,
            empty,
            universe: Universe { root, level: 3, generation: BigInt::zero() },
            increment: Increment::new(&BigInt::from_u64(1))?,
            population: PopulationCache::new(),
            timeline,
            config,
            poller: Box::new(NullPoller),
            errors: Box::new(TracingErrorSink),
            comment: String::new(),
        })
    }

    pub fn set_poller(&mut self, poller: Box<dyn Poller>) {
        self.poller = poller;
    }

    pub fn set_error_sink(&mut self, sink: Box<dyn ErrorSink>) {
        self.errors = sink;
    }

    /// `set_max_memory` (§6.1), clamped per `setMaxMemory`.
    pub fn set_max_memory(&mut self, mb: u32) {
        self.config.max_memory_mb = mb;
        self.config.clamp_memory();
    }

    fn node_budget(&self) -> usize {
        (self.config.max_memory_mb as usize * 1024 * 1024) / BYTES_PER_NODE_ESTIMATE
    }

    fn gc_roots(&self) -> Vec<NodeId> {
        let mut roots = vec![self.universe.root];
        roots.extend_from_slice(&self.empty);
        roots.extend(self.timeline.roots());
        roots
    }

    /// Runs a GC sweep if the arena has grown past the configured memory
    /// budget. Returns the stats if a collection actually ran.
    pub fn collect_if_needed(&mut self) -> Option<crate::gc::GcStats> {
        if self.arena.len() <= self.node_budget() {
            return None;
        }
        let roots = self.gc_roots();
        let stats = gc::collect(&mut self.arena, &mut self.index, &roots, &self.stack, false);
        self.population.invalidate();
        if self.index.len() as f64 / self.index.bucket_count() as f64 > self.config.max_load_factor {
            self.errors.warning("garbage collection did not free enough to stay under the configured memory budget");
        }
        Some(stats)
    }

    /// `set_rule` (§6.1): recompiles the rule table. Every cached
    /// full/half-jump result is keyed to the old rule, so a GC sweep with
    /// `invalidate = true` runs immediately after.
    pub fn set_rule(&mut self, rule_str: &str) -> Result<(), EngineError> {
        let new_rule = rule::compile(rule_str)?;
        self.rule = new_rule;
        let roots = self.gc_roots();
        gc::collect(&mut self.arena, &mut self.index, &roots, &self.stack, true);
        self.population.invalidate();
        Ok(())
    }

    pub fn get_rule(&self) -> &str {
        &self.rule.canonical
    }

    /// `set_increment`: changes how many generations [`step`](Self::step)
    /// advances by. A half-jump result cached under the old `ngens` can
    /// represent a different amount of progress under the new one, so every
    /// such cache entry is dropped (the full-jump cache is unaffected and
    /// stays warm).
    pub fn set_increment(&mut self, amount: &BigInt) -> Result<(), EngineError> {
        let new_increment = Increment::new(amount)?;
        if new_increment.pow2() != self.increment.pow2() {
            cache::invalidate_step_results(&mut self.arena);
        }
        self.increment = new_increment;
        Ok(())
    }

    pub fn set_generation(&mut self, generation: BigInt) {
        self.universe.generation = generation;
    }

    pub fn generation(&self) -> &BigInt {
        &self.universe.generation
    }

    /// `step` (§6.1): advances the universe by the configured increment.
    pub fn step(&mut self) {
        self.poller.set_interrupted(false);
        let mut interrupt = || self.poller.poll() || self.poller.is_interrupted();
        step::step(
            &mut self.arena,
            &mut self.index,
            &mut self.stack,
            &self.rule.table,
            &mut self.empty,
            &mut interrupt,
            &mut self.universe,
            self.increment,
        );
        self.timeline.observe(&self.universe.generation, self.universe.root, self.universe.level);
        self.collect_if_needed();
    }

    /// Unconditionally records the current root as a timeline frame,
    /// bypassing the automatic recording interval (§6.1/B.1).
    pub fn record_frame(&mut self) {
        self.timeline.push_frame(self.universe.generation.clone(), self.universe.root, self.universe.level);
    }

    /// The comment text attached to the universe, collected from a
    /// macrocell file's `#C` lines on load (B.3) or set directly.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Expands the root until it can contain `(x, y)`, per `pushroot`'s own
    /// growth-on-demand use in `setcell`.
    fn ensure_contains(&mut self, x: i64, y: i64) {
        let bound = x.unsigned_abs().max(y.unsigned_abs()) as i64 + 1;
        while (1i64 << self.universe.level) < bound {
            step::ensure_empty_level(&mut self.arena, &mut self.index, &mut self.stack, &mut self.empty, self.universe.level);
            self.universe.root = step::push_root(&mut self.arena, &mut self.index, &mut self.stack, &self.empty, self.universe.root, self.universe.level);
            self.universe.level += 1;
        }
    }

    /// `set_cell` (§6.1).
    pub fn set_cell(&mut self, x: i64, y: i64, state: bool) {
        self.ensure_contains(x, y);
        self.universe.root = cell::set_cell(&mut self.arena, &mut self.index, &mut self.stack, self.universe.root, self.universe.level, x, y, state);
    }

    /// `get_cell` (§6.1). Coordinates outside the current root are dead by
    /// definition — the universe has not been expanded to cover them.
    pub fn get_cell(&self, x: i64, y: i64) -> bool {
        let bound = 1i64 << self.universe.level;
        if x < -bound || x >= bound || y < -bound || y >= bound {
            return false;
        }
        cell::get_cell(&self.arena, self.universe.root, self.universe.level, x, y)
    }

    /// `next_cell` (§4.6/§6.1): the x-coordinate of the next live cell at
    /// or after `x` in row `y`, or `-1` if none exists — matching
    /// `nextcell`'s sentinel-return convention rather than an `Option`.
    pub fn next_cell(&self, x: i64, y: i64) -> i64 {
        let bound = 1i64 << self.universe.level;
        if x >= bound || y < -bound || y >= bound {
            return -1;
        }
        cell::next_cell(&self.arena, &self.empty, self.universe.root, self.universe.level, x, y).unwrap_or(-1)
    }

    /// `find_edges` (§6.1): the tightest bounding box containing every live
    /// cell, or `None` for an empty universe.
    pub fn find_edges(&self) -> Option<(i64, i64, i64, i64)> {
        cell::find_edges(&self.arena, &self.empty, self.universe.root, self.universe.level)
    }

    /// `is_empty`/`end_of_pattern` (§6.1).
    pub fn is_empty(&self) -> bool {
        cell::end_of_pattern(&self.empty, self.universe.root, self.universe.level)
    }

    /// `get_population` (§6.1): memoised live-cell count.
    pub fn get_population(&mut self) -> BigInt {
        let pop = self.population.population(&self.arena, &self.empty, self.universe.root, self.universe.level);
        self.poller.update_pop(&pop);
        pop
    }

    /// `write_macrocell` (§6.1/B.1/B.3): `comment` is re-emitted as one `#C`
    /// line per input line; every recorded timeline frame is written
    /// verbatim as a `#FRAMES`/`#FRAME` block ahead of the live root.
    pub fn write_macrocell(&self, comment: &str) -> String {
        macrocell::write_macrocell(
            &self.arena,
            &self.empty,
            self.universe.root,
            self.universe.level,
            &self.rule.canonical,
            &self.universe.generation,
            comment,
            self.timeline.frames(),
        )
    }

    /// `read_macrocell` (§6.1): replaces the current universe with the
    /// parsed pattern. The rule and generation are taken from the file's
    /// `#R`/`#G` headers when present, otherwise left unchanged. Any `#C`
    /// lines replace [`comment`](Self::comment); any `#FRAMES`/`#FRAME`
    /// lines replace the current timeline (B.1/B.3).
    pub fn read_macrocell(&mut self, text: &str) -> Result<(), EngineError> {
        let Engine { arena, index, stack, empty, .. } = self;
        let mut zero_of = |arena: &mut NodeArena, index: &mut HashIndex, stack: &mut SaveStack, level: u8| -> NodeId {
            step::ensure_empty_level(arena, index, stack, empty, level);
            empty[level as usize]
        };
        let parsed = macrocell::read_macrocell(arena, index, stack, &mut zero_of, text)?;
        if let Some(rule_name) = &parsed.rule_name {
            self.set_rule(rule_name)?;
        }
        self.universe.root = parsed.root;
        self.universe.level = parsed.level;
        if let Some(gen) = parsed.generation {
            self.universe.generation = gen;
        }
        self.comment = parsed.comment.unwrap_or_default();
        self.timeline.clear();
        for frame in parsed.frames {
            self.timeline.push_frame(frame.generation, frame.root, frame.level);
        }
        self.population.invalidate();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_engine_starts_empty() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        assert!(engine.is_empty());
        assert_eq!(engine.get_population(), BigInt::zero());
        assert_eq!(engine.find_edges(), None);
    }

    #[test]
    fn set_and_get_cell_round_trips_and_reports_non_empty() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine.set_cell(100, -50, true);
        assert!(engine.get_cell(100, -50));
        assert!(!engine.is_empty());
        assert_eq!(engine.get_population(), BigInt::from_u64(1));
        assert_eq!(engine.find_edges(), Some((100, 100, -50, -50)));
    }

    #[test]
    fn blinker_oscillates_after_two_steps() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine.set_cell(-1, 0, true);
        engine.set_cell(0, 0, true);
        engine.set_cell(1, 0, true);
        engine.set_increment(&BigInt::from_u64(2)).unwrap();
        engine.step();
        assert_eq!(engine.get_population(), BigInt::from_u64(3));
        assert!(engine.get_cell(-1, 0));
        assert!(engine.get_cell(0, 0));
        assert!(engine.get_cell(1, 0));
    }

    #[test]
    fn set_rule_invalidates_cached_results() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine.set_cell(0, 0, true);
        engine.set_rule("B36/S23").unwrap();
        assert_eq!(engine.get_rule(), "B36/S23");
        assert!(engine.get_cell(0, 0));
    }

    #[test]
    fn macrocell_round_trip_preserves_population() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine.set_cell(2, 3, true);
        engine.set_cell(-4, -1, true);
        let text = engine.write_macrocell("");

        let mut engine2 = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine2.read_macrocell(&text).unwrap();
        assert_eq!(engine2.get_population(), BigInt::from_u64(2));
        assert!(engine2.get_cell(2, 3));
        assert!(engine2.get_cell(-4, -1));
    }

    #[test]
    fn recorded_frames_and_comment_round_trip_through_macrocell() {
        let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        engine.set_cell(1, 1, true);
        engine.set_comment("a test pattern");
        engine.record_frame();
        engine.set_increment(&BigInt::from_u64(1)).unwrap();
        engine.step();
        engine.record_frame();
        let text = engine.write_macrocell(engine.comment());

        let mut reloaded = Engine::new_engine("B3/S23", EngineConfig::default()).unwrap();
        reloaded.read_macrocell(&text).unwrap();
        assert_eq!(reloaded.comment(), "a test pattern");
        assert_eq!(reloaded.timeline.frames().len(), 2);
    }
}
