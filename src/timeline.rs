//! Timeline recording (§6.1/§8 supplement): periodic snapshots of the root
//! so a run can be scrubbed backwards without recomputation.
//!
//! Grounded on the `#FRAMES`/`#FRAME` extension read in
//! `hlifealgo::readmacrocell` (`examples/original_source/gollybase/hlifealgo.cpp`)
//! and the `timeline` struct it populates: a start generation, a fixed
//! `base^expo` spacing between recorded frames, and a flat list of roots.
//! The base is always 2 here since every recorded interval in this engine
//! comes from a `step` increment, which `Increment` already factors as a
//! power of two times an odd multiplier.

use crate::bigint::BigInt;
use crate::node::NodeId;

pub struct TimelineFrame {
    pub generation: BigInt,
    pub root: NodeId,
    pub level: u8,
}

/// Records frames as they're produced. Every root referenced by a frame is
/// an implicit GC root until the frame is dropped (§4.7): callers must
/// include `timeline.roots()` in the set passed to `gc::collect`.
#[derive(Default)]
pub struct Timeline {
    frames: Vec<TimelineFrame>,
    /// Only one frame in `interval` consecutive steps is kept; `None` means
    /// recording is off.
    interval: Option<u64>,
    steps_since_last: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Timeline { frames: Vec::new(), interval: None, steps_since_last: 0 }
    }

    pub fn set_interval(&mut self, interval: Option<u64>) {
        self.interval = interval;
        self.steps_since_last = 0;
    }

    pub fn is_recording(&self) -> bool {
        self.interval.is_some()
    }

    /// Called once per `step`; records a frame if the interval has elapsed.
    pub fn observe(&mut self, generation: &BigInt, root: NodeId, level: u8) {
        let Some(interval) = self.interval else { return };
        if self.steps_since_last == 0 {
            self.frames.push(TimelineFrame { generation: generation.clone(), root, level });
        }
        self.steps_since_last = (self.steps_since_last + 1) % interval.max(1);
    }

    /// Unconditionally records a frame, bypassing the interval counter —
    /// backs `Engine::record_frame`.
    pub fn push_frame(&mut self, generation: BigInt, root: NodeId, level: u8) {
        self.frames.push(TimelineFrame { generation, root, level });
    }

    pub fn frames(&self) -> &[TimelineFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.steps_since_last = 0;
    }

    /// Roots that must be kept alive across a GC sweep (§4.7).
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.frames.iter().map(|f| f.root)
    }

    /// The frame nearest to (and not after) `generation`, if any — used to
    /// jump backwards without recomputation.
    pub fn frame_at_or_before(&self, generation: &BigInt) -> Option<&TimelineFrame> {
        self.frames.iter().rev().find(|f| &f.generation <= generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunderdome::Arena;

    #[test]
    fn records_one_frame_per_interval() {
        let mut tl = Timeline::new();
        tl.set_interval(Some(3));
        let mut arena: Arena<()> = Arena::new();
        let id = arena.insert(());
        for gen in 0..9u64 {
            tl.observe(&BigInt::from_u64(gen), id, 3);
        }
        assert_eq!(tl.frames().len(), 3);
    }

    #[test]
    fn no_interval_records_nothing() {
        let mut tl = Timeline::new();
        let mut arena: Arena<()> = Arena::new();
        let id = arena.insert(());
        tl.observe(&BigInt::from_u64(0), id, 3);
        assert!(tl.frames().is_empty());
    }
}
