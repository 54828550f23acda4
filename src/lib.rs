//! A quadtree-memoised HashLife engine for two-state cellular automata.
//!
//! `Engine` (in [`engine`]) is the entry point: compile a rule, set cells,
//! step forward by arbitrarily large increments, and read back population,
//! bounding box, or macrocell serialisations. See `DESIGN.md` for how each
//! module grounds on the original `hlifealgo` implementation.

pub mod bigint;
pub mod cache;
pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod gc;
pub mod index;
pub mod leaf;
pub mod macrocell;
pub mod node;
pub mod poller;
pub mod population;
pub mod rule;
pub mod step;
pub mod timeline;

pub use bigint::BigInt;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
