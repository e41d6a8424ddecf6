//! # Runtime Container
//!
//! Owns the process's long-lived actors (listeners, background reporters).
//! Actors start in registration order and are closed in reverse order, so an
//! actor registered later may depend on one registered earlier.

pub mod container;

pub use container::{ActorState, RuntimeActor, RuntimeContainer};
