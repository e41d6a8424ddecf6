//! # Service Layer
//!
//! Assembles the session store, listeners and background actors into a
//! runnable [`Gateway`].

pub mod gateway;

pub use gateway::Gateway;
