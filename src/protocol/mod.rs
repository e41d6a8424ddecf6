//! # Application Protocol
//!
//! Routing of decoded [`Request`](crate::core::request::Request) frames to
//! registered handlers.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, CODE_NOT_FOUND};
