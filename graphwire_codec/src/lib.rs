//! Encodes object graphs into a bracketed segment stream, and rebuilds them.
//!
//! The wire format is defined in [`graphwire_types::format`]. Objects are inspected
//! and allocated through the contracts in [`graphwire_types::runtime`].

mod config;
mod decoder;
mod encoder;
mod error;
mod identity;
mod pin_scope;

pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use identity::*;
pub use pin_scope::*;
