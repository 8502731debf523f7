//! Client half of a remote compile-and-run WebAssembly playground.
//!
//! Source text is submitted to a remote compilation service over HTTP; on
//! success the compiled wasm artifact is fetched with a cache-busting
//! locator, instantiated, and optionally handed to a user-authored driver
//! snippet that exercises its exports.

pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod editor;
pub mod error;
pub mod loader;
pub mod request;
