//! Pipeline error taxonomy.
//!
//! A rejected compile is not represented here: the service saying "this
//! program does not build" is a normal outcome, carried as the `Failure`
//! variant of [`CompileOutcome`](crate::client::CompileOutcome). These
//! variants cover everything that prevents a cycle from reaching a verdict.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The compile request could not be completed at the transport level
    /// (connection refused, DNS, timeout, body read).
    #[error("compile service unreachable")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The service replied, but the body was not the expected JSON shape.
    #[error("malformed compile response: {message}")]
    MalformedResponse { message: String },

    /// The compiled artifact could not be fetched, or its instantiation or
    /// initialization entry point failed. Single-shot, no retry.
    #[error("failed to load artifact at {locator}")]
    Load {
        locator: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The driver snippet failed to parse, named an unknown export, or its
    /// invocation trapped.
    #[error("driver evaluation failed: {0}")]
    Driver(String),

    /// No editor is registered under the requested identifier.
    #[error("no editor registered under `{0}`")]
    UnknownEditor(String),

    /// The trigger is already disabled: a cycle is in flight on it. The new
    /// trigger is rejected, never queued, and never cancels the running one.
    #[error("a compile cycle is already running")]
    Busy,
}
