//! Onion-style middleware pipeline
//!
//! Middleware registered first runs first on the way in and last on the way
//! out. Each stage receives the request by value together with a [`Next`]
//! continuation; not calling [`Next::run`] short-circuits every inner stage.

mod context;
mod middleware;
mod stack;

pub use context::PipelineContext;
pub use middleware::{from_fn, terminal_fn, FromFn, Middleware, Next, TerminalHandler};
pub use stack::{MiddlewareStack, Pipeline};
