//! JSON-RPC framing and request routing

mod handler;
mod types;

pub use handler::RequestHandler;
pub use types::*;
