//! Request handlers, one module per `/api/*` prefix.

pub mod game;
pub mod sync;
pub mod util;
