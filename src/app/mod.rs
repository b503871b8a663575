//! The demo application served on top of the core: a JSON key/value store,
//! token-based access checks, an upstream fetch, the continue handshake,
//! a redirect, and multipart upload.

pub mod auth;
pub mod fetch;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::{Route, register_routes};
pub use state::AppState;
