//! Switchyard - a small HTTP/1.1 server core
//!
//! Readiness-multiplexed request framing, deadline-bounded handler dispatch,
//! the `Expect: 100-continue` handshake, and multipart decoding, plus the
//! demo application that exercises them.

pub mod app;
pub mod config;
pub mod http;
pub mod server;
