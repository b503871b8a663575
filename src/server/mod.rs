//! Connection acceptance, routing, and handler supervision.

pub mod dispatcher;
pub mod handshake;
pub mod listener;
pub mod registry;

pub use dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher, Gate};
pub use handshake::ContinueHandshake;
pub use listener::{Server, ShutdownHandle};
pub use registry::{Handler, Registry};
