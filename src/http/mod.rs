//! HTTP protocol implementation.
//!
//! One request per connection: the server reads a request, sends exactly one
//! terminal response, and closes the socket.
//!
//! # Architecture
//!
//! - **`status`**: status codes and the total reason-phrase table
//! - **`parser`**: request-head parsing and validation
//! - **`request`**: the immutable request value and query-string access
//! - **`response`**: response representation with builder pattern
//! - **`writer`**: serializes responses and enforces "send at most once"
//! - **`connection`**: a client socket checked out of the event loop
//! - **`multipart`**: `multipart/form-data` body decoding
//!
//! # Request Lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Pending   │ ← Event loop reads chunks until the head is framed
//!        └──────┬──────┘
//!               │ Head complete (checked out of the loop)
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatched     │ ← Handler runs on the worker pool
//!        └──────┬───────────┘
//!               │ optional: 100 Continue, drain body
//!               ▼
//!        ┌──────────────────┐
//!        │   Answered       │ ← First terminal response wins
//!        └──────┬───────────┘
//!               │
//!               └─ Closed
//! ```

pub mod connection;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod writer;
