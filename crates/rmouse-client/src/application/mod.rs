//! Application layer use cases for the client application.
//!
//! # What use cases does the client have?
//!
//! - **`dispatch_input`** – Routes decoded [`rmouse_core::Command`]s to an
//!   [`InputAction`](dispatch_input::InputAction) backend that performs the
//!   actual OS input injection.  The backend is injected at construction
//!   time, so the routing logic is testable without a desktop environment.
//!
//! - **`run_session`** – Drives the session lifecycle over a datagram
//!   transport: the salt/OPEN handshake, the receive-decrypt-dispatch loop,
//!   heartbeat refreshes when the sender goes quiet, sequence
//!   resynchronisation after repeated bad frames, and the best-effort CLOSE
//!   on shutdown.

pub mod dispatch_input;
pub mod run_session;
