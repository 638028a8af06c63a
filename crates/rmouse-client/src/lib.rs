//! rmouse-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rmouse-client do? (for beginners)
//!
//! The *client* is the computer being controlled.  A phone (or any other
//! sender) on the same network transmits mouse and keyboard commands to it
//! as small UDP datagrams, optionally encrypted under a shared password.
//!
//! The client application:
//!
//! 1. Opens a session with the sender: fetches a random salt, derives the
//!    AES key from the shared password, and completes the OPEN handshake.
//! 2. Receives encrypted datagrams, decrypts them, and checks the embedded
//!    sequence number so replayed or stale packets are dropped.
//! 3. Decodes each payload into a movement, click, key, scroll, or typed
//!    text command.
//! 4. Hands the command to an input-action backend that injects it as real
//!    OS input.
//! 5. Sends periodic heartbeats when the sender goes quiet, and reopens
//!    the session with a fresh key when the peer stops answering.

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: OS adapters, network transport, and config storage.
pub mod infrastructure;
