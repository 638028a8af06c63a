//! # rmouse-core
//!
//! Shared library for Remote-Mouse-Over-IP containing the wire-command codec,
//! the AES-CBC secure channel, and the anti-replay sequence guard.
//!
//! This crate is used by the receiving-host client application.  It has zero
//! dependencies on OS APIs, network sockets, or the async runtime.
//!
//! # Architecture overview (for beginners)
//!
//! Remote-Mouse-Over-IP turns a phone (or any remote peer) into a wireless
//! mouse and keyboard: the peer sends small datagrams describing pointer
//! movement, clicks, key presses, and typed text, and the receiving host
//! replays them as real input.  Datagrams can be lost, duplicated, or
//! reordered, so the protocol is built to survive all three.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Commands use a
//!   compact single-letter grammar (`M` = relative move, `A` = absolute move,
//!   `S` = scroll, `C` = click, `K` = key, `T` = type text) plus a handful of
//!   control tags for the session lifecycle (`OPEN-ACK`, `BEAT`, `SEQ-ACK`,
//!   `CLOSE`).  Every authenticated payload carries a 4-byte big-endian
//!   sequence number; the `SequenceGuard` rejects anything stale.
//!
//! - **`crypto`** – The secure channel.  A 128-bit key is derived from the
//!   shared password and a 16-byte salt (SHA-256, truncated), each frame is
//!   encrypted with AES-128-CBC under a fresh random IV, and plaintexts are
//!   padded with an extended PKCS#5 scheme so every frame on the wire has the
//!   same size.

// Declare the two top-level modules.  Rust will look for each in a
// subdirectory with the same name (e.g., src/protocol/mod.rs).
pub mod crypto;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rmouse_core::Command` instead of `rmouse_core::protocol::commands::Command`.
pub use crypto::{derive_key, CipherChannel, CryptoError};
pub use protocol::codec::{decode_command, encode_command, prepend_seq, split_seq, ProtocolError};
pub use protocol::commands::Command;
pub use protocol::sequence::SequenceGuard;
