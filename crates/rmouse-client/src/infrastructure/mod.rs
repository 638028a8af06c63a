//! Infrastructure layer for the client application.
//!
//! Contains OS-facing adapters: the UDP datagram transport, the input
//! injection backend, and TOML config persistence.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rmouse_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`input_emulation`** – Implementations of
//!   [`InputAction`](crate::application::dispatch_input::InputAction).
//!   The recording `MockInputEmulator` is the in-tree backend; real OS
//!   injection plugs in behind the same trait.
//!
//! - **`network`** – The connected UDP socket that carries session frames,
//!   with the receive timeout that clocks the state machine.
//!
//! - **`storage`** – TOML configuration in the platform config directory,
//!   including the remembered peer address and environment overrides.

pub mod input_emulation;
pub mod network;
pub mod storage;
