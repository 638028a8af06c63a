//! Input injection backends implementing
//! [`InputAction`](crate::application::dispatch_input::InputAction).
//!
//! The recording mock is the in-tree backend; a real OS automation adapter
//! (XTest, SendInput, CoreGraphics) plugs in behind the same trait without
//! touching the application layer.

pub mod mock;
