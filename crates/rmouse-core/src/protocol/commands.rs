//! All Remote-Mouse-Over-IP command types and protocol constants.
//!
//! Commands follow the single-letter wire grammar shared with the phone-side
//! server.  The canonical key representation is the server's lower-case key
//! name (e.g. `enter`, `backspace`, `a`).

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the sequence-number prefix inside an authenticated payload.
pub const SEQ_NUM_BYTES: usize = 4;

/// Size of the per-frame initialization vector, sent in the clear.
pub const IV_BYTES: usize = 16;

/// Size of the password salt issued by the peer.
pub const SALT_BYTES: usize = 16;

/// Size of the derived symmetric key (AES-128).
pub const KEY_BYTES: usize = 16;

/// Native AES block size; the frame block must be a multiple of this.
pub const AES_BLOCK_BYTES: usize = 16;

/// Default ciphertext block per frame.  With the 16-byte IV this yields the
/// fixed 48-byte wire frames used over UDP.
pub const DEFAULT_FRAME_BLOCK: usize = 32;

/// Largest representable sequence number (`i32::MAX`, the signed-arithmetic
/// variant of the protocol).  The counter space restarts at 0 once a session
/// reaches this value.
pub const MAX_SEQ: u32 = 2_147_483_647;

/// Consecutive rejected frames tolerated before a resynchronization is
/// triggered.
pub const MAX_BAD_RESPONSES: u32 = 5;

/// Consecutive heartbeat timeouts tolerated before the session falls back to
/// a full re-open.
pub const MAX_REFRESH_ATTEMPTS: u32 = 3;

// ── Control tags ──────────────────────────────────────────────────────────────

/// Control request/response tags exchanged during the session lifecycle.
///
/// Requests (client → peer): `OPEN`, `HEART`, `SEQ`, `CLOSE`, `SALT`.
/// Responses (peer → client): `OPEN-ACK`, `BEAT`, `SEQ-ACK` (or legacy `ACK`).
pub mod control {
    pub const OPEN: &[u8] = b"OPEN";
    pub const OPEN_ACK: &[u8] = b"OPEN-ACK";
    pub const HEART: &[u8] = b"HEART";
    pub const BEAT: &[u8] = b"BEAT";
    pub const SEQ: &[u8] = b"SEQ";
    pub const SEQ_ACK: &[u8] = b"SEQ-ACK";
    pub const ACK: &[u8] = b"ACK";
    pub const CLOSE: &[u8] = b"CLOSE";
    pub const SALT: &[u8] = b"SALT";
}

// ── Command payload types ─────────────────────────────────────────────────────

/// Mouse button identifier.  Wire names match the peer's lower-case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Wire name used in `C_<button>_<phase>` payloads.
    pub fn wire_name(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    /// Parses the wire name back into a button.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Press phase for click and key commands.
///
/// `Full` is a complete press-and-release in one command; `Up` and `Down` are
/// the two halves for press-and-hold gestures (e.g. drag, key repeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Up,
    Down,
    Full,
}

impl Phase {
    /// Wire letter used in underscore-delimited payloads.
    pub fn wire_letter(&self) -> &'static str {
        match self {
            Phase::Up => "U",
            Phase::Down => "D",
            Phase::Full => "F",
        }
    }

    /// Parses the wire letter back into a phase.
    pub fn from_wire_letter(letter: &str) -> Option<Self> {
        match letter {
            "U" => Some(Phase::Up),
            "D" => Some(Phase::Down),
            "F" => Some(Phase::Full),
            _ => None,
        }
    }
}

/// A decoded payload: either an input command to replay on the host or a
/// lifecycle acknowledgement from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `M<dx:4><dy:4>` – move the pointer relative to its current position.
    Move { dx: i32, dy: i32 },
    /// `A<x:4><y:4>` – move the pointer to an absolute pixel coordinate.
    MoveAbs { x: i32, y: i32 },
    /// `S<dx:4><dy:4>` – two-axis scroll.
    Scroll { dx: i32, dy: i32 },
    /// `C_<button>_<phase>` – mouse button press/release/full click.
    Click { button: MouseButton, phase: Phase },
    /// `K_<code>_<phase>` – named key press/release/full press.
    Key { code: String, phase: Phase },
    /// `T<text>` – type a literal UTF-8 string.
    TypeText(String),
    /// `BEAT` – heartbeat acknowledgement (may also arrive out of order
    /// during normal operation, in which case it is ignored).
    Heartbeat,
    /// `OPEN-ACK` – the peer accepted an `OPEN` request.
    OpenAck,
    /// `SEQ-ACK` (or legacy `ACK`) – the peer adopted our sequence baseline.
    SeqAck,
    /// `CLOSE` – the peer is shutting the session down.
    Close,
}
