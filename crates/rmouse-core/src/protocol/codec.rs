//! Codec for encoding and decoding Remote-Mouse-Over-IP command payloads.
//!
//! Wire grammar (plaintext, i.e. after the secure channel has removed the
//! IV/ciphertext envelope):
//! ```text
//! M<dx:4><dy:4>        relative move    (big-endian signed 32-bit fields)
//! A<x:4><y:4>          absolute move
//! S<dx:4><dy:4>        two-axis scroll
//! C_<button>_<phase>   click            (underscore-delimited text)
//! K_<code>_<phase>     key press        (underscore-delimited text)
//! T<text>              type literal text
//! OPEN-ACK / BEAT / SEQ-ACK / ACK / CLOSE   control acknowledgements
//! ```
//! Authenticated payloads additionally carry a 4-byte big-endian sequence
//! number in front of the grammar above; [`prepend_seq`] and [`split_seq`]
//! handle that prefix.

use thiserror::Error;

use crate::protocol::commands::{control, Command, MouseButton, Phase, SEQ_NUM_BYTES};

/// Errors that can occur while decoding a command payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload is shorter than the grammar requires.
    #[error("truncated payload: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The leading type tag is not part of the grammar.  On an authenticated
    /// channel this almost always means the shared password is wrong, because
    /// decrypting with the wrong key produces pseudo-random plaintext.
    #[error("unrecognized command tag: 0x{0:02X}")]
    BadCommand(u8),

    /// A text field was not valid UTF-8.
    #[error("invalid text field: {0}")]
    InvalidText(String),

    /// An underscore-delimited field had an unexpected value or count.
    #[error("malformed field: {0}")]
    BadField(String),
}

// ── Sequence-number framing ───────────────────────────────────────────────────

/// Prepends the 4-byte big-endian sequence number to a command payload.
pub fn prepend_seq(seq: u32, msg: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SEQ_NUM_BYTES + msg.len());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(msg);
    out
}

/// Splits an authenticated payload into its sequence number and the command
/// bytes that follow.
///
/// # Errors
///
/// Returns [`ProtocolError::Truncated`] if fewer than 4 bytes are present.
pub fn split_seq(payload: &[u8]) -> Result<(u32, &[u8]), ProtocolError> {
    if payload.len() < SEQ_NUM_BYTES {
        return Err(ProtocolError::Truncated {
            needed: SEQ_NUM_BYTES,
            available: payload.len(),
        });
    }
    let seq = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    Ok((seq, &payload[SEQ_NUM_BYTES..]))
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] into its wire payload (without sequence number).
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    match cmd {
        Command::Move { dx, dy } => encode_xy(b'M', *dx, *dy),
        Command::MoveAbs { x, y } => encode_xy(b'A', *x, *y),
        Command::Scroll { dx, dy } => encode_xy(b'S', *dx, *dy),
        Command::Click { button, phase } => {
            format!("C_{}_{}", button.wire_name(), phase.wire_letter()).into_bytes()
        }
        Command::Key { code, phase } => {
            format!("K_{}_{}", code, phase.wire_letter()).into_bytes()
        }
        Command::TypeText(text) => {
            let mut buf = Vec::with_capacity(1 + text.len());
            buf.push(b'T');
            buf.extend_from_slice(text.as_bytes());
            buf
        }
        Command::Heartbeat => control::BEAT.to_vec(),
        Command::OpenAck => control::OPEN_ACK.to_vec(),
        Command::SeqAck => control::SEQ_ACK.to_vec(),
        Command::Close => control::CLOSE.to_vec(),
    }
}

fn encode_xy(tag: u8, x: i32, y: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    buf.push(tag);
    buf.extend_from_slice(&x.to_be_bytes());
    buf.extend_from_slice(&y.to_be_bytes());
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one [`Command`] from a plaintext payload.
///
/// Control acknowledgements are matched exactly (they never carry trailing
/// bytes after unpadding); everything else dispatches on the leading tag.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the payload is empty, truncated, or carries
/// an unknown tag.
pub fn decode_command(payload: &[u8]) -> Result<Command, ProtocolError> {
    // Exact control tags first: `CLOSE` would otherwise collide with the
    // `C` click prefix, and `ACK` with the `A` absolute-move tag.
    match payload {
        p if p == control::BEAT => return Ok(Command::Heartbeat),
        p if p == control::OPEN_ACK => return Ok(Command::OpenAck),
        p if p == control::SEQ_ACK || p == control::ACK => return Ok(Command::SeqAck),
        p if p == control::CLOSE => return Ok(Command::Close),
        _ => {}
    }

    let tag = *payload.first().ok_or(ProtocolError::Truncated {
        needed: 1,
        available: 0,
    })?;

    match tag {
        b'M' => decode_xy(payload).map(|(dx, dy)| Command::Move { dx, dy }),
        b'A' => decode_xy(payload).map(|(x, y)| Command::MoveAbs { x, y }),
        b'S' => decode_xy(payload).map(|(dx, dy)| Command::Scroll { dx, dy }),
        b'C' => {
            let (button, phase) = decode_underscored(payload)?;
            let button = MouseButton::from_wire_name(&button)
                .ok_or_else(|| ProtocolError::BadField(format!("unknown button: {button}")))?;
            Ok(Command::Click { button, phase })
        }
        b'K' => {
            let (code, phase) = decode_underscored(payload)?;
            Ok(Command::Key { code, phase })
        }
        b'T' => {
            let text = std::str::from_utf8(&payload[1..])
                .map_err(|e| ProtocolError::InvalidText(e.to_string()))?;
            Ok(Command::TypeText(text.to_string()))
        }
        other => Err(ProtocolError::BadCommand(other)),
    }
}

/// Decodes the two fixed-width big-endian signed fields of a move/scroll
/// payload (`<tag:1><x:4><y:4>`, exactly 9 bytes).
fn decode_xy(payload: &[u8]) -> Result<(i32, i32), ProtocolError> {
    if payload.len() < 9 {
        return Err(ProtocolError::Truncated {
            needed: 9,
            available: payload.len(),
        });
    }
    if payload.len() > 9 {
        return Err(ProtocolError::BadField(format!(
            "{} trailing bytes after coordinates",
            payload.len() - 9
        )));
    }
    let x = i32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let y = i32::from_be_bytes([payload[5], payload[6], payload[7], payload[8]]);
    Ok((x, y))
}

/// Decodes an underscore-delimited `<tag>_<field>_<phase>` payload.
fn decode_underscored(payload: &[u8]) -> Result<(String, Phase), ProtocolError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| ProtocolError::InvalidText(e.to_string()))?;
    let mut parts = text.split('_');
    let _tag = parts.next();
    let field = parts
        .next()
        .ok_or_else(|| ProtocolError::BadField("missing field".to_string()))?;
    let phase_letter = parts
        .next()
        .ok_or_else(|| ProtocolError::BadField("missing phase".to_string()))?;
    if parts.next().is_some() {
        return Err(ProtocolError::BadField("too many fields".to_string()));
    }
    let phase = Phase::from_wire_letter(phase_letter)
        .ok_or_else(|| ProtocolError::BadField(format!("unknown phase: {phase_letter}")))?;
    Ok((field.to_string(), phase))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
