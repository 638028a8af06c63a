//! Protocol module containing the command grammar, the binary codec, and the
//! anti-replay sequence guard.

pub mod codec;
pub mod commands;
pub mod sequence;

pub use codec::{decode_command, encode_command, prepend_seq, split_seq, ProtocolError};
pub use commands::*;
pub use sequence::SequenceGuard;
