//! The encrypted channel: key derivation, framing padding, and the
//! AES-128-CBC seal/open pair.
//!
//! # Wire format (for beginners)
//!
//! Every encrypted datagram has the shape
//!
//! ```text
//! [ IV : 16 bytes ][ AES-128-CBC ciphertext of  seq(4) || command ]
//! ```
//!
//! The *IV* (initialisation vector) is a fresh random block drawn per
//! message; CBC mode needs it so that encrypting the same plaintext twice
//! produces different ciphertext.  The sequence number travels *inside* the
//! ciphertext, which is what makes it useful against replays: an attacker
//! cannot bump it without the key.
//!
//! # Extended PKCS#5 padding
//!
//! Standard PKCS#5/#7 pads to the next multiple of the 16-byte AES block.
//! This protocol pads further, to a fixed *frame block* (32 bytes by
//! default), so every datagram on the wire has the same length regardless
//! of which command it carries.  The scheme is otherwise the classic one:
//! the pad byte equals the pad length and is repeated that many times, and
//! a full block of padding is added when the plaintext is already aligned.

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::protocol::codec::{prepend_seq, split_seq};
use crate::protocol::commands::{AES_BLOCK_BYTES, IV_BYTES, KEY_BYTES};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Errors produced while sealing or opening encrypted frames.
///
/// None of these are fatal to a session: a frame that fails to open is
/// counted against the peer and dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The frame is too short to contain an IV and at least one ciphertext
    /// block.
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// The ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext length {0} is not block-aligned")]
    Misaligned(usize),

    /// The decrypted plaintext does not end in valid extended-PKCS#5
    /// padding.  The usual cause is a wrong password on one side.
    #[error("bad padding in decrypted frame")]
    BadPadding,

    /// The requested frame block size is zero, not a multiple of the AES
    /// block, or smaller than the minimum plaintext.
    #[error("invalid frame block size: {0}")]
    BadBlockSize(usize),
}

/// Derives the 16-byte AES key from the shared password and the peer's salt.
///
/// The key is the first [`KEY_BYTES`] bytes of `SHA-256(password || salt)`.
/// An empty salt is allowed, for peers that never send one.
pub fn derive_key(password: &[u8], salt: &[u8]) -> [u8; KEY_BYTES] {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    let digest = hasher.finalize();
    let mut key = [0u8; KEY_BYTES];
    key.copy_from_slice(&digest[..KEY_BYTES]);
    key
}

// ── Extended PKCS#5 padding ───────────────────────────────────────────────────

/// Pads `data` to a multiple of `block` with the extended PKCS#5 scheme.
///
/// The pad byte is `block - data.len() % block` and is appended that many
/// times, so already-aligned input grows by a whole block.  `block` may be
/// larger than the AES block as long as it stays a multiple of it, which is
/// what lets every wire frame have a uniform size.
///
/// # Panics
///
/// Panics if `block` is zero.  [`CipherChannel::new`] validates the frame
/// block before any sealing path reaches this function.
pub fn pkcs5_pad(data: &[u8], block: usize) -> Vec<u8> {
    debug_assert!(block > 0, "pad block must be positive");
    let pad = block - data.len() % block;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Strips extended PKCS#5 padding.
///
/// # Errors
///
/// Returns [`CryptoError::BadPadding`] when the final byte is zero, exceeds
/// the data length, or the trailing bytes are not all equal to it.
pub fn pkcs5_unpad(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let &pad = data.last().ok_or(CryptoError::BadPadding)?;
    let pad = pad as usize;
    if pad == 0 || pad > data.len() {
        return Err(CryptoError::BadPadding);
    }
    let (body, tail) = data.split_at(data.len() - pad);
    if tail.iter().any(|&b| b as usize != pad) {
        return Err(CryptoError::BadPadding);
    }
    Ok(body.to_vec())
}

// ── The cipher channel ────────────────────────────────────────────────────────

/// Seals and opens encrypted frames under one derived key.
///
/// A channel is cheap to construct and is rebuilt whenever a new salt is
/// fetched from the peer.
pub struct CipherChannel {
    key: [u8; KEY_BYTES],
    frame_block: usize,
}

impl CipherChannel {
    /// Creates a channel from a derived key and the negotiated frame block
    /// size.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BadBlockSize`] unless `frame_block` is a
    /// positive multiple of the 16-byte AES block.
    pub fn new(key: [u8; KEY_BYTES], frame_block: usize) -> Result<Self, CryptoError> {
        if frame_block == 0 || frame_block % AES_BLOCK_BYTES != 0 {
            return Err(CryptoError::BadBlockSize(frame_block));
        }
        Ok(Self { key, frame_block })
    }

    /// The frame block size this channel pads to.
    pub fn frame_block(&self) -> usize {
        self.frame_block
    }

    /// The total wire size of a frame this channel produces: IV plus one
    /// padded frame block.
    pub fn frame_len(&self) -> usize {
        IV_BYTES + self.frame_block
    }

    /// Seals a command under a sequence number into a wire frame.
    ///
    /// Draws a fresh random IV, builds the plaintext `seq || msg`, pads it
    /// to the frame block, encrypts with AES-128-CBC, and returns
    /// `IV || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BadBlockSize`] if the padded message would
    /// exceed the frame block (the command is too long for the channel).
    pub fn seal(&self, seq: u32, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let plaintext = pkcs5_pad(&prepend_seq(seq, msg), self.frame_block);
        if plaintext.len() > self.frame_block {
            return Err(CryptoError::BadBlockSize(plaintext.len()));
        }

        let mut iv = [0u8; IV_BYTES];
        OsRng.fill_bytes(&mut iv);

        let mut buf = plaintext;
        let len = buf.len();
        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CryptoError::Misaligned(len))?;

        let mut frame = Vec::with_capacity(IV_BYTES + ciphertext.len());
        frame.extend_from_slice(&iv);
        frame.extend_from_slice(ciphertext);
        Ok(frame)
    }

    /// Opens a wire frame back into its sequence number and command bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] when the frame is shorter than an IV plus
    /// one block, when the ciphertext is not block-aligned, or when the
    /// padding check fails after decryption (wrong key, mangled frame).
    pub fn open(&self, frame: &[u8]) -> Result<(u32, Vec<u8>), CryptoError> {
        if frame.len() < IV_BYTES + AES_BLOCK_BYTES {
            return Err(CryptoError::FrameTooShort(frame.len()));
        }
        let (iv, ciphertext) = frame.split_at(IV_BYTES);
        if ciphertext.len() % AES_BLOCK_BYTES != 0 {
            return Err(CryptoError::Misaligned(ciphertext.len()));
        }

        let mut buf = ciphertext.to_vec();
        let iv_arr: [u8; IV_BYTES] = iv.try_into().map_err(|_| CryptoError::FrameTooShort(frame.len()))?;
        let plaintext = Aes128CbcDec::new(&self.key.into(), &iv_arr.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptoError::BadPadding)?;

        let unpadded = pkcs5_unpad(plaintext)?;
        let (seq, msg) = split_seq(&unpadded).map_err(|_| CryptoError::BadPadding)?;
        Ok((seq, msg.to_vec()))
    }
}

impl std::fmt::Debug for CipherChannel {
    // The key never appears in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherChannel")
            .field("frame_block", &self.frame_block)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::DEFAULT_FRAME_BLOCK;

    fn test_channel() -> CipherChannel {
        let key = derive_key(b"hunter2", b"0123456789abcdef");
        CipherChannel::new(key, DEFAULT_FRAME_BLOCK).expect("valid block size")
    }

    // ── Key derivation ────────────────────────────────────────────────────────

    #[test]
    fn test_derive_key_is_deterministic() {
        // Arrange / Act
        let a = derive_key(b"password", b"salt");
        let b = derive_key(b"password", b"salt");

        // Assert
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_key_depends_on_password_and_salt() {
        let base = derive_key(b"password", b"salt");
        assert_ne!(base, derive_key(b"passwore", b"salt"));
        assert_ne!(base, derive_key(b"password", b"salu"));
    }

    #[test]
    fn test_derive_key_accepts_empty_salt() {
        // Legacy peers send no salt; the digest is then over the password alone.
        let unsalted = derive_key(b"password", b"");
        let mut hasher = Sha256::new();
        hasher.update(b"password");
        assert_eq!(unsalted, hasher.finalize()[..KEY_BYTES]);
    }

    // ── Padding ───────────────────────────────────────────────────────────────

    #[test]
    fn test_pad_fills_to_block_with_pad_byte() {
        // Arrange – 13 bytes into a 16-byte block needs 3 pad bytes of 0x03
        let padded = pkcs5_pad(b"hello, world!", 16);

        // Assert
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[13..], &[3, 3, 3]);
    }

    #[test]
    fn test_pad_of_aligned_input_adds_full_block() {
        let padded = pkcs5_pad(&[0u8; 32], 32);
        assert_eq!(padded.len(), 64);
        assert_eq!(padded[63], 32);
    }

    #[test]
    fn test_pad_unpad_is_identity() {
        for len in 0..48 {
            let data: Vec<u8> = (0..len as u8).collect();
            let restored = pkcs5_unpad(&pkcs5_pad(&data, 32)).expect("unpad");
            assert_eq!(restored, data, "length {len}");
        }
    }

    #[test]
    #[should_panic(expected = "pad block must be positive")]
    fn test_pad_with_zero_block_panics() {
        pkcs5_pad(b"data", 0);
    }

    #[test]
    fn test_unpad_rejects_zero_pad_byte() {
        let result = pkcs5_unpad(&[1, 2, 3, 0]);
        assert_eq!(result, Err(CryptoError::BadPadding));
    }

    #[test]
    fn test_unpad_rejects_oversized_pad_byte() {
        let result = pkcs5_unpad(&[1, 2, 9]);
        assert_eq!(result, Err(CryptoError::BadPadding));
    }

    #[test]
    fn test_unpad_rejects_inconsistent_tail() {
        let result = pkcs5_unpad(&[1, 2, 2, 3]);
        assert_eq!(result, Err(CryptoError::BadPadding));
    }

    // ── Seal and open ─────────────────────────────────────────────────────────

    #[test]
    fn test_seal_open_round_trip() {
        // Arrange
        let channel = test_channel();

        // Act
        let frame = channel.seal(7, b"M\x00\x00\x00\x05\x00\x00\x00\x0A").unwrap();
        let (seq, msg) = channel.open(&frame).unwrap();

        // Assert
        assert_eq!(seq, 7);
        assert_eq!(msg, b"M\x00\x00\x00\x05\x00\x00\x00\x0A");
    }

    #[test]
    fn test_sealed_heartbeat_is_exactly_one_frame() {
        // HEART is 5 bytes, plus 4 of sequence = 9 plaintext bytes, padded
        // to the 32-byte frame block, plus the 16-byte IV: 48 on the wire.
        let channel = test_channel();
        let frame = channel.seal(1, b"HEART").unwrap();
        assert_eq!(frame.len(), 48);
        assert_eq!(frame.len(), channel.frame_len());

        let (seq, msg) = channel.open(&frame).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(msg, b"HEART");
    }

    #[test]
    fn test_seal_draws_a_fresh_iv_per_frame() {
        // Arrange
        let channel = test_channel();

        // Act – same plaintext twice
        let a = channel.seal(3, b"HEART").unwrap();
        let b = channel.seal(3, b"HEART").unwrap();

        // Assert – IVs differ, so ciphertexts differ too
        assert_ne!(&a[..IV_BYTES], &b[..IV_BYTES]);
        assert_ne!(&a[IV_BYTES..], &b[IV_BYTES..]);
    }

    #[test]
    fn test_open_with_wrong_key_fails_without_panicking() {
        // Arrange
        let channel = test_channel();
        let wrong = CipherChannel::new(
            derive_key(b"not-hunter2", b"0123456789abcdef"),
            DEFAULT_FRAME_BLOCK,
        )
        .unwrap();
        let frame = channel.seal(1, b"HEART").unwrap();

        // Act
        let result = wrong.open(&frame);

        // Assert – pseudo-random plaintext nearly always fails the pad check
        assert!(result.is_err());
    }

    #[test]
    fn test_open_rejects_short_and_misaligned_frames() {
        let channel = test_channel();
        assert_eq!(
            channel.open(&[0u8; 10]),
            Err(CryptoError::FrameTooShort(10))
        );
        assert_eq!(channel.open(&[0u8; 49]), Err(CryptoError::Misaligned(33)));
    }

    #[test]
    fn test_seal_rejects_oversized_message() {
        let channel = test_channel();
        // 4-byte sequence + 27 message bytes leaves one byte of padding in
        // the 32-byte block; a 28-byte message aligns the plaintext, which
        // forces a whole extra padding block and must fail.
        assert!(channel.seal(0, &[b'T'; 27]).is_ok());
        assert!(channel.seal(0, &[b'T'; 28]).is_err());
    }

    #[test]
    fn test_channel_rejects_non_multiple_block_size() {
        let key = derive_key(b"pw", b"");
        assert!(matches!(
            CipherChannel::new(key, 24),
            Err(CryptoError::BadBlockSize(24))
        ));
        assert!(matches!(
            CipherChannel::new(key, 0),
            Err(CryptoError::BadBlockSize(0))
        ));
    }

    #[test]
    fn test_larger_frame_blocks_round_trip() {
        // Arrange – a 64-byte block fits longer typed text
        let channel = CipherChannel::new(derive_key(b"pw", b"salt"), 64).unwrap();
        let text = b"Tthe quick brown fox jumps over the lazy dog";

        // Act
        let frame = channel.seal(99, text).unwrap();
        let (seq, msg) = channel.open(&frame).unwrap();

        // Assert
        assert_eq!(frame.len(), 16 + 64);
        assert_eq!(seq, 99);
        assert_eq!(msg, text);
    }
}
