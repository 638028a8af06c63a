//! RunSessionUseCase: drives the session lifecycle over a datagram transport.
//!
//! # The session lifecycle (for beginners)
//!
//! The client and the sender keep a tiny stateful protocol on top of UDP:
//!
//! ```text
//! Closed ──► Opening ──► Open ◄──► Refreshing
//!               ▲          │
//!               └──────────┘  (peer unresponsive / counters lost)
//! ```
//!
//! - **Opening** – fetch a random salt from the peer, derive the AES key
//!   from the shared password, send a sealed `OPEN` (sequence 0), and wait
//!   for `OPEN-ACK` (sequence 1).  Without a password the handshake is a
//!   plaintext `OPEN` / `OPEN-ACK`.
//! - **Open** – receive, decrypt, sequence-check, decode, and dispatch one
//!   datagram at a time.  The receive timeout is the only clock the state
//!   machine has.
//! - **Refreshing** – when the sender goes quiet, send a sealed `HEART` and
//!   wait for `BEAT`.  After three silent rounds the peer is presumed gone
//!   and the session reopens with a fresh salt and key.
//! - **Resynchronising** – after six consecutive bad frames (failed
//!   decryption, stale sequence, or unknown command) the counters are
//!   assumed lost: re-fetch the salt, send a sealed `SEQ`, and adopt the
//!   peer's counter from its `SEQ-ACK`.  At most one sync runs at a time.
//!
//! On shutdown the client sends a best-effort `CLOSE` so the peer can free
//! the session immediately instead of waiting for its own timeout.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use rmouse_core::{
    crypto::{derive_key, CipherChannel, CryptoError},
    decode_command,
    protocol::commands::{control, DEFAULT_FRAME_BLOCK, MAX_REFRESH_ATTEMPTS, SALT_BYTES},
    SequenceGuard,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::dispatch_input::{CommandDispatcher, Handled};

/// Errors that can occur in the datagram transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport is no longer usable.
    #[error("transport closed")]
    Closed,
}

/// Errors that end a session run.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed unrecoverably.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// An outgoing frame could not be sealed.  Incoming crypto failures are
    /// counted and retried, never propagated here.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The configured number of open attempts was exhausted.
    #[error("session open retries exhausted")]
    OpenRetriesExhausted,
}

/// Abstraction over a connected datagram socket.
///
/// `recv` returning `Ok(None)` means the timeout elapsed with no datagram,
/// which is how the state machine measures time.  Tests drive the session
/// with a scripted in-memory implementation.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Sends one datagram to the connected peer.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Waits up to `timeout` for one datagram.
    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Tunable session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shared password; `None` runs the legacy plaintext protocol.
    pub password: Option<String>,
    /// Padded plaintext size of every sealed frame.  Must be a multiple of
    /// the 16-byte AES block.
    pub frame_block: usize,
    /// Receive timeout, and therefore the heartbeat cadence.
    pub recv_timeout: Duration,
    /// Open attempts before giving up; `None` retries forever.
    pub open_retry_limit: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            password: None,
            frame_block: DEFAULT_FRAME_BLOCK,
            recv_timeout: Duration::from_secs(1),
            open_retry_limit: None,
        }
    }
}

/// What became of one incoming datagram.
enum FrameOutcome {
    /// Decoded and dispatched; the sequence counter moved.
    Handled,
    /// Dropped without consequence beyond the failure counter.
    Dropped,
    /// The failure counter crossed its threshold; start a sync.
    StartSync,
    /// The peer asked to close the session.
    CloseRequested,
}

/// What one heartbeat round established.
enum RefreshOutcome {
    /// The peer answered (or regular traffic resumed).
    Alive,
    /// The reply pushed the failure counter over its threshold.
    NeedSync,
    /// Too many silent rounds; reopen with a fresh key.
    Reopen,
    /// The peer closed the session during the round.
    Close,
}

/// The Run Session use case: one transport, one dispatcher, one peer.
pub struct Session<T: DatagramTransport> {
    transport: T,
    dispatcher: CommandDispatcher,
    config: SessionConfig,
    shutdown: Arc<AtomicBool>,
    guard: SequenceGuard,
    /// Present only while an authenticated session holds a derived key.
    channel: Option<CipherChannel>,
    refresh_attempts: u32,
}

impl<T: DatagramTransport> Session<T> {
    /// Creates a session over a connected transport.
    ///
    /// The `shutdown` flag is shared with the signal handler; the run loop
    /// checks it before every blocking receive.
    pub fn new(
        transport: T,
        dispatcher: CommandDispatcher,
        config: SessionConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            config,
            shutdown,
            guard: SequenceGuard::new(),
            channel: None,
            refresh_attempts: 0,
        }
    }

    /// Runs the session until the peer closes it, shutdown is requested, or
    /// the transport fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] on an unrecoverable socket error
    /// and [`SessionError::OpenRetriesExhausted`] when a configured retry
    /// limit runs out.  Crypto failures on incoming frames are counted and
    /// never end the run.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        'lifecycle: loop {
            if self.is_shutdown() {
                break;
            }
            if !self.open().await? {
                if self.is_shutdown() {
                    break;
                }
                return Err(SessionError::OpenRetriesExhausted);
            }
            info!("session open");

            loop {
                if self.is_shutdown() {
                    break 'lifecycle;
                }
                match self.transport.recv(self.config.recv_timeout).await? {
                    Some(frame) => match self.handle_frame(&frame) {
                        FrameOutcome::CloseRequested => {
                            info!("peer closed the session");
                            return Ok(());
                        }
                        FrameOutcome::StartSync => {
                            if !self.resync().await? {
                                continue 'lifecycle;
                            }
                        }
                        FrameOutcome::Handled | FrameOutcome::Dropped => {}
                    },
                    None => match self.refresh().await? {
                        RefreshOutcome::Alive => {}
                        RefreshOutcome::NeedSync => {
                            if !self.resync().await? {
                                continue 'lifecycle;
                            }
                        }
                        RefreshOutcome::Reopen => continue 'lifecycle,
                        RefreshOutcome::Close => {
                            info!("peer closed the session");
                            return Ok(());
                        }
                    },
                }
            }
        }

        self.send_close().await;
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    // ── Opening ───────────────────────────────────────────────────────────────

    /// Retries the handshake until it succeeds, shutdown is requested, or
    /// the retry limit runs out.  Returns `false` in the latter two cases.
    ///
    /// The salt is fetched and the key derived once; a timed-out attempt
    /// resends the sealed `OPEN` under that same key instead of starting a
    /// fresh salt round trip.
    async fn open(&mut self) -> Result<bool, SessionError> {
        let mut attempts = 0u32;
        let mut handshake: Option<CipherChannel> = None;
        loop {
            if self.is_shutdown() {
                return Ok(false);
            }
            if let Some(limit) = self.config.open_retry_limit {
                if attempts >= limit {
                    return Ok(false);
                }
            }
            attempts += 1;

            let Some(password) = self.config.password.clone() else {
                if self.try_open_plaintext().await? {
                    self.refresh_attempts = 0;
                    return Ok(true);
                }
                debug!(attempts, "open attempt timed out");
                continue;
            };

            if handshake.is_none() {
                handshake = match self.fetch_salt().await? {
                    Some(salt) => Some(CipherChannel::new(
                        derive_key(password.as_bytes(), &salt),
                        self.config.frame_block,
                    )?),
                    None => {
                        debug!(attempts, "salt request timed out");
                        continue;
                    }
                };
            }
            if let Some(channel) = &handshake {
                if self.try_open_sealed(channel).await? {
                    self.channel = handshake.take();
                    self.refresh_attempts = 0;
                    return Ok(true);
                }
            }
            debug!(attempts, "open attempt timed out");
        }
    }

    /// One legacy plaintext handshake attempt.
    async fn try_open_plaintext(&mut self) -> Result<bool, SessionError> {
        self.transport.send(control::OPEN).await?;
        match self.transport.recv(self.config.recv_timeout).await? {
            Some(reply) => Ok(reply == control::OPEN_ACK),
            None => Ok(false),
        }
    }

    /// One sealed handshake attempt under an already-derived key.
    /// `Ok(false)` is a timeout or a malformed reply, both of which the
    /// caller retries.
    async fn try_open_sealed(&mut self, channel: &CipherChannel) -> Result<bool, SessionError> {
        // Both counters restart at 0 under the new key.  The OPEN itself is
        // the one authenticated send that does not pre-increment.
        self.guard.reset();
        let frame = channel.seal(0, control::OPEN)?;
        self.transport.send(&frame).await?;

        match self.transport.recv(self.config.recv_timeout).await? {
            Some(reply) => match channel.open(&reply) {
                Ok((seq, msg)) if msg == control::OPEN_ACK => {
                    if !self.guard.accept(seq) {
                        warn!(seq, "handshake ack with stale sequence");
                        return Ok(false);
                    }
                    Ok(true)
                }
                Ok((seq, _)) => {
                    warn!(seq, "unexpected handshake reply");
                    Ok(false)
                }
                Err(e) => {
                    warn!(error = %e, "handshake reply failed to open");
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    /// Requests the peer's random salt.  The request is plaintext; the salt
    /// only ever feeds the key derivation, it is not a secret itself.
    async fn fetch_salt(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        self.transport.send(control::SALT).await?;
        match self.transport.recv(self.config.recv_timeout).await? {
            Some(datagram) if datagram.len() == SALT_BYTES => Ok(Some(datagram)),
            Some(datagram) => {
                warn!(len = datagram.len(), "unexpected salt reply length");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    // ── Serving ───────────────────────────────────────────────────────────────

    /// Processes one incoming datagram in the Open state.
    fn handle_frame(&mut self, frame: &[u8]) -> FrameOutcome {
        // Decrypt first so the channel borrow ends before the guard moves.
        let opened = self.channel.as_ref().map(|channel| channel.open(frame));
        let (seq, msg) = match opened {
            Some(Ok((seq, msg))) => (Some(seq), msg),
            Some(Err(e)) => {
                debug!(error = %e, "frame failed to open");
                return self.reject();
            }
            // Plaintext sessions carry bare commands with no sequence.
            None => (None, frame.to_vec()),
        };

        if let Some(seq) = seq {
            if !self.guard.permits(seq) {
                debug!(seq, last = self.guard.current(), "stale frame");
                return self.reject();
            }
        }

        let cmd = match decode_command(&msg) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!(error = %e, "undecodable command");
                return if seq.is_some() {
                    self.reject()
                } else {
                    FrameOutcome::Dropped
                };
            }
        };

        match self.dispatcher.handle(&cmd) {
            Ok(Handled::CloseRequested) => FrameOutcome::CloseRequested,
            Ok(_) => {
                // The counter moves only for commands that were handled.
                if let Some(seq) = seq {
                    self.guard.accept(seq);
                }
                FrameOutcome::Handled
            }
            Err(e) => {
                warn!(error = %e, "input injection failed");
                FrameOutcome::Dropped
            }
        }
    }

    /// Counts one bad frame against the peer.
    fn reject(&mut self) -> FrameOutcome {
        if self.guard.record_rejected() {
            warn!("too many bad frames; starting sequence sync");
            FrameOutcome::StartSync
        } else {
            FrameOutcome::Dropped
        }
    }

    // ── Refreshing ────────────────────────────────────────────────────────────

    /// One heartbeat round: a sealed `HEART` out, one timed receive back.
    async fn refresh(&mut self) -> Result<RefreshOutcome, SessionError> {
        debug!("sender quiet; sending heartbeat");
        if let Some(channel) = &self.channel {
            let seq = self.guard.advance();
            let frame = channel.seal(seq, control::HEART)?;
            self.transport.send(&frame).await?;
        } else {
            self.transport.send(control::HEART).await?;
        }

        let Some(reply) = self.transport.recv(self.config.recv_timeout).await? else {
            return Ok(self.count_missed_beat());
        };

        let opened = self.channel.as_ref().map(|channel| channel.open(&reply));
        match opened {
            Some(Err(e)) => {
                // A reply arrived, so the peer is not silent; it just holds
                // the wrong key.  That counts as a rejection and eventually
                // drives a sync, which re-fetches the salt.
                debug!(error = %e, "heartbeat reply failed to open");
                match self.reject() {
                    FrameOutcome::StartSync => Ok(RefreshOutcome::NeedSync),
                    _ => Ok(RefreshOutcome::Alive),
                }
            }
            // A replayed BEAT must not pass for a live peer: only a fresh
            // sequence number answers the heartbeat.  Stale ones fall
            // through and are rejected like any other stale frame.
            Some(Ok((seq, msg))) if msg == control::BEAT && self.guard.permits(seq) => {
                self.guard.accept(seq);
                self.refresh_attempts = 0;
                Ok(RefreshOutcome::Alive)
            }
            None if reply == control::BEAT => {
                self.refresh_attempts = 0;
                Ok(RefreshOutcome::Alive)
            }
            Some(Ok(_)) | None => {
                // The sender resumed before answering the heartbeat; the
                // reply is ordinary traffic.  Only a handled command proves
                // the peer alive enough to clear the silence counter.
                match self.handle_frame(&reply) {
                    FrameOutcome::CloseRequested => Ok(RefreshOutcome::Close),
                    FrameOutcome::StartSync => Ok(RefreshOutcome::NeedSync),
                    FrameOutcome::Handled => {
                        self.refresh_attempts = 0;
                        Ok(RefreshOutcome::Alive)
                    }
                    FrameOutcome::Dropped => Ok(RefreshOutcome::Alive),
                }
            }
        }
    }

    fn count_missed_beat(&mut self) -> RefreshOutcome {
        self.refresh_attempts += 1;
        if self.refresh_attempts >= MAX_REFRESH_ATTEMPTS {
            warn!(
                attempts = self.refresh_attempts,
                "peer unresponsive; reopening the session"
            );
            self.refresh_attempts = 0;
            self.channel = None;
            RefreshOutcome::Reopen
        } else {
            RefreshOutcome::Alive
        }
    }

    // ── Resynchronising ───────────────────────────────────────────────────────

    /// Re-derives the key and adopts the peer's sequence counter.  Returns
    /// `Ok(false)` when the attempts run out and the session must reopen.
    async fn resync(&mut self) -> Result<bool, SessionError> {
        let Some(password) = self.config.password.clone() else {
            // Plaintext sessions have no counters to sync.
            return Ok(true);
        };
        info!("sequence counters out of sync; resynchronising");

        for _ in 0..MAX_REFRESH_ATTEMPTS {
            if self.is_shutdown() {
                return Ok(true);
            }
            // The peer may have restarted with a new salt, so re-derive.
            let Some(salt) = self.fetch_salt().await? else {
                continue;
            };
            let channel = CipherChannel::new(
                derive_key(password.as_bytes(), &salt),
                self.config.frame_block,
            )?;

            let seq = self.guard.advance();
            let frame = channel.seal(seq, control::SEQ)?;
            self.transport.send(&frame).await?;

            let Some(reply) = self.transport.recv(self.config.recv_timeout).await? else {
                continue;
            };
            match channel.open(&reply) {
                Ok((peer_seq, msg))
                    if (msg == control::SEQ_ACK || msg == control::ACK)
                        && self.guard.permits(peer_seq) =>
                {
                    self.guard.finish_sync(peer_seq);
                    self.channel = Some(channel);
                    info!(peer_seq, "sequence counters resynchronised");
                    return Ok(true);
                }
                Ok((peer_seq, _)) => debug!(peer_seq, "unusable sync reply"),
                Err(e) => debug!(error = %e, "sync reply failed to open"),
            }
        }

        warn!("resynchronisation failed; reopening the session");
        self.channel = None;
        Ok(false)
    }

    // ── Closing ───────────────────────────────────────────────────────────────

    /// Tells the peer the session is over.  Best effort: no ack is expected
    /// and delivery failures are only logged.
    async fn send_close(&mut self) {
        let frame = match &self.channel {
            Some(channel) => {
                let seq = self.guard.advance();
                match channel.seal(seq, control::CLOSE) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(error = %e, "close frame could not be sealed");
                        return;
                    }
                }
            }
            None => control::CLOSE.to_vec(),
        };
        if let Err(e) = self.transport.send(&frame).await {
            debug!(error = %e, "close notification not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults_match_wire_expectations() {
        // Arrange / Act
        let config = SessionConfig::default();

        // Assert – plaintext, 32-byte frame block, 1-second clock
        assert!(config.password.is_none());
        assert_eq!(config.frame_block, DEFAULT_FRAME_BLOCK);
        assert_eq!(config.recv_timeout, Duration::from_secs(1));
        assert!(config.open_retry_limit.is_none());
    }
}
