//! Replay-rejecting sequence tracking for the authenticated channel.
//!
//! # Why sequence numbers? (for beginners)
//!
//! Every sealed message carries a monotonically increasing integer called a
//! *sequence number*, encrypted alongside the command.  Sequence numbers are
//! used to:
//!
//! - **Reject replays** – an attacker who records a valid encrypted frame and
//!   sends it again later presents a sequence number that is not greater than
//!   the last one accepted, so the copy is discarded.
//! - **Detect desynchronisation** – if one peer restarts or the counters
//!   drift apart, every incoming frame starts failing the ordering check.
//!   After enough consecutive failures the session performs an explicit
//!   sequence synchronisation instead of silently dropping traffic forever.
//!
//! # The wraparound escape
//!
//! The counter is bounded at [`MAX_SEQ`] (the largest value both peers can
//! represent).  A counter sitting at the maximum would otherwise deadlock:
//! no incoming value can be greater.  The guard therefore treats `0` as the
//! one acceptable successor of `MAX_SEQ`, and [`advance`](SequenceGuard::advance)
//! wraps its own counter the same way.

use tracing::debug;

use crate::protocol::commands::{MAX_BAD_RESPONSES, MAX_SEQ};

/// Tracks the last accepted sequence number and decides when the session
/// must resynchronise with its peer.
///
/// The guard is owned by a single session loop, so it uses plain fields and
/// `&mut self` rather than atomics.
///
/// # Examples
///
/// ```rust
/// use rmouse_core::protocol::sequence::SequenceGuard;
///
/// let mut guard = SequenceGuard::new();
/// assert!(guard.accept(1));
/// assert!(!guard.accept(1), "duplicates are rejected");
/// assert_eq!(guard.advance(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceGuard {
    /// The highest sequence number accepted (or sent) so far.
    last_accepted: u32,
    /// Consecutive incoming frames that failed decryption, ordering, or
    /// decoding.  Zeroed on every acceptance.
    bad_responses: u32,
    /// Set while a synchronisation round trip is in flight, so repeated
    /// failures during the round trip cannot start a second one.
    pending_sync: bool,
}

impl SequenceGuard {
    /// Creates a guard starting at sequence 0 with no failures recorded.
    pub fn new() -> Self {
        Self {
            last_accepted: 0,
            bad_responses: 0,
            pending_sync: false,
        }
    }

    /// Returns the last sequence number accepted or sent.
    pub fn current(&self) -> u32 {
        self.last_accepted
    }

    /// Checks an incoming sequence number against the ordering rule without
    /// recording anything.
    ///
    /// The rule is strictly-greater, with one escape hatch: when the counter
    /// sits at [`MAX_SEQ`], only an incoming `0` passes.  The session uses
    /// this before dispatching a command, then calls
    /// [`accept`](Self::accept) only once the command was actually handled.
    pub fn permits(&self, incoming: u32) -> bool {
        if self.last_accepted == MAX_SEQ {
            incoming == 0
        } else {
            incoming > self.last_accepted
        }
    }

    /// Checks an incoming sequence number and, if it passes, records it and
    /// clears the failure counter.
    pub fn accept(&mut self, incoming: u32) -> bool {
        let ok = self.permits(incoming);
        if ok {
            self.last_accepted = incoming;
            self.bad_responses = 0;
        } else {
            debug!(
                incoming,
                last_accepted = self.last_accepted,
                "rejected stale sequence number"
            );
        }
        ok
    }

    /// Returns the sequence number the next outgoing message should carry,
    /// without committing to it.
    pub fn next(&self) -> u32 {
        if self.last_accepted == MAX_SEQ {
            0
        } else {
            self.last_accepted + 1
        }
    }

    /// Commits to the next outgoing sequence number and returns it.
    ///
    /// Called once per authenticated send, before sealing, so the counter
    /// moves even if the datagram is then lost in transit.
    pub fn advance(&mut self) -> u32 {
        self.last_accepted = self.next();
        self.last_accepted
    }

    /// Records one failed incoming frame.
    ///
    /// Returns `true` exactly when the caller must start a synchronisation:
    /// the failure count has exceeded [`MAX_BAD_RESPONSES`] and no
    /// synchronisation is already in flight.  The in-flight flag is set on
    /// the firing call so at most one sync runs at a time.
    pub fn record_rejected(&mut self) -> bool {
        self.bad_responses += 1;
        if self.bad_responses > MAX_BAD_RESPONSES && !self.pending_sync {
            self.pending_sync = true;
            true
        } else {
            false
        }
    }

    /// Completes a synchronisation: adopts the peer's sequence number and
    /// clears the failure counter and the in-flight flag.
    pub fn finish_sync(&mut self, peer_seq: u32) {
        self.last_accepted = peer_seq;
        self.bad_responses = 0;
        self.pending_sync = false;
    }

    /// Returns the guard to its initial state, for use after a fresh key
    /// exchange restarts the counters on both sides.
    pub fn reset(&mut self) {
        self.last_accepted = 0;
        self.bad_responses = 0;
        self.pending_sync = false;
    }
}

impl Default for SequenceGuard {
    fn default() -> Self {
        Self::new()
    }
}
