//! # Compute/Display Handoff
//!
//! Strict alternation between the two loops, built from two single-slot
//! channels instead of flags and condition variables:
//!
//! ```text
//!            to_compute (cap 1)               to_display (cap 1)
//!   Display ───────── token ─────────> Compute ───────── token ─────────> Display
//!           "display_complete"                 "computation_complete"
//! ```
//!
//! - Holding the token means "my turn". Receiving it is the claim; sending
//!   it to the peer is the release.
//! - Initial state: one token in `to_compute` (compute runs first).
//! - Shutdown drops the only sender of a third channel. Every blocked
//!   `claim` wakes at once (broadcast), so a peer is never left waiting.
//!
//! A token sitting in a channel cannot be missed the way a notify on a
//! condition variable can.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// One of the two loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The producer: runs the pipeline and swaps.
    Compute,
    /// The consumer: reads the published generation.
    Display,
}

impl Side {
    /// The other loop.
    #[inline]
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Compute => Self::Display,
            Self::Display => Self::Compute,
        }
    }
}

/// Outcome of waiting for a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Turn {
    /// The caller is now the only active loop.
    Granted,
    /// Shutdown was signalled; the caller must exit.
    Shutdown,
}

/// Snapshot of the two handoff flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoffFlags {
    /// A cycle is published and the display loop may proceed.
    pub computation_complete: bool,
    /// The last frame is presented and the compute loop may proceed.
    pub display_complete: bool,
}

struct Slot {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }
}

/// Two-party rendezvous enforcing strict alternation.
pub struct Handoff {
    /// Token present = `display_complete`.
    to_compute: Slot,
    /// Token present = `computation_complete`.
    to_display: Slot,
    /// Dropped on shutdown to disconnect `shutdown_rx`.
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    stopped: AtomicBool,
}

impl Handoff {
    /// Creates a handoff in its initial state: compute may run, display waits.
    #[must_use]
    pub fn new() -> Self {
        let to_compute = Slot::new();
        let seeded = to_compute.tx.try_send(()).is_ok();
        debug_assert!(seeded, "fresh single-slot channel must accept one token");

        let (shutdown_tx, shutdown_rx) = bounded(0);

        Self {
            to_compute,
            to_display: Slot::new(),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            stopped: AtomicBool::new(false),
        }
    }

    fn slot(&self, side: Side) -> &Slot {
        match side {
            Side::Compute => &self.to_compute,
            Side::Display => &self.to_display,
        }
    }

    /// Blocks until it is `side`'s turn or shutdown is signalled.
    ///
    /// A granted turn clears the flag that allowed it.
    pub fn claim(&self, side: Side) -> Turn {
        if self.is_shutdown() {
            return Turn::Shutdown;
        }

        let rx = &self.slot(side).rx;
        select! {
            recv(rx) -> token => match token {
                Ok(()) if !self.is_shutdown() => Turn::Granted,
                _ => Turn::Shutdown,
            },
            recv(self.shutdown_rx) -> _ => Turn::Shutdown,
        }
    }

    /// Ends `side`'s turn and wakes the peer.
    pub fn release(&self, side: Side) {
        match self.slot(side.peer()).tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::warn!(?side, "handoff released twice without a claim");
            }
            Err(TrySendError::Disconnected(())) => {}
        }
    }

    /// Signals shutdown and wakes every waiter. Idempotent.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            tracing::debug!("handoff shutdown broadcast");
        }
        drop(self.shutdown_tx.lock().take());
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Current flag values.
    #[must_use]
    pub fn flags(&self) -> HandoffFlags {
        HandoffFlags {
            computation_complete: !self.to_display.rx.is_empty(),
            display_complete: !self.to_compute.rx.is_empty(),
        }
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals shutdown when dropped, including during unwinding.
pub(crate) struct ShutdownOnDrop<'a>(pub(crate) &'a Handoff);

impl Drop for ShutdownOnDrop<'_> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::thread;

    #[test]
    fn test_initial_flags() {
        let handoff = Handoff::new();
        assert_eq!(
            handoff.flags(),
            HandoffFlags {
                computation_complete: false,
                display_complete: true,
            }
        );
    }

    #[test]
    fn test_claim_release_cycle() {
        let handoff = Handoff::new();

        assert_eq!(handoff.claim(Side::Compute), Turn::Granted);
        assert!(!handoff.flags().display_complete);

        handoff.release(Side::Compute);
        assert!(handoff.flags().computation_complete);

        assert_eq!(handoff.claim(Side::Display), Turn::Granted);
        handoff.release(Side::Display);
        assert_eq!(
            handoff.flags(),
            HandoffFlags {
                computation_complete: false,
                display_complete: true,
            }
        );
    }

    #[test]
    fn test_shutdown_wakes_blocked_claim() {
        let handoff = Handoff::new();

        thread::scope(|s| {
            let waiter = s.spawn(|| handoff.claim(Side::Display));
            thread::sleep(std::time::Duration::from_millis(10));
            handoff.shutdown();
            assert_eq!(waiter.join().unwrap(), Turn::Shutdown);
        });
    }

    #[test]
    fn test_shutdown_is_sticky() {
        let handoff = Handoff::new();
        handoff.shutdown();
        handoff.shutdown();
        // The compute token is still queued, but shutdown wins.
        assert_eq!(handoff.claim(Side::Compute), Turn::Shutdown);
        assert_eq!(handoff.claim(Side::Display), Turn::Shutdown);
    }

    #[test]
    fn test_strict_alternation() {
        const ROUNDS: usize = 500;
        let handoff = Handoff::new();
        let log = PlMutex::new(Vec::with_capacity(ROUNDS * 2));

        thread::scope(|s| {
            for side in [Side::Compute, Side::Display] {
                let handoff = &handoff;
                let log = &log;
                s.spawn(move || {
                    for _ in 0..ROUNDS {
                        assert_eq!(handoff.claim(side), Turn::Granted);
                        log.lock().push(side);
                        handoff.release(side);
                    }
                });
            }
        });

        let log = log.into_inner();
        assert_eq!(log.len(), ROUNDS * 2);
        for (i, side) in log.iter().enumerate() {
            let expected = if i % 2 == 0 { Side::Compute } else { Side::Display };
            assert_eq!(*side, expected, "out of turn at step {i}");
        }
    }
}
