//! One-time `GET_INFO` handshake run by the primary half.

/// Handshake progress on the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NegotiationState {
    NotStarted,
    AwaitingPeer,
    /// Terminal. Peer ball presence is now authoritative.
    Negotiated,
}

/// Retry bookkeeping for the handshake.
#[derive(Debug, Clone)]
pub struct Negotiation {
    state: NegotiationState,
    attempts: u8,
    last_attempt: u32,
    interval_ms: u32,
    max_attempts: u8,
}

impl Negotiation {
    /// Create a new handshake that retries every `interval_ms`.
    #[must_use]
    pub const fn new(interval_ms: u32, max_attempts: u8) -> Self {
        Self {
            state: NegotiationState::NotStarted,
            attempts: 0,
            last_attempt: 0,
            interval_ms,
            max_attempts,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> NegotiationState {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn is_negotiated(&self) -> bool {
        matches!(self.state, NegotiationState::Negotiated)
    }

    #[inline]
    #[must_use]
    pub const fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Whether a `GET_INFO` should go out at `now`.
    #[must_use]
    pub fn is_due(&self, now: u32) -> bool {
        !self.is_negotiated() && now.wrapping_sub(self.last_attempt) >= self.interval_ms
    }

    /// Record that an attempt is being made at `now`; returns its number.
    pub fn begin_attempt(&mut self, now: u32) -> u8 {
        self.last_attempt = now;
        self.attempts = self.attempts.saturating_add(1);
        self.state = NegotiationState::AwaitingPeer;
        self.attempts
    }

    /// Settle the current attempt.
    ///
    /// `reply` is the peer's ball presence, or `None` if it did not answer.
    /// Returns `Some(that_have_ball)` when the handshake is now complete. A
    /// silent peer after the last attempt completes it with no ball.
    pub fn finish_attempt(&mut self, reply: Option<bool>) -> Option<bool> {
        let that_have_ball = match reply {
            Some(has_ball) => has_ball,
            None if self.attempts < self.max_attempts => return None,
            None => false,
        };
        self.state = NegotiationState::Negotiated;
        Some(that_have_ball)
    }
}

/// Two-bit trackball layout mask for the VIA layout options.
///
/// Bit 1 marks a ball on the left half, bit 0 on the right half.
#[must_use]
pub const fn layout_mask(this_have_ball: bool, that_have_ball: bool, is_left: bool) -> u32 {
    let this = if this_have_ball {
        if is_left {
            0b10
        } else {
            0b01
        }
    } else {
        0
    };
    let that = if that_have_ball {
        if is_left {
            0b01
        } else {
            0b10
        }
    } else {
        0
    };
    this | that
}

/// New layout options with `mask` in the low bits, or `None` if unchanged.
#[must_use]
pub const fn merge_layout(current: u32, mask: u32) -> Option<u32> {
    let next = (current & !0b11) | mask;
    if next == current {
        None
    } else {
        Some(next)
    }
}
