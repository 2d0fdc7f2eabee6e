use reex_proto::{DecodeError, FrameError, TransactionId};

/// Error type for inter-half transactions.
///
/// None of these are fatal: callers treat any failure as "no data this
/// tick" and try again on the next eligible tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Peer did not answer in time.
    Timeout,
    /// Serial I/O error.
    Io,
    /// Reply arrived but could not be decoded.
    Malformed,
    /// Link is in use by another exchange.
    Busy,
}

impl From<FrameError> for TransportError {
    fn from(_: FrameError) -> Self {
        Self::Malformed
    }
}

impl From<DecodeError> for TransportError {
    fn from(_: DecodeError) -> Self {
        Self::Malformed
    }
}

/// Async request/response link to the other half.
///
/// Implementations must bound every call (for example with a timeout) so a
/// missing peer never stalls the polling loop.
pub trait SplitTransport {
    /// Send a request and wait for the matching response.
    ///
    /// On success returns the number of bytes written into `response`.
    fn exec(
        &mut self,
        id: TransactionId,
        request: &[u8],
        response: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, TransportError>>;

    /// Send a one-way message. Success means it left this half, not that
    /// the peer applied it.
    fn send(
        &mut self,
        id: TransactionId,
        request: &[u8],
    ) -> impl core::future::Future<Output = Result<(), TransportError>>;
}
