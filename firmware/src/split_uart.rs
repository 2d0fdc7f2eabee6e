//! Inter-half link over a full-duplex UART.
//!
//! Frames follow [`reex_proto::frame`]. The UART is split: a
//! [`SplitReceiver`] owns the RX half and runs in its own task, feeding
//! every complete frame into a [`FrameChannel`]. Its byte reads are never
//! cancelled, so bytes are not lost when a caller stops waiting for a frame.
//!
//! The primary half drives the link through [`SplitTransport`]; the
//! secondary half waits for requests with [`UartSplitLink::receive_request`]
//! and answers with [`UartSplitLink::respond`]. Waiting on the channel is
//! cancel-safe.
//!
//! # Pins
//!
//! Uses UART1:
//! - GPIO 8: TX
//! - GPIO 9: RX

use defmt::{debug, trace, warn};
use embassy_rp::uart::{Async, Error as UartError, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};
use reex::{SplitTransport, TransportError};
use reex_proto::{encode_frame, Frame, FrameKind, FrameParser, TransactionId, MAX_FRAME_SIZE};

/// Inter-half baud rate.
pub const SPLIT_BAUDRATE: u32 = 460_800;

/// How long the primary waits for a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2);

/// Frames received but not yet consumed.
pub type FrameChannel = Channel<CriticalSectionRawMutex, Frame, 4>;

#[inline]
fn uart_error_to_transport_error(e: UartError) -> TransportError {
    match e {
        UartError::Overrun | UartError::Break => TransportError::Busy,
        _ => TransportError::Io,
    }
}

/// RX half of the link. Run [`Self::run`] in a dedicated task.
pub struct SplitReceiver<'d> {
    rx: UartRx<'d, Async>,
    parser: FrameParser,
    frames: &'d FrameChannel,
}

impl<'d> SplitReceiver<'d> {
    /// Create a new receiver that publishes frames to `frames`.
    #[must_use]
    pub fn new(rx: UartRx<'d, Async>, frames: &'d FrameChannel) -> Self {
        Self {
            rx,
            parser: FrameParser::new(),
            frames,
        }
    }

    /// Read bytes until a whole frame arrives. Corrupt frames are dropped
    /// and the parser resyncs on the next sync byte.
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let mut byte = [0u8; 1];
        loop {
            self.rx
                .read(&mut byte)
                .await
                .map_err(uart_error_to_transport_error)?;

            match self.parser.push_byte(byte[0]) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    debug!("split frame dropped: {:?}", e);
                    self.parser.reset();
                }
            }
        }
    }

    /// Receive forever. A frame that finds the channel full is dropped.
    pub async fn run(&mut self) -> ! {
        loop {
            match self.read_frame().await {
                Ok(frame) => {
                    if self.frames.try_send(frame).is_err() {
                        warn!("split frame {} dropped, nobody reading", frame.id);
                    }
                }
                Err(e) => {
                    debug!("split link error: {:?}", e);
                    self.parser.reset();
                }
            }
        }
    }
}

/// TX half of the link plus the receiver's frame queue.
pub struct UartSplitLink<'d> {
    tx: UartTx<'d, Async>,
    frames: &'d FrameChannel,
    timeout: Duration,
}

impl<'d> UartSplitLink<'d> {
    /// Create a new link with the default response timeout.
    #[must_use]
    pub fn new(tx: UartTx<'d, Async>, frames: &'d FrameChannel) -> Self {
        Self::with_timeout(tx, frames, DEFAULT_TIMEOUT)
    }

    /// Create a new link that waits `timeout` for each response.
    #[must_use]
    pub fn with_timeout(tx: UartTx<'d, Async>, frames: &'d FrameChannel, timeout: Duration) -> Self {
        Self {
            tx,
            frames,
            timeout,
        }
    }

    async fn write_frame(
        &mut self,
        kind: FrameKind,
        id: u8,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = encode_frame(kind, id, payload, &mut buf)?;
        self.tx
            .write(&buf[..len])
            .await
            .map_err(uart_error_to_transport_error)
    }

    async fn read_response(&self, id: TransactionId) -> Frame {
        loop {
            let frame = self.frames.receive().await;
            if frame.kind == FrameKind::Response && frame.id == id.raw() {
                return frame;
            }
            trace!("stray frame {:?} while waiting for {:?}", frame.kind, id);
        }
    }

    /// Wait for the next request or notification from the primary.
    ///
    /// Unknown transaction IDs are skipped.
    pub async fn receive_request(&mut self) -> (TransactionId, Frame) {
        loop {
            let frame = self.frames.receive().await;
            if frame.kind == FrameKind::Response {
                continue;
            }
            match TransactionId::try_from(frame.id) {
                Ok(id) => return (id, frame),
                Err(_) => debug!("unknown transaction {}", frame.id),
            }
        }
    }

    /// Answer a request received with [`Self::receive_request`].
    pub async fn respond(
        &mut self,
        id: TransactionId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.write_frame(FrameKind::Response, id.raw(), payload).await
    }
}

impl SplitTransport for UartSplitLink<'_> {
    async fn exec(
        &mut self,
        id: TransactionId,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, TransportError> {
        // Late answers to earlier, timed-out requests.
        while let Ok(stale) = self.frames.try_receive() {
            trace!("discarding stale frame {}", stale.id);
        }
        self.write_frame(FrameKind::Request, id.raw(), request).await?;

        let frame = with_timeout(self.timeout, self.read_response(id))
            .await
            .map_err(|_| TransportError::Timeout)?;

        let payload = frame.payload();
        let out = response
            .get_mut(..payload.len())
            .ok_or(TransportError::Malformed)?;
        out.copy_from_slice(payload);
        Ok(payload.len())
    }

    async fn send(&mut self, id: TransactionId, request: &[u8]) -> Result<(), TransportError> {
        with_timeout(self.timeout, self.write_frame(FrameKind::Notify, id.raw(), request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
