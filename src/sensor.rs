use crate::motion::Motion;

/// Error type for optical sensor access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// SPI transfer failed.
    Io,
    /// Product ID did not match at power-up.
    NotDetected,
}

/// Async optical sensor interface.
pub trait MotionSensor {
    /// Read motion since the previous read. `Ok(None)` means no movement.
    fn read_motion(
        &mut self,
    ) -> impl core::future::Future<Output = Result<Option<Motion>, SensorError>>;

    /// Program the sensor's CPI register (resolution step, not CPI).
    fn set_cpi(&mut self, register: u8)
        -> impl core::future::Future<Output = Result<(), SensorError>>;
}
