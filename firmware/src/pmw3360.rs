//! PMW3360 optical sensor over SPI.
//!
//! Register access follows the datasheet timings. The SROM image is a
//! vendor blob and is not part of this crate; boards that ship one pass it
//! to [`Pmw3360::new`] and it is uploaded at power-up.

use defmt::{debug, error, info};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use reex::{Motion, MotionSensor, SensorError};

const REG_PRODUCT_ID: u8 = 0x00;
const REG_MOTION: u8 = 0x02;
const REG_DELTA_Y_H: u8 = 0x06;
const REG_SROM_ID: u8 = 0x2A;
const REG_CONFIG1: u8 = 0x0F;
const REG_CONFIG2: u8 = 0x10;
const REG_SROM_ENABLE: u8 = 0x13;
const REG_POWER_UP_RESET: u8 = 0x3A;
const REG_MOTION_BURST: u8 = 0x50;
const REG_SROM_LOAD_BURST: u8 = 0x62;

const PRODUCT_ID: u8 = 0x42;
const SPI_WRITE: u8 = 0x80;
const POWER_UP_RESET_VAL: u8 = 0x5A;
const SROM_INIT: u8 = 0x1D;
const SROM_START: u8 = 0x18;
const MOTION_MOT: u8 = 0x80;
const MOTION_LIFT: u8 = 0x08;

/// Highest CONFIG1 value: (0x77 + 1) * 100 = 12000 CPI.
pub const CPI_REGISTER_MAX: u8 = 0x77;

const BURST_MOTION: usize = 0;
const BURST_DELTA_X_L: usize = 2;
const BURST_DELTA_X_H: usize = 3;
const BURST_DELTA_Y_L: usize = 4;
const BURST_DELTA_Y_H: usize = 5;
const BURST_LEN: usize = 6;

// Datasheet timings
const T_NCS_SCLK_US: u64 = 1;
const T_SRAD_US: u64 = 160;
const T_SRAD_MOTBR_US: u64 = 35;
const T_SRX_US: u64 = 20;
const T_SCLK_NCS_WR_US: u64 = 35;
const T_SWX_US: u64 = 180;
const T_BEXIT_US: u64 = 1;
const T_SROM_BYTE_US: u64 = 15;
const RESET_DELAY_MS: u64 = 50;
const SROM_INIT_DELAY_MS: u64 = 10;

/// PMW3360 on its own SPI bus with a manually driven chip select.
pub struct Pmw3360<SPI: SpiBus, CS: OutputPin> {
    spi: SPI,
    cs: CS,
    srom: Option<&'static [u8]>,
    in_burst: bool,
}

impl<SPI: SpiBus, CS: OutputPin> Pmw3360<SPI, CS> {
    /// Create a new driver. Nothing is sent until [`Self::init`].
    #[must_use]
    pub fn new(spi: SPI, cs: CS, srom: Option<&'static [u8]>) -> Self {
        Self {
            spi,
            cs,
            srom,
            in_burst: false,
        }
    }

    /// Reset the sensor and check it answers. `NotDetected` means this half
    /// has no ball.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        let _ = self.cs.set_high();
        Timer::after(Duration::from_millis(1)).await;

        self.write_reg(REG_POWER_UP_RESET, POWER_UP_RESET_VAL).await?;
        Timer::after(Duration::from_millis(RESET_DELAY_MS)).await;

        let id = self.read_reg(REG_PRODUCT_ID).await?;
        if id != PRODUCT_ID {
            error!("PMW3360 not found, product id {:#04x}", id);
            return Err(SensorError::NotDetected);
        }

        // Clear stale motion.
        for reg in REG_MOTION..=REG_DELTA_Y_H {
            self.read_reg(reg).await?;
        }
        if let Some(srom) = self.srom {
            self.upload_srom(srom).await?;
        }
        // Rest modes on, absolute CPI.
        self.write_reg(REG_CONFIG2, 0x00).await?;

        info!("PMW3360 detected, product id {:#04x}", id);
        Ok(())
    }

    async fn upload_srom(&mut self, srom: &[u8]) -> Result<(), SensorError> {
        self.write_reg(REG_CONFIG2, 0x00).await?;
        self.write_reg(REG_SROM_ENABLE, SROM_INIT).await?;
        Timer::after(Duration::from_millis(SROM_INIT_DELAY_MS)).await;
        self.write_reg(REG_SROM_ENABLE, SROM_START).await?;

        let _ = self.cs.set_low();
        Timer::after(Duration::from_micros(T_NCS_SCLK_US)).await;
        self.spi
            .write(&[REG_SROM_LOAD_BURST | SPI_WRITE])
            .await
            .map_err(|_| SensorError::Io)?;
        Timer::after(Duration::from_micros(T_SROM_BYTE_US)).await;
        for &b in srom {
            self.spi.write(&[b]).await.map_err(|_| SensorError::Io)?;
            Timer::after(Duration::from_micros(T_SROM_BYTE_US)).await;
        }
        let _ = self.cs.set_high();
        Timer::after(Duration::from_micros(T_BEXIT_US)).await;

        let srom_id = self.read_reg(REG_SROM_ID).await?;
        debug!("PMW3360 SROM id {:#04x}", srom_id);
        Ok(())
    }

    async fn read_reg(&mut self, addr: u8) -> Result<u8, SensorError> {
        self.in_burst = false;
        let _ = self.cs.set_low();
        Timer::after(Duration::from_micros(T_NCS_SCLK_US)).await;

        self.spi
            .write(&[addr & !SPI_WRITE])
            .await
            .map_err(|_| SensorError::Io)?;
        Timer::after(Duration::from_micros(T_SRAD_US)).await;

        let mut value = [0u8];
        self.spi.read(&mut value).await.map_err(|_| SensorError::Io)?;

        let _ = self.cs.set_high();
        Timer::after(Duration::from_micros(T_SRX_US)).await;
        Ok(value[0])
    }

    async fn write_reg(&mut self, addr: u8, value: u8) -> Result<(), SensorError> {
        self.in_burst = false;
        let _ = self.cs.set_low();
        Timer::after(Duration::from_micros(T_NCS_SCLK_US)).await;

        self.spi
            .write(&[addr | SPI_WRITE, value])
            .await
            .map_err(|_| SensorError::Io)?;

        Timer::after(Duration::from_micros(T_SCLK_NCS_WR_US)).await;
        let _ = self.cs.set_high();
        Timer::after(Duration::from_micros(T_SWX_US)).await;
        Ok(())
    }

    async fn read_burst(&mut self, data: &mut [u8; BURST_LEN]) -> Result<(), SensorError> {
        if !self.in_burst {
            self.write_reg(REG_MOTION_BURST, 0x00).await?;
            self.in_burst = true;
        }
        let _ = self.cs.set_low();
        Timer::after(Duration::from_micros(T_NCS_SCLK_US)).await;

        self.spi
            .write(&[REG_MOTION_BURST])
            .await
            .map_err(|_| SensorError::Io)?;
        Timer::after(Duration::from_micros(T_SRAD_MOTBR_US)).await;
        self.spi.read(data).await.map_err(|_| SensorError::Io)?;

        let _ = self.cs.set_high();
        Timer::after(Duration::from_micros(T_BEXIT_US)).await;
        Ok(())
    }
}

impl<SPI: SpiBus, CS: OutputPin> MotionSensor for Pmw3360<SPI, CS> {
    async fn read_motion(&mut self) -> Result<Option<Motion>, SensorError> {
        let mut burst = [0u8; BURST_LEN];
        self.read_burst(&mut burst).await?;

        let status = burst[BURST_MOTION];
        if status & MOTION_MOT == 0 || status & MOTION_LIFT != 0 {
            return Ok(None);
        }
        let x = i16::from_le_bytes([burst[BURST_DELTA_X_L], burst[BURST_DELTA_X_H]]);
        let y = i16::from_le_bytes([burst[BURST_DELTA_Y_L], burst[BURST_DELTA_Y_H]]);
        if x == 0 && y == 0 {
            return Ok(None);
        }
        Ok(Some(Motion::new(x, y)))
    }

    async fn set_cpi(&mut self, register: u8) -> Result<(), SensorError> {
        self.write_reg(REG_CONFIG1, register.min(CPI_REGISTER_MAX)).await
    }
}
