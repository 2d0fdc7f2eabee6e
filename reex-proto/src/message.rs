//! Split transaction IDs and their payload codecs.
//!
//! | ID | Name         | Request         | Response                  |
//! |----|--------------|-----------------|---------------------------|
//! | 0  | `GET_INFO`   | empty           | 1 byte: ball count        |
//! | 1  | `GET_MOTION` | empty           | 4 bytes: x, y (`i16` LE)  |
//! | 2  | `SET_CPI`    | 1 byte: CPI     | none (fire-and-forget)    |

/// Transaction identifier carried in every split frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransactionId {
    GetInfo = 0,
    GetMotion = 1,
    SetCpi = 2,
}

impl TransactionId {
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TransactionId {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::GetInfo),
            1 => Ok(Self::GetMotion),
            2 => Ok(Self::SetCpi),
            _ => Err(DecodeError::UnknownTransaction),
        }
    }
}

/// Payload decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload shorter than the message requires.
    Truncated,
    /// Transaction ID not known to this build.
    UnknownTransaction,
}

/// `GET_INFO` response: what the responding half has attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BallInfo {
    /// Number of working trackballs; only 0 or 1 is produced today.
    pub ball_count: u8,
}

impl BallInfo {
    pub const SIZE: usize = 1;

    #[must_use]
    pub const fn new(have_ball: bool) -> Self {
        Self {
            ball_count: have_ball as u8,
        }
    }

    #[inline]
    #[must_use]
    pub const fn has_ball(&self) -> bool {
        self.ball_count > 0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [self.ball_count]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let ball_count = *data.first().ok_or(DecodeError::Truncated)?;
        Ok(Self { ball_count })
    }
}

/// `GET_MOTION` response: motion accumulated on the responder since the
/// previous pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionDelta {
    pub x: i16,
    pub y: i16,
}

impl MotionDelta {
    pub const SIZE: usize = 4;

    #[must_use]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let x = self.x.to_le_bytes();
        let y = self.y.to_le_bytes();
        [x[0], x[1], y[0], y[1]]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::SIZE {
            return Err(DecodeError::Truncated);
        }
        Ok(Self {
            x: i16::from_le_bytes([data[0], data[1]]),
            y: i16::from_le_bytes([data[2], data[3]]),
        })
    }
}

/// `SET_CPI` request: the primary's stored CPI value (0 = default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpiUpdate(pub u8);

impl CpiUpdate {
    pub const SIZE: usize = 1;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [self.0]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        data.first().copied().map(Self).ok_or(DecodeError::Truncated)
    }
}
