use std::fmt;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty notification payload")]
    Empty,

    #[error("truncated notification payload (expected {expected} bytes, got {actual})")]
    Truncated { expected: usize, actual: usize },
}

/* Heart Rate Measurement flags:
     bit 0    - heart rate takes 2 bytes instead of 1
     bits 1-2 - sensor contact, 0b10 = not detected, 0b11 = detected
     bit 3    - energy expended field present
     bit 4    - one or more rr-interval fields follow
*/
mod flags {
    pub const WIDE_FORMAT:     u8 = 1 << 0;
    pub const ENERGY_EXPENDED: u8 = 1 << 3;
    pub const RR_INTERVALS:    u8 = 1 << 4;

    pub const CONTACT_SHIFT: u8 = 1;
    pub const CONTACT_MASK:  u8 = 0b11;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorContact {
    Unsupported,
    NotDetected,
    Detected,
}

impl SensorContact {
    fn from_flags(b: u8) -> Self {
        match (b >> flags::CONTACT_SHIFT) & flags::CONTACT_MASK {
            0b10 => SensorContact::NotDetected,
            0b11 => SensorContact::Detected,
            _    => SensorContact::Unsupported,
        }
    }
}

/// One decoded Heart Rate Measurement notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub wide_format:     bool,
    pub contact:         SensorContact,
    pub bpm:             u16,
    pub energy_expended: Option<u16>,
    pub rr_present:      bool,
    /// 1/1024 second units, in payload order.
    pub rr_intervals:    Vec<u16>,
}

impl TryFrom<&[u8]> for Measurement {
    type Error = DecodeError;

    fn try_from(b: &[u8]) -> Result<Self, Self::Error> {
        let Some(&flag_bits) = b.first() else {
            return Err(DecodeError::Empty);
        };

        let wide_format    = flag_bits & flags::WIDE_FORMAT != 0;
        let energy_present = flag_bits & flags::ENERGY_EXPENDED != 0;
        let rr_present     = flag_bits & flags::RR_INTERVALS != 0;

        let fixed = 1 + if wide_format { 2 } else { 1 } + if energy_present { 2 } else { 0 };
        if b.len() < fixed {
            return Err(DecodeError::Truncated { expected: fixed, actual: b.len() });
        }

        // Every rr-interval is a full 2 bytes, a half value means a cut payload.
        let tail = b.len() - fixed;
        if rr_present && tail % 2 != 0 {
            return Err(DecodeError::Truncated { expected: b.len() + 1, actual: b.len() });
        }

        let truncated = |expected| DecodeError::Truncated { expected, actual: b.len() };

        let mut r = Cursor::new(&b[1..]);

        let bpm = if wide_format {
            r.read_u16::<LittleEndian>().map_err(|_| truncated(fixed))?
        } else {
            u16::from(r.read_u8().map_err(|_| truncated(fixed))?)
        };

        let energy_expended = if energy_present {
            Some(r.read_u16::<LittleEndian>().map_err(|_| truncated(fixed))?)
        } else {
            None
        };

        let mut rr_intervals = Vec::new();

        if rr_present {
            for _ in 0..tail / 2 {
                rr_intervals.push(r.read_u16::<LittleEndian>().map_err(|_| truncated(b.len() + 1))?);
            }
        }

        Ok(Measurement {
            wide_format,
            contact: SensorContact::from_flags(flag_bits),
            bpm,
            energy_expended,
            rr_present,
            rr_intervals,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.bpm)?;

        if self.contact == SensorContact::NotDetected {
            write!(f, " (no contact)")?;
        }

        if let Some(energy) = self.energy_expended {
            write!(f, ", {energy} kJ")?;
        }

        if !self.rr_intervals.is_empty() {
            write!(f, ", rr {:?}", self.rr_intervals)?;
        }

        Ok(())
    }
}
