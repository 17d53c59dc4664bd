//! OnStepX Mount Protocol Driver
//!
//! Drives an OnStepX telescope mount controller over its ASCII command
//! protocol, reachable through a raw TCP socket or a serial link. The
//! controller speaks synchronous, `#`-terminated request/response
//! exchanges and provides no asynchronous status channel, so high-level
//! mount state (slewing, pier side, guide activity) is reconstructed by
//! polling and inference rather than read from a busy flag.
//!
//! One [`MountDriver`] value owns exactly one physical link. Callers may
//! invoke driver methods concurrently; all device I/O is serialized
//! behind the command channel's lock.

mod channel;
mod coords;
mod driver;
mod error;
mod guide;
mod pier;
mod protocol;
mod simulator;
mod slew;
mod state;
mod transport;

pub use channel::*;
pub use coords::*;
pub use driver::*;
pub use error::*;
pub use guide::*;
pub use pier::*;
pub use protocol::*;
pub use simulator::*;
pub use slew::*;
pub use state::*;
pub use transport::*;

// ============================================================================
// Base tracking rate constants (degrees/second)
// ============================================================================

/// Sidereal rate: one revolution per sidereal day (86164.0905 s).
pub const SIDEREAL_RATE_DEG_S: f64 = 0.0041780746;

/// Solar rate: one revolution per solar day (86400 s).
pub const SOLAR_RATE_DEG_S: f64 = 0.0041666667;

/// Lunar rate: sidereal minus the Moon's ~13.2 deg/day eastward motion.
pub const LUNAR_RATE_DEG_S: f64 = 0.0040266670;

/// King rate: ~1.00274x sidereal, for objects near the celestial pole.
pub const KING_RATE_DEG_S: f64 = 0.0041895210;

/// Pier side enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PierSide {
    East = 0,
    West = 1,
    Unknown = -1,
}

impl From<i32> for PierSide {
    fn from(value: i32) -> Self {
        match value {
            0 => PierSide::East,
            1 => PierSide::West,
            _ => PierSide::Unknown,
        }
    }
}

impl std::fmt::Display for PierSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PierSide::East => write!(f, "East"),
            PierSide::West => write!(f, "West"),
            PierSide::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Tracking rate enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveRate {
    Sidereal = 0,
    Lunar = 1,
    Solar = 2,
    King = 3,
}

impl DriveRate {
    /// Base rate in degrees/second.
    pub fn deg_per_sec(&self) -> f64 {
        match self {
            DriveRate::Sidereal => SIDEREAL_RATE_DEG_S,
            DriveRate::Lunar => LUNAR_RATE_DEG_S,
            DriveRate::Solar => SOLAR_RATE_DEG_S,
            DriveRate::King => KING_RATE_DEG_S,
        }
    }
}

impl From<i32> for DriveRate {
    fn from(value: i32) -> Self {
        match value {
            1 => DriveRate::Lunar,
            2 => DriveRate::Solar,
            3 => DriveRate::King,
            _ => DriveRate::Sidereal,
        }
    }
}

impl std::fmt::Display for DriveRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveRate::Sidereal => write!(f, "Sidereal"),
            DriveRate::Lunar => write!(f, "Lunar"),
            DriveRate::Solar => write!(f, "Solar"),
            DriveRate::King => write!(f, "King"),
        }
    }
}

/// Guide pulse direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideDirection {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl GuideDirection {
    /// Direction letter used in the `:Mg..#` command family.
    pub fn command_letter(&self) -> char {
        match self {
            GuideDirection::North => 'n',
            GuideDirection::South => 's',
            GuideDirection::East => 'e',
            GuideDirection::West => 'w',
        }
    }
}

impl From<i32> for GuideDirection {
    fn from(value: i32) -> Self {
        match value {
            1 => GuideDirection::South,
            2 => GuideDirection::East,
            3 => GuideDirection::West,
            _ => GuideDirection::North,
        }
    }
}

impl std::fmt::Display for GuideDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuideDirection::North => write!(f, "North"),
            GuideDirection::South => write!(f, "South"),
            GuideDirection::East => write!(f, "East"),
            GuideDirection::West => write!(f, "West"),
        }
    }
}

/// Mount axis for variable-rate motion. The protocol addresses only the
/// two motion axes; there is no tertiary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelescopeAxis {
    Primary = 0,
    Secondary = 1,
}

impl std::fmt::Display for TelescopeAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelescopeAxis::Primary => write!(f, "Primary"),
            TelescopeAxis::Secondary => write!(f, "Secondary"),
        }
    }
}
