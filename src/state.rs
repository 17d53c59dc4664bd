//! Canonical in-memory mount state
//!
//! The aggregate is a snapshot, not a mirror: position is always
//! re-fetched from the device on read, while target, site, and meridian
//! limits are cached here. Cached site and meridian values survive a
//! disconnect until the next connect handshake overwrites them.

use crate::guide::GuidePulse;
use crate::slew::SlewSession;
use crate::DriveRate;
use serde::Serialize;

/// An RA/Dec pair: RA in decimal hours, Dec in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquatorialCoords {
    pub ra_hours: f64,
    pub dec_deg: f64,
}

/// Full pointing snapshot as last pulled from the device.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Position {
    pub ra_hours: f64,
    pub dec_deg: f64,
    pub alt_deg: f64,
    pub az_deg: f64,
    pub lst_hours: f64,
}

/// Observing site, degrees and meters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SiteInfo {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
}

/// Controller identity, from the firmware version queries.
#[derive(Debug, Clone, Serialize)]
pub struct MountInfo {
    pub product: String,
    pub firmware_version: String,
    pub firmware_date: String,
    pub firmware_time: String,
}

/// Driver-side mount state. One value per physical link; guarded by a
/// single lock in the driver and never shared across driver instances.
#[derive(Debug)]
pub struct MountState {
    pub connected: bool,
    pub connecting: bool,
    /// Client-set aim point, independent of the current position. A slew
    /// does not mutate the target retroactively.
    pub target: EquatorialCoords,
    pub tracking_rate: DriveRate,
    pub site: SiteInfo,
    /// Device-reported hours past the meridian before a flip is forced,
    /// per direction.
    pub meridian_offset_east_h: f64,
    pub meridian_offset_west_h: f64,
    pub supports_king_rate: bool,
    pub max_axis_rate_deg_s: f64,
    /// Present only while a slew is being tracked.
    pub slew: Option<SlewSession>,
    /// Present only while a pulse guide is active.
    pub guide: Option<GuidePulse>,
}

impl Default for MountState {
    fn default() -> Self {
        Self {
            connected: false,
            connecting: false,
            target: EquatorialCoords {
                ra_hours: 0.0,
                dec_deg: 0.0,
            },
            tracking_rate: DriveRate::Sidereal,
            site: SiteInfo::default(),
            meridian_offset_east_h: 0.0,
            meridian_offset_west_h: 0.0,
            supports_king_rate: false,
            max_axis_rate_deg_s: 2.0,
            slew: None,
            guide: None,
        }
    }
}
