//! OnStepX command vocabulary
//!
//! The command set is a fixed legacy protocol; strings here must match
//! the firmware byte for byte. Commands start with `:` and end with `#`;
//! replies are either `#`-terminated payloads, a single unterminated ack
//! digit, or nothing at all, depending on the command.

use crate::coords::{format_degrees_starred, format_ra_hours};
use crate::{GuideDirection, TelescopeAxis};

/// Reply terminator byte.
pub const TERMINATOR: u8 = b'#';

// Identity
pub const GET_PRODUCT: &str = ":GVP#";
pub const GET_FIRMWARE_VERSION: &str = ":GVN#";
pub const GET_FIRMWARE_DATE: &str = ":GVD#";
pub const GET_FIRMWARE_TIME: &str = ":GVT#";

// Position queries
pub const GET_RA: &str = ":GR#";
pub const GET_DEC: &str = ":GD#";
pub const GET_ALTITUDE: &str = ":GA#";
pub const GET_AZIMUTH: &str = ":GZ#";
pub const GET_SIDEREAL_TIME: &str = ":GS#";

// Tracking
pub const GET_TRACKING: &str = ":GT#";
pub const TRACKING_ON: &str = ":Te#";
pub const TRACKING_OFF: &str = ":Td#";
pub const RATE_SIDEREAL: &str = ":TQ#";
pub const RATE_LUNAR: &str = ":TL#";
pub const RATE_SOLAR: &str = ":TS#";
pub const RATE_KING: &str = ":TK#";

// Motion
pub const SLEW_EQUATORIAL: &str = ":MS#";
pub const SLEW_ALT_AZ: &str = ":MA#";
pub const STOP_ALL: &str = ":Q#";
pub const SYNC: &str = ":CM#";

// Status and pier side
pub const GET_PIER_SIDE: &str = ":Gm#";
pub const GET_STATUS: &str = ":GU#";

// Park and home
pub const GET_PARKED: &str = ":h?#";
pub const PARK: &str = ":hP#";
pub const UNPARK: &str = ":hR#";
pub const FIND_HOME: &str = ":hF#";
pub const SET_PARK_POSITION: &str = ":hQ#";

// Site and meridian configuration
pub const GET_SITE_LATITUDE: &str = ":Gt#";
pub const GET_SITE_LONGITUDE: &str = ":Gg#";
pub const GET_MERIDIAN_LIMIT: &str = ":Gh#";
pub const GET_MERIDIAN_EAST: &str = ":GXE0#";
pub const GET_MERIDIAN_WEST: &str = ":GXE1#";

/// Set target right ascension, `HH:MM:SS.ss`.
pub fn set_target_ra(ra_hours: f64) -> String {
    format!(":Sr{}#", format_ra_hours(ra_hours))
}

/// Set target declination, `sDD*MM*SS.ss`.
pub fn set_target_dec(dec_deg: f64) -> String {
    format!(":Sd{}#", format_degrees_starred(dec_deg))
}

/// Set target azimuth for an alt-az slew.
pub fn set_target_azimuth(az_deg: f64) -> String {
    format!(":Sz{}#", format_degrees_starred(az_deg))
}

/// Set target altitude for an alt-az slew.
pub fn set_target_altitude(alt_deg: f64) -> String {
    format!(":Sa{}#", format_degrees_starred(alt_deg))
}

/// Set site latitude.
pub fn set_site_latitude(latitude_deg: f64) -> String {
    format!(":St{}#", format_degrees_starred(latitude_deg))
}

/// Set site longitude.
pub fn set_site_longitude(longitude_deg: f64) -> String {
    format!(":Sg{}#", format_degrees_starred(longitude_deg))
}

/// Directional guide pulse, duration in milliseconds, zero-padded to
/// four digits.
pub fn pulse_guide(direction: GuideDirection, duration_ms: u32) -> String {
    format!(":Mg{}{:04}#", direction.command_letter(), duration_ms)
}

/// Variable axis rate in degrees/second (always the absolute value; the
/// sign is carried by the directional start command).
pub fn axis_rate(axis: TelescopeAxis, rate_deg_per_sec: f64) -> String {
    match axis {
        TelescopeAxis::Primary => format!(":RA{:.4}#", rate_deg_per_sec.abs()),
        TelescopeAxis::Secondary => format!(":RE{:.4}#", rate_deg_per_sec.abs()),
    }
}

/// Directional start command for an axis move. Positive rates run east
/// (primary) or north (secondary).
pub fn axis_start(axis: TelescopeAxis, positive: bool) -> &'static str {
    match (axis, positive) {
        (TelescopeAxis::Primary, true) => ":Me#",
        (TelescopeAxis::Primary, false) => ":Mw#",
        (TelescopeAxis::Secondary, true) => ":Mn#",
        (TelescopeAxis::Secondary, false) => ":Ms#",
    }
}

/// Both direction-stop commands for an axis.
pub fn axis_stops(axis: TelescopeAxis) -> [&'static str; 2] {
    match axis {
        TelescopeAxis::Primary => [":Qe#", ":Qw#"],
        TelescopeAxis::Secondary => [":Qn#", ":Qs#"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_commands() {
        assert_eq!(set_target_ra(10.5), ":Sr10:30:00.00#");
        assert_eq!(set_target_dec(20.0), ":Sd+20*00*00.00#");
        assert_eq!(set_target_dec(-5.25), ":Sd-05*15*00.00#");
        assert_eq!(set_target_azimuth(180.0), ":Sz+180*00*00.00#");
        assert_eq!(set_target_altitude(45.5), ":Sa+45*30*00.00#");
    }

    #[test]
    fn test_site_commands() {
        assert_eq!(set_site_latitude(40.0), ":St+40*00*00.00#");
        assert_eq!(set_site_longitude(-105.1), ":Sg-105*06*00.00#");
    }

    #[test]
    fn test_pulse_guide_padding() {
        assert_eq!(pulse_guide(GuideDirection::North, 500), ":Mgn0500#");
        assert_eq!(pulse_guide(GuideDirection::West, 50), ":Mgw0050#");
        assert_eq!(pulse_guide(GuideDirection::South, 9999), ":Mgs9999#");
    }

    #[test]
    fn test_axis_commands() {
        assert_eq!(axis_rate(TelescopeAxis::Primary, 0.35), ":RA0.3500#");
        assert_eq!(axis_rate(TelescopeAxis::Primary, -0.35), ":RA0.3500#");
        assert_eq!(axis_rate(TelescopeAxis::Secondary, 1.0), ":RE1.0000#");
        assert_eq!(axis_start(TelescopeAxis::Primary, true), ":Me#");
        assert_eq!(axis_start(TelescopeAxis::Primary, false), ":Mw#");
        assert_eq!(axis_start(TelescopeAxis::Secondary, true), ":Mn#");
        assert_eq!(axis_start(TelescopeAxis::Secondary, false), ":Ms#");
        assert_eq!(axis_stops(TelescopeAxis::Primary), [":Qe#", ":Qw#"]);
        assert_eq!(axis_stops(TelescopeAxis::Secondary), [":Qn#", ":Qs#"]);
    }
}
