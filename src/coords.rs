//! Sexagesimal coordinate codec and pointing math
//!
//! The wire protocol carries right ascension as `HH:MM:SS.ss` (hours) and
//! degree quantities (declination, altitude, azimuth, latitude) as
//! `sDD:MM:SS.ss`, with `*` substituted for `:` in some set commands.
//! Everything here is plain arithmetic; no device I/O.

use crate::state::EquatorialCoords;

/// One hour of right ascension, expressed in arcminutes.
const ARCMIN_PER_HOUR: f64 = 15.0 * 60.0;

/// Format decimal hours as `HH:MM:SS.ss`.
///
/// Decomposes via rounded centiseconds so values like 9.999999 h carry
/// into `10:00:00.00` instead of producing a 60.00 seconds field.
pub fn format_ra_hours(ra_hours: f64) -> String {
    let total_cs = (ra_hours.abs() * 3600.0 * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_s = total_cs / 100;
    let sec = total_s % 60;
    let total_m = total_s / 60;
    let min = total_m % 60;
    let hours = total_m / 60;
    format!("{:02}:{:02}:{:02}.{:02}", hours, min, sec, cs)
}

/// Format decimal degrees as `sDD:MM:SS.ss` with an explicit sign.
pub fn format_degrees(deg: f64) -> String {
    let sign = if deg < 0.0 { '-' } else { '+' };
    let total_cs = (deg.abs() * 3600.0 * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_s = total_cs / 100;
    let sec = total_s % 60;
    let total_m = total_s / 60;
    let min = total_m % 60;
    let whole = total_m / 60;
    format!("{}{:02}:{:02}:{:02}.{:02}", sign, whole, min, sec, cs)
}

/// Degree string for set commands, which expect `*` in place of `:`.
pub fn format_degrees_starred(deg: f64) -> String {
    format_degrees(deg).replace(':', "*")
}

/// Parse an `HH:MM:SS`-shaped string into decimal hours. Minutes and
/// seconds fields are optional.
pub fn parse_ra_hours(s: &str) -> Option<f64> {
    let mut parts = s.trim().split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = match parts.next() {
        Some(v) => v.trim().parse().ok()?,
        None => 0.0,
    };
    let seconds: f64 = match parts.next() {
        Some(v) => v.trim().parse().ok()?,
        None => 0.0,
    };
    Some(hours + minutes / 60.0 + seconds / 3600.0)
}

/// Parse an `sDD:MM:SS` or `sDD*MM:SS` string into decimal degrees.
pub fn parse_degrees(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace('*', ":");
    let (sign, rest) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let mut parts = rest.split(':');
    let degrees: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = match parts.next() {
        Some(v) => v.trim().parse().ok()?,
        None => 0.0,
    };
    let seconds: f64 = match parts.next() {
        Some(v) => v.trim().parse().ok()?,
        None => 0.0,
    };
    Some(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}

/// Normalize an hour angle to (-12h, +12h].
pub fn normalize_hour_angle(mut ha: f64) -> f64 {
    while ha > 12.0 {
        ha -= 24.0;
    }
    while ha <= -12.0 {
        ha += 24.0;
    }
    ha
}

/// Angular separation between two equatorial positions, in arcminutes.
///
/// The RA component folds across the 0h/24h seam: a separation wider
/// than 12 hours is really `24h - separation` the short way around.
pub fn separation_arcmin(a: EquatorialCoords, b: EquatorialCoords) -> f64 {
    let mut ra_diff = (a.ra_hours - b.ra_hours).abs() * ARCMIN_PER_HOUR;
    if ra_diff > 12.0 * ARCMIN_PER_HOUR {
        ra_diff = 24.0 * ARCMIN_PER_HOUR - ra_diff;
    }
    let dec_diff = (a.dec_deg - b.dec_deg).abs() * 60.0;
    (ra_diff * ra_diff + dec_diff * dec_diff).sqrt()
}

/// Altitude of a target above the horizon, in degrees, from the standard
/// spherical-triangle formula.
pub fn altitude_deg(lst_hours: f64, ra_hours: f64, dec_deg: f64, latitude_deg: f64) -> f64 {
    let ha_rad = ((lst_hours - ra_hours) * 15.0).to_radians();
    let dec_rad = dec_deg.to_radians();
    let lat_rad = latitude_deg.to_radians();
    let sin_alt = dec_rad.sin() * lat_rad.sin() + dec_rad.cos() * lat_rad.cos() * ha_rad.cos();
    sin_alt.asin().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Half an arcsecond, in the units being round-tripped.
    const RA_EPS_HOURS: f64 = 0.5 / 3600.0 / 15.0;
    const DEG_EPS: f64 = 0.5 / 3600.0;

    #[test]
    fn test_ra_round_trip() {
        for &h in &[0.0, 0.1, 5.5, 9.999999, 12.0, 17.754321, 23.999] {
            let formatted = format_ra_hours(h);
            let parsed = parse_ra_hours(&formatted).unwrap();
            assert!(
                (parsed - h).abs() < RA_EPS_HOURS,
                "ra {} -> {} -> {}",
                h,
                formatted,
                parsed
            );
        }
    }

    #[test]
    fn test_degrees_round_trip() {
        for &d in &[-90.0, -45.123456, -0.001, 0.0, 20.005, 89.999, 359.9] {
            let formatted = format_degrees(d);
            let parsed = parse_degrees(&formatted).unwrap();
            assert!(
                (parsed - d).abs() < DEG_EPS,
                "deg {} -> {} -> {}",
                d,
                formatted,
                parsed
            );
        }
    }

    #[test]
    fn test_format_carries_instead_of_printing_sixty() {
        // 59.9964 s would round to "60.00" under naive field formatting
        let formatted = format_ra_hours(9.999999);
        assert_eq!(formatted, "10:00:00.00");
    }

    #[test]
    fn test_parse_starred_degrees() {
        let parsed = parse_degrees("+40*30*00.00").unwrap();
        assert!((parsed - 40.5).abs() < DEG_EPS);
        let parsed = parse_degrees("-05*15:30").unwrap();
        assert!((parsed - (-5.258333)).abs() < 1e-4);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_ra_hours("bogus").is_none());
        assert!(parse_degrees("").is_none());
        assert!(parse_degrees("+4x:00:00").is_none());
    }

    #[test]
    fn test_separation_folds_ra_wrap() {
        let current = EquatorialCoords {
            ra_hours: 23.9,
            dec_deg: 0.0,
        };
        let target = EquatorialCoords {
            ra_hours: 0.1,
            dec_deg: 0.0,
        };
        let sep = separation_arcmin(current, target);
        // 0.2h the short way, not 23.8h the long way
        assert!((sep - 0.2 * ARCMIN_PER_HOUR).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_hour_angle() {
        assert!((normalize_hour_angle(13.0) - (-11.0)).abs() < 1e-9);
        assert!((normalize_hour_angle(-13.0) - 11.0).abs() < 1e-9);
        assert!((normalize_hour_angle(-12.0) - 12.0).abs() < 1e-9);
        assert!((normalize_hour_angle(5.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_altitude_on_meridian() {
        // On the meridian, altitude reduces to 90 - |lat - dec|.
        let alt = altitude_deg(10.0, 10.0, 20.0, 40.0);
        assert!((alt - 70.0).abs() < 1e-6);
        let alt = altitude_deg(10.0, 10.0, 40.0, 40.0);
        assert!((alt - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_altitude_below_horizon() {
        // Six hours from the meridian at the equator, a dec-0 target sits
        // right on the horizon; push further and it goes under.
        let alt = altitude_deg(18.1, 10.0, 0.0, 0.0);
        assert!(alt < 0.0);
    }
}
