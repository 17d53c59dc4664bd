//! Pier-side prediction and target reachability
//!
//! German-equatorial mounts must flip to the opposite side of the pier
//! when tracking past the meridian, delayed by a device-configured
//! hour-angle margin in each direction. The controller reports its
//! current side when asked; prediction for a *future* slew is pure
//! hour-angle arithmetic against those margins.

use crate::coords::{altitude_deg, normalize_hour_angle};
use crate::PierSide;

/// Hour angle of a target: local sidereal time minus right ascension,
/// normalized to (-12h, +12h].
pub fn hour_angle(lst_hours: f64, ra_hours: f64) -> f64 {
    normalize_hour_angle(lst_hours - ra_hours)
}

/// Side implied by the hour-angle sign alone. Used as the fallback when
/// the device gives an ambiguous or missing pier reading.
pub fn side_from_hour_angle(ha_hours: f64) -> PierSide {
    if ha_hours < 0.0 {
        PierSide::East
    } else {
        PierSide::West
    }
}

/// Predicted pier side after slewing to `ra_hours`, applying the
/// device-reported meridian offsets. Past the west limit the mount
/// arrives pre-flipped so it can keep tracking.
pub fn destination_side(
    lst_hours: f64,
    ra_hours: f64,
    offset_east_h: f64,
    offset_west_h: f64,
) -> PierSide {
    let ha = hour_angle(lst_hours, ra_hours);
    if ha < 0.0 {
        if ha < -(12.0 + offset_east_h) {
            PierSide::West
        } else {
            PierSide::East
        }
    } else if ha > offset_west_h {
        PierSide::East
    } else {
        PierSide::West
    }
}

/// Outcome of comparing the current and predicted pier sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipForecast {
    pub will_flip: bool,
    pub from: PierSide,
    pub to: PierSide,
}

/// A flip is only forecast when both sides are known and differ.
pub fn flip_forecast(current: PierSide, destination: PierSide) -> FlipForecast {
    let will_flip =
        current != PierSide::Unknown && destination != PierSide::Unknown && current != destination;
    FlipForecast {
        will_flip,
        from: current,
        to: destination,
    }
}

/// Typed reachability verdict; callers branch on the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Reachability {
    Reachable,
    DeclinationOutOfRange { dec_deg: f64 },
    BelowHorizon { altitude_deg: f64 },
    BeyondMeridianLimits { hour_angle_h: f64 },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable)
    }
}

impl std::fmt::Display for Reachability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reachability::Reachable => write!(f, "reachable"),
            Reachability::DeclinationOutOfRange { dec_deg } => {
                write!(f, "Declination {:.1} deg out of range", dec_deg)
            }
            Reachability::BelowHorizon { altitude_deg } => {
                write!(f, "Target below horizon (alt={:.1} deg)", altitude_deg)
            }
            Reachability::BeyondMeridianLimits { hour_angle_h } => {
                write!(f, "Beyond meridian limits (HA={:.1}h)", hour_angle_h)
            }
        }
    }
}

/// Whether the mount can physically point at the target.
///
/// The altitude test runs only when both sidereal time and a site
/// latitude are known; the hour-angle test only when sidereal time is
/// known. Missing prerequisites skip a test rather than failing it.
pub fn reach_check(
    ra_hours: f64,
    dec_deg: f64,
    lst_hours: Option<f64>,
    latitude_deg: Option<f64>,
    offset_east_h: f64,
    offset_west_h: f64,
) -> Reachability {
    if !(-90.0..=90.0).contains(&dec_deg) {
        return Reachability::DeclinationOutOfRange { dec_deg };
    }

    if let (Some(lst), Some(lat)) = (lst_hours, latitude_deg) {
        let alt = altitude_deg(lst, ra_hours, dec_deg, lat);
        if alt < 0.0 {
            return Reachability::BelowHorizon { altitude_deg: alt };
        }
    }

    if let Some(lst) = lst_hours {
        let ha = hour_angle(lst, ra_hours);
        let max_ha_east = 12.0 + offset_east_h;
        if ha < -max_ha_east || ha > offset_west_h {
            return Reachability::BeyondMeridianLimits { hour_angle_h: ha };
        }
    }

    Reachability::Reachable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_from_hour_angle_sign() {
        assert_eq!(side_from_hour_angle(-0.001), PierSide::East);
        assert_eq!(side_from_hour_angle(0.0), PierSide::West);
        assert_eq!(side_from_hour_angle(5.0), PierSide::West);
    }

    #[test]
    fn test_destination_flips_at_meridian_and_west_offset() {
        let lst = 10.0;
        let west = 1.0;

        // East of the meridian (ha < 0): East side.
        assert_eq!(destination_side(lst, 10.5, 0.5, west), PierSide::East);
        // Just west of the meridian, inside the offset: West side.
        assert_eq!(destination_side(lst, 9.9, 0.5, west), PierSide::West);
        // Exactly at the offset: still West.
        assert_eq!(destination_side(lst, 9.0, 0.5, west), PierSide::West);
        // Beyond the offset: the mount arrives pre-flipped.
        assert_eq!(destination_side(lst, 8.9, 0.5, west), PierSide::East);
    }

    #[test]
    fn test_destination_flip_point_follows_configured_offset() {
        let lst = 10.0;
        // ha = 1.5h for ra = 8.5
        assert_eq!(destination_side(lst, 8.5, 0.0, 1.0), PierSide::East);
        assert_eq!(destination_side(lst, 8.5, 0.0, 2.0), PierSide::West);
    }

    #[test]
    fn test_destination_monotonic_between_flips() {
        let lst = 12.0;
        let west = 1.5;
        let mut last = destination_side(lst, 23.9, 0.0, west);
        let mut transitions = 0;
        // Sweep ra downward so the hour angle climbs from ~-11.9h to ~+11.9h.
        let mut ra = 23.9;
        while ra > 0.2 {
            let side = destination_side(lst, ra, 0.0, west);
            if side != last {
                transitions += 1;
                last = side;
            }
            ra -= 0.05;
        }
        // East -> West at the meridian, West -> East at the west offset.
        assert_eq!(transitions, 2);
    }

    #[test]
    fn test_flip_forecast_requires_both_sides_known() {
        assert!(flip_forecast(PierSide::East, PierSide::West).will_flip);
        assert!(!flip_forecast(PierSide::East, PierSide::East).will_flip);
        assert!(!flip_forecast(PierSide::Unknown, PierSide::West).will_flip);
        assert!(!flip_forecast(PierSide::East, PierSide::Unknown).will_flip);
    }

    #[test]
    fn test_reach_rejects_bad_declination() {
        let verdict = reach_check(10.0, 95.0, Some(10.0), Some(40.0), 0.0, 1.0);
        assert_eq!(
            verdict,
            Reachability::DeclinationOutOfRange { dec_deg: 95.0 }
        );
        assert!(!verdict.is_reachable());
    }

    #[test]
    fn test_reach_rejects_below_horizon() {
        // On the meridian at lat 40, dec -60 sits about 10 deg under.
        let verdict = reach_check(10.0, -60.0, Some(10.0), Some(40.0), 0.0, 1.0);
        assert!(matches!(verdict, Reachability::BelowHorizon { .. }));
    }

    #[test]
    fn test_reach_rejects_beyond_meridian_limits() {
        // No latitude, so only the hour-angle test applies: ha = 5h.
        let verdict = reach_check(5.0, 10.0, Some(10.0), None, 0.0, 1.0);
        assert!(matches!(
            verdict,
            Reachability::BeyondMeridianLimits { .. }
        ));
    }

    #[test]
    fn test_reach_without_sidereal_time_checks_declination_only() {
        assert!(reach_check(5.0, 10.0, None, None, 0.0, 1.0).is_reachable());
    }
}
