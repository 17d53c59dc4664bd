//! Mount driver facade
//!
//! One [`MountDriver`] value per physical mount. The control plane calls
//! these methods concurrently; every device-facing call funnels through
//! the command channel, which serializes the half-duplex link. Position
//! is always re-fetched from the device; target, site, and meridian
//! limits are cached in [`MountState`].

use crate::channel::{CommandChannel, GotoAck, DEFAULT_COMMAND_TIMEOUT};
use crate::coords::{parse_degrees, parse_ra_hours};
use crate::error::MountError;
use crate::guide::{GuidePulse, GuidePulseInfo};
use crate::pier::{
    destination_side, flip_forecast, reach_check, side_from_hour_angle, FlipForecast, Reachability,
};
use crate::protocol as proto;
use crate::slew::{SlewPhase, SlewPoll, SlewSession, SlewTuning};
use crate::state::{EquatorialCoords, MountInfo, MountState, Position, SiteInfo};
use crate::transport::{ConnectionConfig, MountLink};
use crate::{DriveRate, GuideDirection, PierSide, TelescopeAxis};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

fn default_command_timeout_ms() -> u64 {
    2_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_max_axis_rate() -> f64 {
    2.0
}

/// Everything needed to construct a driver for one mount.
#[derive(Debug, Clone, Deserialize)]
pub struct MountConfig {
    pub connection: ConnectionConfig,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_axis_rate")]
    pub max_axis_rate_deg_s: f64,
    #[serde(default)]
    pub slew: SlewTuning,
}

/// Aggregate status snapshot, one device round trip per field group.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MountStatus {
    pub connected: bool,
    pub position: Position,
    pub slewing: bool,
    pub tracking: bool,
    pub pier_side: String,
    pub at_park: bool,
    pub pulse_guiding: bool,
}

/// Driver for one OnStepX mount.
pub struct MountDriver {
    connection: Option<ConnectionConfig>,
    connect_timeout: Duration,
    channel: CommandChannel,
    tuning: SlewTuning,
    state: Mutex<MountState>,
}

impl MountDriver {
    pub fn new(config: MountConfig) -> Self {
        let state = MountState {
            max_axis_rate_deg_s: config.max_axis_rate_deg_s,
            ..MountState::default()
        };
        Self {
            connection: Some(config.connection),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            channel: CommandChannel::new(Duration::from_millis(config.command_timeout_ms)),
            tuning: config.slew,
            state: Mutex::new(state),
        }
    }

    /// Driver with no preconfigured endpoint; pair with
    /// [`MountDriver::connect_with_link`] (simulated transports, tests).
    pub fn with_tuning(tuning: SlewTuning) -> Self {
        Self {
            connection: None,
            connect_timeout: Duration::from_millis(default_connect_timeout_ms()),
            channel: CommandChannel::new(DEFAULT_COMMAND_TIMEOUT),
            tuning,
            state: Mutex::new(MountState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state().connecting
    }

    /// Open the configured link and run the handshake.
    pub async fn connect(&self) -> Result<(), MountError> {
        let connection = self.connection.clone().ok_or(MountError::LinkUnavailable {
            target: "<none>".into(),
            reason: "no connection configured".into(),
        })?;
        self.state().connecting = true;
        let result = async {
            let link = connection.open(self.connect_timeout).await?;
            self.channel.attach(link).await;
            self.handshake(&connection.target()).await
        }
        .await;
        self.finish_connect(result).await
    }

    /// Attach a caller-supplied link (e.g. a [`crate::SimulatedMount`])
    /// and run the same handshake as [`MountDriver::connect`].
    pub async fn connect_with_link(&self, link: Box<dyn MountLink>) -> Result<(), MountError> {
        let target = link.describe();
        self.state().connecting = true;
        self.channel.attach(link).await;
        let result = self.handshake(&target).await;
        self.finish_connect(result).await
    }

    async fn finish_connect(&self, result: Result<(), MountError>) -> Result<(), MountError> {
        match result {
            Ok(()) => {
                let mut st = self.state();
                st.connected = true;
                st.connecting = false;
                Ok(())
            }
            Err(e) => {
                self.channel.detach().await;
                let mut st = self.state();
                st.connected = false;
                st.connecting = false;
                Err(e)
            }
        }
    }

    /// Identity probe, then best-effort refresh of site and meridian
    /// settings. Only the probe is fatal.
    async fn handshake(&self, target: &str) -> Result<(), MountError> {
        let product = self.channel.exchange(proto::GET_PRODUCT).await.map_err(|e| {
            MountError::LinkUnavailable {
                target: target.to_string(),
                reason: format!("identity probe failed: {}", e),
            }
        })?;
        if product.is_empty() {
            return Err(MountError::LinkUnavailable {
                target: target.to_string(),
                reason: "empty reply to identity probe".into(),
            });
        }
        info!(product = %product, target, "mount connected");

        if let Err(e) = self.refresh_site().await {
            warn!(error = %e, "could not read site info");
        }
        if let Err(e) = self.refresh_meridian_limits().await {
            warn!(error = %e, "could not read meridian settings");
        }
        Ok(())
    }

    /// Tear the link down. Cached site and meridian values persist until
    /// the next connect overwrites them.
    pub async fn disconnect(&self) {
        self.channel.detach().await;
        let mut st = self.state();
        st.connected = false;
        st.connecting = false;
        st.slew = None;
        st.guide = None;
        info!("mount disconnected");
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub async fn mount_info(&self) -> Result<MountInfo, MountError> {
        Ok(MountInfo {
            product: self.channel.exchange(proto::GET_PRODUCT).await?,
            firmware_version: self.channel.exchange(proto::GET_FIRMWARE_VERSION).await?,
            firmware_date: self.channel.exchange(proto::GET_FIRMWARE_DATE).await?,
            firmware_time: self.channel.exchange(proto::GET_FIRMWARE_TIME).await?,
        })
    }

    // ========================================================================
    // Position
    // ========================================================================

    pub async fn right_ascension(&self) -> Result<f64, MountError> {
        let reply = self.channel.exchange(proto::GET_RA).await?;
        parse_ra_hours(&reply).ok_or_else(|| MountError::malformed(proto::GET_RA, reply))
    }

    pub async fn declination(&self) -> Result<f64, MountError> {
        let reply = self.channel.exchange(proto::GET_DEC).await?;
        parse_degrees(&reply).ok_or_else(|| MountError::malformed(proto::GET_DEC, reply))
    }

    pub async fn altitude(&self) -> Result<f64, MountError> {
        let reply = self.channel.exchange(proto::GET_ALTITUDE).await?;
        parse_degrees(&reply).ok_or_else(|| MountError::malformed(proto::GET_ALTITUDE, reply))
    }

    pub async fn azimuth(&self) -> Result<f64, MountError> {
        let reply = self.channel.exchange(proto::GET_AZIMUTH).await?;
        parse_degrees(&reply).ok_or_else(|| MountError::malformed(proto::GET_AZIMUTH, reply))
    }

    pub async fn sidereal_time(&self) -> Result<f64, MountError> {
        let reply = self.channel.exchange(proto::GET_SIDEREAL_TIME).await?;
        parse_ra_hours(&reply).ok_or_else(|| MountError::malformed(proto::GET_SIDEREAL_TIME, reply))
    }

    /// Full pointing snapshot; five round trips.
    pub async fn position(&self) -> Result<Position, MountError> {
        Ok(Position {
            ra_hours: self.right_ascension().await?,
            dec_deg: self.declination().await?,
            alt_deg: self.altitude().await?,
            az_deg: self.azimuth().await?,
            lst_hours: self.sidereal_time().await?,
        })
    }

    // ========================================================================
    // Target
    // ========================================================================

    pub fn target(&self) -> EquatorialCoords {
        self.state().target
    }

    /// Write the aim point to the device and cache it. Independent of a
    /// slew: setting a target does not move the mount.
    pub async fn set_target(&self, ra_hours: f64, dec_deg: f64) -> Result<(), MountError> {
        if !(0.0..24.0).contains(&ra_hours) {
            return Err(MountError::OutOfRange {
                param: "ra_hours",
                value: ra_hours,
                min: 0.0,
                max: 24.0,
            });
        }
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(MountError::OutOfRange {
                param: "dec_deg",
                value: dec_deg,
                min: -90.0,
                max: 90.0,
            });
        }
        let ra_cmd = proto::set_target_ra(ra_hours);
        self.expect_ack(&ra_cmd).await?;
        let dec_cmd = proto::set_target_dec(dec_deg);
        self.expect_ack(&dec_cmd).await?;
        self.state().target = EquatorialCoords { ra_hours, dec_deg };
        Ok(())
    }

    async fn expect_ack(&self, command: &str) -> Result<(), MountError> {
        match self.channel.exchange_ack(command).await? {
            b'1' => Ok(()),
            other => Err(MountError::rejected(
                command,
                format!("ack {:?}", other as char),
            )),
        }
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    pub async fn tracking(&self) -> Result<bool, MountError> {
        let reply = self.channel.exchange(proto::GET_TRACKING).await?;
        Ok(reply != "0")
    }

    pub async fn set_tracking(&self, enabled: bool) -> Result<(), MountError> {
        let command = if enabled {
            proto::TRACKING_ON
        } else {
            proto::TRACKING_OFF
        };
        self.expect_ack(command).await
    }

    pub fn tracking_rate(&self) -> DriveRate {
        self.state().tracking_rate
    }

    pub async fn set_tracking_rate(&self, rate: DriveRate) -> Result<(), MountError> {
        match rate {
            DriveRate::Sidereal => self.channel.send(proto::RATE_SIDEREAL).await?,
            DriveRate::Lunar => self.channel.send(proto::RATE_LUNAR).await?,
            DriveRate::Solar => self.channel.send(proto::RATE_SOLAR).await?,
            DriveRate::King => self.expect_ack(proto::RATE_KING).await?,
        }
        self.state().tracking_rate = rate;
        Ok(())
    }

    /// Probe which rates this firmware accepts. Selecting King is the
    /// probe itself, so the previous rate is restored afterwards.
    pub async fn supported_tracking_rates(&self) -> Result<Vec<DriveRate>, MountError> {
        let mut rates = vec![DriveRate::Sidereal, DriveRate::Lunar, DriveRate::Solar];
        let king = self.channel.exchange_ack(proto::RATE_KING).await? == b'1';
        self.state().supports_king_rate = king;
        if king {
            rates.push(DriveRate::King);
            let previous = self.tracking_rate();
            self.set_tracking_rate(previous).await?;
        }
        Ok(rates)
    }

    // ========================================================================
    // Slewing
    // ========================================================================

    /// Set the target and start an equatorial slew.
    pub async fn slew_to_coords(&self, ra_hours: f64, dec_deg: f64) -> Result<(), MountError> {
        self.set_target(ra_hours, dec_deg).await?;
        self.slew_to_target().await
    }

    /// Start a slew to the previously set target.
    pub async fn slew_to_target(&self) -> Result<(), MountError> {
        match self.channel.exchange_goto(proto::SLEW_EQUATORIAL).await? {
            GotoAck::Accepted => {
                let mut st = self.state();
                let target = st.target;
                st.slew = Some(SlewSession::begin(Some(target)));
                info!(
                    ra_hours = target.ra_hours,
                    dec_deg = target.dec_deg,
                    "slew started"
                );
                Ok(())
            }
            GotoAck::Rejected(detail) => {
                self.state().slew = None;
                Err(MountError::rejected(proto::SLEW_EQUATORIAL, detail))
            }
        }
    }

    /// Start an alt-az slew. No equatorial target is recorded, so
    /// completion is inferred from settling alone.
    pub async fn slew_to_alt_az(&self, az_deg: f64, alt_deg: f64) -> Result<(), MountError> {
        if !(0.0..=360.0).contains(&az_deg) {
            return Err(MountError::OutOfRange {
                param: "az_deg",
                value: az_deg,
                min: 0.0,
                max: 360.0,
            });
        }
        if !(-90.0..=90.0).contains(&alt_deg) {
            return Err(MountError::OutOfRange {
                param: "alt_deg",
                value: alt_deg,
                min: -90.0,
                max: 90.0,
            });
        }
        let az_cmd = proto::set_target_azimuth(az_deg);
        self.expect_ack(&az_cmd).await?;
        let alt_cmd = proto::set_target_altitude(alt_deg);
        self.expect_ack(&alt_cmd).await?;
        match self.channel.exchange_goto(proto::SLEW_ALT_AZ).await? {
            GotoAck::Accepted => {
                self.state().slew = Some(SlewSession::begin(None));
                info!(az_deg, alt_deg, "alt-az slew started");
                Ok(())
            }
            GotoAck::Rejected(detail) => {
                self.state().slew = None;
                Err(MountError::rejected(proto::SLEW_ALT_AZ, detail))
            }
        }
    }

    /// Stop the mount and drop the slew session immediately, with no
    /// stabilization wait.
    pub async fn abort_slew(&self) -> Result<(), MountError> {
        self.channel.send(proto::STOP_ALL).await?;
        self.state().slew = None;
        info!("slew aborted");
        Ok(())
    }

    /// One inference poll. Side-effecting: fetches the position and may
    /// complete (and clear) the slew session.
    pub async fn is_slewing(&self) -> Result<bool, MountError> {
        {
            let st = self.state();
            if !st.connected || st.slew.is_none() {
                return Ok(false);
            }
        }

        // A failed read means "assume still moving", never "done".
        let sample = match (self.right_ascension().await, self.declination().await) {
            (Ok(ra_hours), Ok(dec_deg)) => Some(EquatorialCoords { ra_hours, dec_deg }),
            _ => None,
        };

        let now = Instant::now();
        let mut st = self.state();
        let mut session = match st.slew.take() {
            Some(session) => session,
            None => return Ok(false),
        };
        match session.poll(sample, &self.tuning, now) {
            SlewPoll::InProgress => {
                st.slew = Some(session);
                Ok(true)
            }
            SlewPoll::Settled => {
                debug!(elapsed_s = session.elapsed(now).as_secs_f64(), "slew settled");
                Ok(false)
            }
            SlewPoll::TimedOut => {
                warn!(
                    elapsed_s = session.elapsed(now).as_secs_f64(),
                    "slew timed out; reporting complete"
                );
                Ok(false)
            }
        }
    }

    /// Where the inference machine currently is, if a slew is tracked.
    pub fn slew_phase(&self) -> Option<SlewPhase> {
        self.state().slew.as_ref().map(|s| s.phase())
    }

    // ========================================================================
    // Sync
    // ========================================================================

    pub async fn sync_to_coords(&self, ra_hours: f64, dec_deg: f64) -> Result<(), MountError> {
        self.set_target(ra_hours, dec_deg).await?;
        self.channel.exchange(proto::SYNC).await?;
        Ok(())
    }

    pub async fn sync_to_alt_az(&self, az_deg: f64, alt_deg: f64) -> Result<(), MountError> {
        let az_cmd = proto::set_target_azimuth(az_deg);
        self.expect_ack(&az_cmd).await?;
        let alt_cmd = proto::set_target_altitude(alt_deg);
        self.expect_ack(&alt_cmd).await?;
        self.channel.exchange(proto::SYNC).await?;
        Ok(())
    }

    // ========================================================================
    // Park and home
    // ========================================================================

    pub async fn park(&self) -> Result<(), MountError> {
        self.expect_ack(proto::PARK).await
    }

    pub async fn unpark(&self) -> Result<(), MountError> {
        self.expect_ack(proto::UNPARK).await
    }

    pub async fn find_home(&self) -> Result<(), MountError> {
        self.expect_ack(proto::FIND_HOME).await
    }

    pub async fn set_park_position(&self) -> Result<(), MountError> {
        self.expect_ack(proto::SET_PARK_POSITION).await
    }

    pub async fn is_parked(&self) -> Result<bool, MountError> {
        let reply = self.channel.exchange(proto::GET_PARKED).await?;
        Ok(reply == "P")
    }

    pub async fn at_park(&self) -> Result<bool, MountError> {
        let reply = self.channel.exchange(proto::GET_STATUS).await?;
        Ok(reply == "P")
    }

    pub async fn at_home(&self) -> Result<bool, MountError> {
        let reply = self.channel.exchange(proto::GET_STATUS).await?;
        Ok(reply == "H")
    }

    // ========================================================================
    // Pier side
    // ========================================================================

    /// Current pier side: device report first, hour-angle sign as the
    /// fallback, `Unknown` when neither is available. Read failures
    /// degrade to `Unknown` rather than erroring; an uncertain side is
    /// a value here, not a fault.
    pub async fn side_of_pier(&self) -> Result<PierSide, MountError> {
        if let Ok(reply) = self.channel.exchange(proto::GET_PIER_SIDE).await {
            match reply.to_ascii_uppercase().as_str() {
                "E" => return Ok(PierSide::East),
                "W" => return Ok(PierSide::West),
                _ => {}
            }
        }
        let ra = self.right_ascension().await.ok();
        let lst = self.sidereal_time().await.ok();
        match (ra, lst) {
            (Some(ra), Some(lst)) => Ok(side_from_hour_angle(crate::pier::hour_angle(lst, ra))),
            _ => Ok(PierSide::Unknown),
        }
    }

    /// Predicted side after slewing to the given coordinates.
    pub async fn destination_side_of_pier(
        &self,
        ra_hours: f64,
        _dec_deg: f64,
    ) -> Result<PierSide, MountError> {
        let lst = match self.sidereal_time().await {
            Ok(lst) => lst,
            Err(_) => return Ok(PierSide::Unknown),
        };
        let (east, west) = self.meridian_offsets();
        Ok(destination_side(lst, ra_hours, east, west))
    }

    /// Whether a slew to the target would flip the mount.
    pub async fn will_flip(&self, ra_hours: f64, dec_deg: f64) -> Result<FlipForecast, MountError> {
        let current = self.side_of_pier().await?;
        let destination = self.destination_side_of_pier(ra_hours, dec_deg).await?;
        Ok(flip_forecast(current, destination))
    }

    /// Whether the mount can physically point at the target.
    pub async fn can_reach(&self, ra_hours: f64, dec_deg: f64) -> Result<Reachability, MountError> {
        let lst = self.sidereal_time().await.ok();
        let (east, west) = self.meridian_offsets();
        let latitude = {
            let st = self.state();
            // Zero latitude is the unset sentinel carried over from the
            // device defaults; skip the horizon test in that case.
            (st.site.latitude_deg != 0.0).then_some(st.site.latitude_deg)
        };
        Ok(reach_check(ra_hours, dec_deg, lst, latitude, east, west))
    }

    /// Device-reported hours past the meridian before a forced flip,
    /// `(east, west)`.
    pub fn meridian_offsets(&self) -> (f64, f64) {
        let st = self.state();
        (st.meridian_offset_east_h, st.meridian_offset_west_h)
    }

    // ========================================================================
    // Guide pulses
    // ========================================================================

    /// Fire a directional guide pulse and start tracking its window.
    pub async fn pulse_guide(
        &self,
        direction: GuideDirection,
        duration_ms: u32,
    ) -> Result<(), MountError> {
        if !(1..=9999).contains(&duration_ms) {
            return Err(MountError::OutOfRange {
                param: "duration_ms",
                value: f64::from(duration_ms),
                min: 1.0,
                max: 9999.0,
            });
        }
        let command = proto::pulse_guide(direction, duration_ms);
        self.channel.send(&command).await?;
        self.state().guide = Some(GuidePulse::begin(direction, duration_ms));
        debug!(%direction, duration_ms, "guide pulse started");
        Ok(())
    }

    /// Wall-clock expiry first; inside the window, the device status is
    /// cross-checked and an explicit "not guiding" ends the pulse early.
    pub async fn is_pulse_guiding(&self) -> Result<bool, MountError> {
        let pulse = match self.state().guide {
            Some(pulse) => pulse,
            None => return Ok(false),
        };
        let now = Instant::now();
        if pulse.expired(now) {
            self.state().guide = None;
            return Ok(false);
        }
        match self.channel.exchange(proto::GET_STATUS).await {
            Ok(reply) if reply == "G" => Ok(true),
            Ok(reply) if reply == "N" || reply == "0" => {
                self.state().guide = None;
                Ok(false)
            }
            // Ambiguous flag or a read failure: trust the clock.
            _ => Ok(true),
        }
    }

    pub fn guide_pulse_info(&self) -> Option<GuidePulseInfo> {
        let now = Instant::now();
        self.state().guide.map(|pulse| pulse.info(now))
    }

    /// Stop a pulse early.
    pub async fn stop_guide_pulse(&self) -> Result<(), MountError> {
        self.channel.send(proto::STOP_ALL).await?;
        self.state().guide = None;
        Ok(())
    }

    // ========================================================================
    // Variable-rate axis motion
    // ========================================================================

    /// Drive an axis at a rate in degrees/second. Zero stops the axis;
    /// a nonzero rate may be re-issued at any cadence (e.g. once per
    /// second for satellite tracking) without stopping first.
    pub async fn move_axis(
        &self,
        axis: TelescopeAxis,
        rate_deg_per_sec: f64,
    ) -> Result<(), MountError> {
        let max = self.state().max_axis_rate_deg_s;
        if !rate_deg_per_sec.is_finite() || rate_deg_per_sec.abs() > max {
            return Err(MountError::OutOfRange {
                param: "rate_deg_per_sec",
                value: rate_deg_per_sec,
                min: -max,
                max,
            });
        }
        if rate_deg_per_sec == 0.0 {
            for command in proto::axis_stops(axis) {
                self.channel.send(command).await?;
            }
            return Ok(());
        }
        let rate_cmd = proto::axis_rate(axis, rate_deg_per_sec);
        if self.channel.exchange_ack(&rate_cmd).await? == b'0' {
            warn!(
                %axis,
                rate = rate_deg_per_sec.abs(),
                "axis rate may exceed mount limits"
            );
        }
        self.channel
            .send(proto::axis_start(axis, rate_deg_per_sec > 0.0))
            .await
    }

    /// Drive an axis at a multiple of a standard tracking rate, e.g.
    /// lunar rate to follow the Moon. The sign selects the direction.
    pub async fn move_axis_at_drive_rate(
        &self,
        axis: TelescopeAxis,
        rate: DriveRate,
        multiplier: f64,
    ) -> Result<(), MountError> {
        self.move_axis(axis, rate.deg_per_sec() * multiplier).await
    }

    /// Both axes in one call, for followers feeding satellite rates.
    pub async fn set_axis_rates(
        &self,
        primary_deg_per_sec: f64,
        secondary_deg_per_sec: f64,
    ) -> Result<(), MountError> {
        self.move_axis(TelescopeAxis::Primary, primary_deg_per_sec)
            .await?;
        self.move_axis(TelescopeAxis::Secondary, secondary_deg_per_sec)
            .await
    }

    /// Emergency stop: halt slewing, guiding, and axis motion. Safe to
    /// call regardless of current state.
    pub async fn stop_all_motion(&self) -> Result<(), MountError> {
        self.channel.send(proto::STOP_ALL).await?;
        for axis in [TelescopeAxis::Primary, TelescopeAxis::Secondary] {
            for command in proto::axis_stops(axis) {
                self.channel.send(command).await?;
            }
        }
        let mut st = self.state();
        st.slew = None;
        st.guide = None;
        info!("all motion stopped");
        Ok(())
    }

    pub fn max_axis_rate(&self) -> f64 {
        self.state().max_axis_rate_deg_s
    }

    // ========================================================================
    // Site and meridian settings
    // ========================================================================

    pub fn site(&self) -> SiteInfo {
        self.state().site
    }

    /// Pull latitude and longitude from the device into the cache.
    pub async fn refresh_site(&self) -> Result<SiteInfo, MountError> {
        let lat_reply = self.channel.exchange(proto::GET_SITE_LATITUDE).await?;
        let lon_reply = self.channel.exchange(proto::GET_SITE_LONGITUDE).await?;
        let mut st = self.state();
        if let Some(lat) = parse_degrees(&lat_reply) {
            st.site.latitude_deg = lat;
        }
        if let Some(lon) = parse_degrees(&lon_reply) {
            st.site.longitude_deg = lon;
        }
        Ok(st.site)
    }

    pub async fn set_site_latitude(&self, latitude_deg: f64) -> Result<(), MountError> {
        if !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(MountError::OutOfRange {
                param: "latitude_deg",
                value: latitude_deg,
                min: -90.0,
                max: 90.0,
            });
        }
        let command = proto::set_site_latitude(latitude_deg);
        self.expect_ack(&command).await?;
        self.state().site.latitude_deg = latitude_deg;
        Ok(())
    }

    pub async fn set_site_longitude(&self, longitude_deg: f64) -> Result<(), MountError> {
        if !(-180.0..=360.0).contains(&longitude_deg) {
            return Err(MountError::OutOfRange {
                param: "longitude_deg",
                value: longitude_deg,
                min: -180.0,
                max: 360.0,
            });
        }
        let command = proto::set_site_longitude(longitude_deg);
        self.expect_ack(&command).await?;
        self.state().site.longitude_deg = longitude_deg;
        Ok(())
    }

    /// The protocol has no elevation command; elevation is cache-only.
    pub fn set_site_elevation(&self, elevation_m: f64) -> Result<(), MountError> {
        if !(-300.0..=10_000.0).contains(&elevation_m) {
            return Err(MountError::OutOfRange {
                param: "elevation_m",
                value: elevation_m,
                min: -300.0,
                max: 10_000.0,
            });
        }
        self.state().site.elevation_m = elevation_m;
        Ok(())
    }

    /// Query the meridian flip limits. Firmware reports them two ways:
    /// an hour-angle limit via `:Gh#`, and per-direction degree values
    /// via `:GXE0#`/`:GXE1#` which take precedence where present.
    pub async fn refresh_meridian_limits(&self) -> Result<(f64, f64), MountError> {
        if let Ok(reply) = self.channel.exchange(proto::GET_MERIDIAN_LIMIT).await {
            if let Some(hours) = parse_ra_hours(&reply) {
                self.state().meridian_offset_east_h = hours;
            }
        }
        if let Ok(reply) = self.channel.exchange(proto::GET_MERIDIAN_EAST).await {
            if let Ok(degrees) = reply.parse::<f64>() {
                self.state().meridian_offset_east_h = degrees / 15.0;
            }
        }
        let reply = self.channel.exchange(proto::GET_MERIDIAN_WEST).await?;
        if let Ok(degrees) = reply.parse::<f64>() {
            self.state().meridian_offset_west_h = degrees / 15.0;
        }
        let offsets = self.meridian_offsets();
        debug!(
            east_h = offsets.0,
            west_h = offsets.1,
            "meridian offsets read"
        );
        Ok(offsets)
    }

    // ========================================================================
    // Aggregate status
    // ========================================================================

    /// One-call status snapshot for progress reporting. Costs several
    /// round trips; poll accordingly.
    pub async fn status(&self) -> Result<MountStatus, MountError> {
        let position = self.position().await?;
        let slewing = self.is_slewing().await?;
        let tracking = self.tracking().await?;
        let pier_side = self.side_of_pier().await?;
        let at_park = self.at_park().await?;
        let pulse_guiding = self.is_pulse_guiding().await?;
        Ok(MountStatus {
            connected: self.is_connected(),
            position,
            slewing,
            tracking,
            pier_side: pier_side.to_string(),
            at_park,
            pulse_guiding,
        })
    }
}
