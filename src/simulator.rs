//! Simulated OnStepX controller
//!
//! A [`MountLink`] variant that answers the wire protocol from an
//! in-memory mount model: target bookkeeping, a constant-rate slew
//! toward the target, tracking/park flags, and guide-pulse timing. It
//! exists so the driver can be exercised end to end without hardware;
//! the same code path talks to it as to a real socket.

use crate::coords::{altitude_deg, format_degrees, format_ra_hours, parse_degrees, parse_ra_hours};
use crate::error::MountError;
use crate::protocol::TERMINATOR;
use crate::transport::MountLink;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct SimSlew {
    from_ra: f64,
    from_dec: f64,
    started: Instant,
}

/// In-memory OnStepX emulator.
pub struct SimulatedMount {
    ra_hours: f64,
    dec_deg: f64,
    target_ra: f64,
    target_dec: f64,
    lst_hours: f64,
    latitude_deg: f64,
    longitude_deg: f64,
    meridian_east_deg: f64,
    meridian_west_deg: f64,
    tracking: bool,
    parked: bool,
    at_home: bool,
    pier_reply: char,
    king_supported: bool,
    accept_goto: bool,
    slew_rate_deg_s: f64,
    slew: Option<SimSlew>,
    guide_until: Option<Instant>,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
}

impl Default for SimulatedMount {
    fn default() -> Self {
        Self {
            ra_hours: 5.0,
            dec_deg: 10.0,
            target_ra: 0.0,
            target_dec: 0.0,
            lst_hours: 10.0,
            latitude_deg: 40.0,
            longitude_deg: -105.0,
            meridian_east_deg: 15.0,
            meridian_west_deg: 10.0,
            tracking: true,
            parked: false,
            at_home: false,
            pier_reply: 'E',
            king_supported: false,
            accept_goto: true,
            slew_rate_deg_s: 4.0,
            slew: None,
            guide_until: None,
            inbox: Vec::new(),
            outbox: VecDeque::new(),
        }
    }
}

impl SimulatedMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, ra_hours: f64, dec_deg: f64) -> Self {
        self.ra_hours = ra_hours;
        self.dec_deg = dec_deg;
        self
    }

    pub fn with_sidereal_time(mut self, lst_hours: f64) -> Self {
        self.lst_hours = lst_hours;
        self
    }

    pub fn with_site(mut self, latitude_deg: f64, longitude_deg: f64) -> Self {
        self.latitude_deg = latitude_deg;
        self.longitude_deg = longitude_deg;
        self
    }

    /// Degrees past the meridian before a forced flip, east then west.
    pub fn with_meridian_limits(mut self, east_deg: f64, west_deg: f64) -> Self {
        self.meridian_east_deg = east_deg;
        self.meridian_west_deg = west_deg;
        self
    }

    pub fn with_slew_rate(mut self, deg_per_sec: f64) -> Self {
        self.slew_rate_deg_s = deg_per_sec;
        self
    }

    pub fn with_pier_reply(mut self, reply: char) -> Self {
        self.pier_reply = reply;
        self
    }

    pub fn with_king_rate(mut self) -> Self {
        self.king_supported = true;
        self
    }

    /// Make every slew-start command come back rejected.
    pub fn rejecting_goto(mut self) -> Self {
        self.accept_goto = false;
        self
    }

    fn reply(&mut self, text: &str) {
        self.outbox.extend(text.bytes());
    }

    /// Move the simulated position along the commanded slew.
    fn advance(&mut self, now: Instant) {
        let slew = match self.slew {
            Some(slew) => slew,
            None => return,
        };
        let mut delta_ra = self.target_ra - slew.from_ra;
        if delta_ra > 12.0 {
            delta_ra -= 24.0;
        }
        if delta_ra < -12.0 {
            delta_ra += 24.0;
        }
        let delta_dec = self.target_dec - slew.from_dec;
        let total_deg = ((delta_ra * 15.0).powi(2) + delta_dec.powi(2)).sqrt();
        let traveled = self.slew_rate_deg_s * now.duration_since(slew.started).as_secs_f64();
        if total_deg <= f64::EPSILON || traveled >= total_deg {
            self.ra_hours = self.target_ra;
            self.dec_deg = self.target_dec;
            self.slew = None;
            return;
        }
        let frac = traveled / total_deg;
        self.ra_hours = (slew.from_ra + delta_ra * frac).rem_euclid(24.0);
        self.dec_deg = slew.from_dec + delta_dec * frac;
    }

    fn guiding(&self, now: Instant) -> bool {
        self.guide_until.is_some_and(|until| now < until)
    }

    fn handle(&mut self, command: &str, now: Instant) {
        match command {
            ":GVP" => self.reply("OnStepX#"),
            ":GVN" => self.reply("10.24k#"),
            ":GVD" => self.reply("Jul 15 2025#"),
            ":GVT" => self.reply("12:00:00#"),

            ":GR" => {
                self.advance(now);
                let text = format!("{}#", format_ra_hours(self.ra_hours));
                self.reply(&text);
            }
            ":GD" => {
                self.advance(now);
                let text = format!("{}#", format_degrees(self.dec_deg));
                self.reply(&text);
            }
            ":GA" => {
                self.advance(now);
                let alt = altitude_deg(
                    self.lst_hours,
                    self.ra_hours,
                    self.dec_deg,
                    self.latitude_deg,
                );
                let text = format!("{}#", format_degrees(alt));
                self.reply(&text);
            }
            ":GZ" => {
                let text = format!("{}#", format_degrees(180.0));
                self.reply(&text);
            }
            ":GS" => {
                let text = format!("{}#", format_ra_hours(self.lst_hours));
                self.reply(&text);
            }

            ":GT" => {
                let text = if self.tracking { "1#" } else { "0#" };
                self.reply(text);
            }
            ":Te" => {
                self.tracking = true;
                self.reply("1");
            }
            ":Td" => {
                self.tracking = false;
                self.reply("1");
            }
            ":TQ" | ":TL" | ":TS" => {}
            ":TK" => {
                let text = if self.king_supported { "1" } else { "0" };
                self.reply(text);
            }

            ":MS" | ":MA" => {
                if self.accept_goto {
                    self.advance(now);
                    self.slew = Some(SimSlew {
                        from_ra: self.ra_hours,
                        from_dec: self.dec_deg,
                        started: now,
                    });
                    self.reply("0");
                } else {
                    self.reply("1Object below horizon#");
                }
            }
            ":Q" => {
                self.advance(now);
                self.slew = None;
                self.guide_until = None;
            }
            ":Qe" | ":Qw" | ":Qn" | ":Qs" => {}
            ":Me" | ":Mw" | ":Mn" | ":Ms" => {}

            ":CM" => {
                self.ra_hours = self.target_ra;
                self.dec_deg = self.target_dec;
                self.slew = None;
                self.reply("Coordinates matched#");
            }

            ":Gm" => {
                let text = format!("{}#", self.pier_reply);
                self.reply(&text);
            }
            ":GU" => {
                let flag = if self.parked {
                    'P'
                } else if self.at_home {
                    'H'
                } else if self.guiding(now) {
                    'G'
                } else {
                    'N'
                };
                let text = format!("{}#", flag);
                self.reply(&text);
            }
            ":h?" => {
                let text = if self.parked { "P#" } else { "p#" };
                self.reply(text);
            }
            ":hP" => {
                self.parked = true;
                self.tracking = false;
                self.reply("1");
            }
            ":hR" => {
                self.parked = false;
                self.reply("1");
            }
            ":hF" => {
                self.at_home = true;
                self.reply("1");
            }
            ":hQ" => self.reply("1"),

            ":Gt" => {
                let text = format!("{}#", format_degrees(self.latitude_deg));
                self.reply(&text);
            }
            ":Gg" => {
                let text = format!("{}#", format_degrees(self.longitude_deg));
                self.reply(&text);
            }
            ":Gh" => self.reply("+00#"),
            ":GXE0" => {
                let text = format!("{:.1}#", self.meridian_east_deg);
                self.reply(&text);
            }
            ":GXE1" => {
                let text = format!("{:.1}#", self.meridian_west_deg);
                self.reply(&text);
            }

            _ => self.handle_parameterized(command, now),
        }
    }

    fn handle_parameterized(&mut self, command: &str, now: Instant) {
        if let Some(value) = command.strip_prefix(":Sr") {
            match parse_ra_hours(value) {
                Some(ra) => {
                    self.target_ra = ra;
                    self.reply("1");
                }
                None => self.reply("0"),
            }
        } else if let Some(value) = command.strip_prefix(":Sd") {
            match parse_degrees(value) {
                Some(dec) => {
                    self.target_dec = dec;
                    self.reply("1");
                }
                None => self.reply("0"),
            }
        } else if let Some(value) = command.strip_prefix(":Sz").or_else(|| command.strip_prefix(":Sa")) {
            // Alt-az targets are accepted but not modeled kinematically.
            match parse_degrees(value) {
                Some(_) => self.reply("1"),
                None => self.reply("0"),
            }
        } else if let Some(value) = command.strip_prefix(":St") {
            match parse_degrees(value) {
                Some(lat) => {
                    self.latitude_deg = lat;
                    self.reply("1");
                }
                None => self.reply("0"),
            }
        } else if let Some(value) = command.strip_prefix(":Sg") {
            match parse_degrees(value) {
                Some(lon) => {
                    self.longitude_deg = lon;
                    self.reply("1");
                }
                None => self.reply("0"),
            }
        } else if let Some(rest) = command.strip_prefix(":Mg") {
            let ms: u64 = rest.get(1..).and_then(|d| d.parse().ok()).unwrap_or(0);
            self.guide_until = Some(now + Duration::from_millis(ms));
        } else if command.starts_with(":RA") || command.starts_with(":RE") {
            self.reply("1");
        }
        // Anything else: silently ignored, like real firmware.
    }
}

#[async_trait]
impl MountLink for SimulatedMount {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), MountError> {
        self.inbox.extend_from_slice(data);
        let now = Instant::now();
        while let Some(end) = self.inbox.iter().position(|&b| b == TERMINATOR) {
            let raw: Vec<u8> = self.inbox.drain(..=end).collect();
            let command = String::from_utf8_lossy(&raw[..raw.len() - 1]).to_string();
            self.handle(&command, now);
        }
        Ok(())
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, MountError> {
        loop {
            if !self.outbox.is_empty() {
                let mut n = 0;
                while n < buf.len() {
                    match self.outbox.pop_front() {
                        Some(byte) => {
                            buf[n] = byte;
                            n += 1;
                        }
                        None => break,
                    }
                }
                return Ok(n);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn describe(&self) -> String {
        "simulated mount".into()
    }
}
