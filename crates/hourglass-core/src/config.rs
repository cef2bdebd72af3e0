//! Room configuration
//!
//! Secrets and defaults that seed a fresh game record. Read from the
//! environment at startup; tests build it directly.

use crate::error::{HourglassError, Result};
use crate::types::{GameState, MasterCodes, StagePins};
use chrono::{DateTime, Duration, Utc};

/// Admin secret environment variable
pub const ENV_ADMIN_PASSPHRASE: &str = "ADMIN_PASSPHRASE";
/// Default room passphrase environment variable
pub const ENV_SECRET_PASSPHRASE: &str = "SECRET_PASSPHRASE";
/// Default stage PINs environment variable (comma separated, exactly two)
pub const ENV_STAGE_PINS: &str = "GAME_PUZZLE_1B_STAGE_PINS";
/// Countdown length environment variable, in minutes
pub const ENV_COUNTDOWN_MINUTES: &str = "COUNTDOWN_MINUTES";

/// Room configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Bearer secret for admin operations
    pub admin_secret: String,
    /// Passphrase seeded into fresh records
    pub default_passphrase: String,
    /// Stage PINs seeded into fresh records
    pub default_stage_pins: StagePins,
    /// Countdown length of a fresh record
    pub countdown: Duration,
}

impl RoomConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from process environment, falling back to defaults
    ///
    /// # Errors
    /// - `HourglassError::Config` if a variable is present but malformed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary key lookup
    ///
    /// # Errors
    /// - `HourglassError::Config` if a value is present but malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(secret) = lookup(ENV_ADMIN_PASSPHRASE) {
            config.admin_secret = secret;
        }
        if let Some(passphrase) = lookup(ENV_SECRET_PASSPHRASE) {
            config.default_passphrase = passphrase;
        }
        if let Some(raw) = lookup(ENV_STAGE_PINS) {
            config.default_stage_pins = parse_stage_pins(&raw)?;
        }
        if let Some(raw) = lookup(ENV_COUNTDOWN_MINUTES) {
            let minutes: i64 = raw.trim().parse().map_err(|_| {
                HourglassError::Config(format!(
                    "{ENV_COUNTDOWN_MINUTES} must be an integer, got {raw:?}"
                ))
            })?;
            if minutes <= 0 {
                return Err(HourglassError::Config(format!(
                    "{ENV_COUNTDOWN_MINUTES} must be positive, got {minutes}"
                )));
            }
            config.countdown = Duration::minutes(minutes);
        }
        Ok(config)
    }

    /// With admin secret
    #[inline]
    #[must_use]
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = secret.into();
        self
    }

    /// With default passphrase
    #[inline]
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.default_passphrase = passphrase.into();
        self
    }

    /// With default stage PINs
    #[inline]
    #[must_use]
    pub fn with_stage_pins(mut self, pins: StagePins) -> Self {
        self.default_stage_pins = pins;
        self
    }

    /// With countdown length
    #[inline]
    #[must_use]
    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    /// Secrets for a fresh record
    #[must_use]
    pub fn master_codes(&self) -> MasterCodes {
        MasterCodes {
            passphrase: self.default_passphrase.clone(),
            puzzle_1b_pins: self.default_stage_pins.clone(),
        }
    }

    /// A fresh record as of `now`
    #[must_use]
    pub fn fresh_state(&self, now: DateTime<Utc>) -> GameState {
        GameState::fresh(self.master_codes(), self.countdown, now)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            admin_secret: "changeme".to_string(),
            default_passphrase: "OPEN".to_string(),
            default_stage_pins: StagePins::new("000", "000"),
            countdown: Duration::minutes(60),
        }
    }
}

fn parse_stage_pins(raw: &str) -> Result<StagePins> {
    let pins: Vec<String> = raw.split(',').map(|pin| pin.trim().to_string()).collect();
    StagePins::try_from(pins)
        .map_err(|reason| HourglassError::Config(format!("{ENV_STAGE_PINS}: {reason}")))
}
