//! Live context snapshot.
//!
//! A `Context` captures where the user is, how much time and energy they
//! have, and who they are with at one instant. It is built once per
//! reading and then only read by the rules.
//!
//! Raw fields are kept as received so a malformed snapshot still
//! deserializes; the accessors clamp them to valid boundaries.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

/// Lowest valid energy level.
pub const MIN_ENERGY: u8 = 1;
/// Highest valid energy level.
pub const MAX_ENERGY: u8 = 5;

/// Who the user is with / what setting they are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SocialContext {
    #[default]
    Alone,
    WithFamily,
    AtWork,
    InPublic,
    Driving,
}

impl SocialContext {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            SocialContext::Alone => "alone",
            SocialContext::WithFamily => "with family",
            SocialContext::AtWork => "at work",
            SocialContext::InPublic => "in public",
            SocialContext::Driving => "driving",
        }
    }
}

/// Current context for visibility decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Identifier written to audit records
    pub id: String,
    /// Owner of the calendar that is checked for conflicts
    pub user_id: String,
    /// Instant the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Offset from UTC used to derive the local hour
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Current position, if known
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Known location the user is at, if any
    #[serde(default)]
    pub current_location_id: Option<String>,
    /// Free minutes as reported (may be negative in malformed input)
    #[serde(default)]
    pub available_minutes: i64,
    /// Energy as reported (may be outside 1-5 in malformed input)
    #[serde(default = "default_energy")]
    pub energy_level: i32,
    #[serde(default)]
    pub social_context: SocialContext,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub traffic: Option<String>,
}

fn default_energy() -> i32 {
    3
}

impl Context {
    /// Create a context for `user_id` at `timestamp` with neutral defaults.
    pub fn new(user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("ctx-{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            timestamp,
            utc_offset_minutes: 0,
            coordinates: None,
            current_location_id: None,
            available_minutes: 0,
            energy_level: default_energy(),
            social_context: SocialContext::Alone,
            weather: None,
            traffic: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn with_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.current_location_id = Some(location_id.into());
        self
    }

    pub fn with_available_minutes(mut self, minutes: i64) -> Self {
        self.available_minutes = minutes;
        self
    }

    pub fn with_energy_level(mut self, level: i32) -> Self {
        self.energy_level = level;
        self
    }

    pub fn with_social_context(mut self, social: SocialContext) -> Self {
        self.social_context = social;
        self
    }

    pub fn with_utc_offset_minutes(mut self, offset: i32) -> Self {
        self.utc_offset_minutes = offset;
        self
    }

    pub fn with_weather(mut self, weather: impl Into<String>) -> Self {
        self.weather = Some(weather.into());
        self
    }

    pub fn with_traffic(mut self, traffic: impl Into<String>) -> Self {
        self.traffic = Some(traffic.into());
        self
    }

    /// Available minutes, never negative.
    pub fn available(&self) -> u32 {
        self.available_minutes.clamp(0, u32::MAX as i64) as u32
    }

    /// Energy level clamped into [1, 5].
    pub fn energy(&self) -> u8 {
        self.energy_level
            .clamp(MIN_ENERGY as i32, MAX_ENERGY as i32) as u8
    }

    /// Current position, ignoring coordinates outside the valid ranges.
    pub fn position(&self) -> Option<Coordinates> {
        self.coordinates.filter(|c| c.is_valid())
    }

    /// Hour of day (0-23) at the user's UTC offset.
    pub fn local_hour(&self) -> u32 {
        let offset = Duration::minutes(i64::from(self.utc_offset_minutes));
        self.timestamp
            .checked_add_signed(offset)
            .unwrap_or(self.timestamp)
            .hour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_negative_available_minutes_clamp_to_zero() {
        let ctx = Context::new("u1", at(12)).with_available_minutes(-30);
        assert_eq!(ctx.available(), 0);
    }

    #[test]
    fn test_energy_clamps_to_bounds() {
        assert_eq!(Context::new("u1", at(12)).with_energy_level(0).energy(), 1);
        assert_eq!(Context::new("u1", at(12)).with_energy_level(9).energy(), 5);
        assert_eq!(Context::new("u1", at(12)).with_energy_level(4).energy(), 4);
    }

    #[test]
    fn test_local_hour_applies_offset() {
        let ctx = Context::new("u1", at(23)).with_utc_offset_minutes(-8 * 60);
        assert_eq!(ctx.local_hour(), 15);

        let ctx = Context::new("u1", at(23)).with_utc_offset_minutes(2 * 60);
        assert_eq!(ctx.local_hour(), 1);
    }

    #[test]
    fn test_local_hour_at_end_of_time_keeps_utc_hour() {
        let ctx = Context::new("u1", DateTime::<Utc>::MAX_UTC).with_utc_offset_minutes(120);
        assert_eq!(ctx.local_hour(), DateTime::<Utc>::MAX_UTC.hour());
    }

    #[test]
    fn test_invalid_coordinates_are_treated_as_unknown() {
        let ctx = Context::new("u1", at(12)).with_coordinates(120.0, 0.0);
        assert!(ctx.position().is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"id":"c1","user_id":"u1","timestamp":"2026-03-02T09:00:00Z"}"#;
        let ctx: Context = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.energy(), 3);
        assert_eq!(ctx.available(), 0);
        assert_eq!(ctx.social_context, SocialContext::Alone);
        assert!(ctx.coordinates.is_none());
    }

    #[test]
    fn test_social_context_serde_names() {
        let json = serde_json::to_string(&SocialContext::WithFamily).unwrap();
        assert_eq!(json, "\"with_family\"");
    }

    proptest! {
        #[test]
        fn prop_accessors_stay_in_range(minutes in any::<i64>(), energy in any::<i32>()) {
            let ctx = Context::new("u1", at(12))
                .with_available_minutes(minutes)
                .with_energy_level(energy);
            prop_assert!((1..=5).contains(&ctx.energy()));
            if minutes <= 0 {
                prop_assert_eq!(ctx.available(), 0);
            }
        }
    }
}
