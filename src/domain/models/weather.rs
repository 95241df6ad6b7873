//! Weather domain models consumed by the sky-condition advisor.
//!
//! Default gate values are grounded in the original weather-monitoring task
//! this spec was distilled from (cloud cover/wind/humidity/temperature/
//! dew-point defaults).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single externally-sampled weather reading. Snapshots are taken at a
/// fixed interval (default 5 minutes) by an external collaborator and
/// handed to the advisor; the advisor itself never blocks on I/O.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub sampled_at: DateTime<Utc>,
    pub cloud_cover_percent: f64,
    pub wind_speed_kmh: f64,
    pub humidity_percent: f64,
    pub temperature_c: f64,
    pub dew_point_c: f64,
    pub raining: bool,
}

impl WeatherSnapshot {
    pub fn dew_point_margin_c(&self) -> f64 {
        self.temperature_c - self.dew_point_c
    }
}

/// Gate thresholds a weather snapshot must satisfy. Defaults mirror the
/// original weather-monitoring task's constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherLimits {
    pub max_cloud_cover_percent: f64,
    pub max_wind_speed_kmh: f64,
    pub max_humidity_percent: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    pub min_dew_point_margin_c: f64,
    pub reject_rain: bool,
}

impl Default for WeatherLimits {
    fn default() -> Self {
        Self {
            max_cloud_cover_percent: 30.0,
            max_wind_speed_kmh: 25.0,
            max_humidity_percent: 85.0,
            min_temperature_c: -20.0,
            max_temperature_c: 35.0,
            min_dew_point_margin_c: 2.0,
            reject_rain: true,
        }
    }
}

impl WeatherLimits {
    /// Evaluate a snapshot against these limits, returning the list of
    /// human-readable reasons for every gate that failed (empty = safe).
    pub fn violations(&self, snapshot: &WeatherSnapshot) -> Vec<String> {
        let mut reasons = Vec::new();
        if snapshot.cloud_cover_percent > self.max_cloud_cover_percent {
            reasons.push(format!(
                "cloud cover {:.1}% exceeds limit {:.1}%",
                snapshot.cloud_cover_percent, self.max_cloud_cover_percent
            ));
        }
        if snapshot.wind_speed_kmh > self.max_wind_speed_kmh {
            reasons.push(format!(
                "wind speed {:.1} km/h exceeds limit {:.1} km/h",
                snapshot.wind_speed_kmh, self.max_wind_speed_kmh
            ));
        }
        if snapshot.humidity_percent > self.max_humidity_percent {
            reasons.push(format!(
                "humidity {:.1}% exceeds limit {:.1}%",
                snapshot.humidity_percent, self.max_humidity_percent
            ));
        }
        if snapshot.temperature_c < self.min_temperature_c || snapshot.temperature_c > self.max_temperature_c {
            reasons.push(format!(
                "temperature {:.1}C outside [{:.1}, {:.1}]",
                snapshot.temperature_c, self.min_temperature_c, self.max_temperature_c
            ));
        }
        if snapshot.dew_point_margin_c() < self.min_dew_point_margin_c {
            reasons.push(format!(
                "dew point margin {:.1}C below minimum {:.1}C",
                snapshot.dew_point_margin_c(),
                self.min_dew_point_margin_c
            ));
        }
        if self.reject_rain && snapshot.raining {
            reasons.push("rain detected".to_string());
        }
        reasons
    }
}

/// Observing site location, needed for altitude/meridian arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
}

impl Default for SiteLocation {
    fn default() -> Self {
        Self { latitude_degrees: 0.0, longitude_degrees: 0.0 }
    }
}
