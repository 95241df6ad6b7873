//! `SkyAdvisor` — a pure function over `(target coordinates, now, site,
//! weather snapshot)` deciding whether a target is currently observable.
//! Never blocks on I/O; weather snapshots are sampled externally and handed
//! in (spec §4.3).

use chrono::{DateTime, Utc};

use crate::domain::models::target::{Coordinates, Target};
use crate::domain::models::weather::{SiteLocation, WeatherLimits, WeatherSnapshot};

/// Result of one observability evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyVerdict {
    pub observable: bool,
    pub reasons: Vec<String>,
    /// `Some(minutes)` when the target is within `meridian_window` of
    /// crossing the meridian on the wrong side of the pier. Does not, by
    /// itself, make the target unobservable — it tells the scheduler to
    /// insert a `MeridianFlip` task (spec §4.4).
    pub flip_imminent_within_minutes: Option<f64>,
}

impl SkyVerdict {
    fn safe() -> Self {
        Self { observable: true, reasons: Vec::new(), flip_imminent_within_minutes: None }
    }
}

/// Days since the J2000.0 epoch (2000-01-01T12:00:00Z), used by the
/// Greenwich Mean Sidereal Time approximation below.
fn days_since_j2000(now: DateTime<Utc>) -> f64 {
    let j2000 = DateTime::parse_from_rfc3339("2000-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
    (now - j2000).num_milliseconds() as f64 / (1000.0 * 86400.0)
}

/// Greenwich Mean Sidereal Time, in hours, via the standard low-precision
/// polynomial approximation (Meeus, ch. 12, truncated to first order).
fn greenwich_mean_sidereal_time_hours(now: DateTime<Utc>) -> f64 {
    let d = days_since_j2000(now);
    let gmst_hours = 18.697_374_558 + 24.065_709_824_279 * d;
    gmst_hours.rem_euclid(24.0)
}

fn local_sidereal_time_hours(now: DateTime<Utc>, longitude_degrees: f64) -> f64 {
    let gmst = greenwich_mean_sidereal_time_hours(now);
    (gmst + longitude_degrees / 15.0).rem_euclid(24.0)
}

/// Hour angle in hours, normalized to `(-12, 12]`. Negative = east of
/// meridian (rising), positive = west of meridian (past transit).
fn hour_angle_hours(ra_hours: f64, lst_hours: f64) -> f64 {
    let mut ha = lst_hours - ra_hours;
    ha = ((ha + 12.0).rem_euclid(24.0)) - 12.0;
    ha
}

/// Altitude above the horizon, in degrees, from the standard spherical
/// trigonometry identity.
fn altitude_degrees(dec_degrees: f64, lat_degrees: f64, hour_angle_hours: f64) -> f64 {
    let dec = dec_degrees.to_radians();
    let lat = lat_degrees.to_radians();
    let ha = (hour_angle_hours * 15.0).to_radians();
    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
    sin_alt.clamp(-1.0, 1.0).asin().to_degrees()
}

/// Pure, side-effect-free sky-condition advisor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkyAdvisor;

impl SkyAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate observability for `target` at `now`. Given identical
    /// inputs, the verdict is identical (invariant 10).
    pub fn evaluate(
        &self,
        target: &Target,
        now: DateTime<Utc>,
        site: SiteLocation,
        weather: &WeatherSnapshot,
        weather_limits: &WeatherLimits,
        default_min_altitude_degrees: f64,
        meridian_window_minutes: f64,
    ) -> SkyVerdict {
        let mut verdict = SkyVerdict::safe();

        if let Some(Coordinates { ra_hours, dec_degrees }) = target.coordinates {
            let min_altitude = target.min_altitude_degrees.unwrap_or(default_min_altitude_degrees);
            let lst = local_sidereal_time_hours(now, site.longitude_degrees);
            let ha = hour_angle_hours(ra_hours, lst);
            let altitude = altitude_degrees(dec_degrees, site.latitude_degrees, ha);

            if altitude < min_altitude {
                verdict.observable = false;
                verdict.reasons.push(format!(
                    "altitude {altitude:.1} deg below minimum {min_altitude:.1} deg"
                ));
            }

            let minutes_to_meridian = ha.abs() * 60.0;
            if ha < 0.0 && minutes_to_meridian < meridian_window_minutes {
                verdict.flip_imminent_within_minutes = Some(minutes_to_meridian);
            }
        }

        let weather_violations = weather_limits.violations(weather);
        if !weather_violations.is_empty() {
            verdict.observable = false;
            verdict.reasons.extend(weather_violations);
        }

        verdict
    }
}
