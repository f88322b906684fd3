//! Pure metric computations for video observations
//!
//! Every function in this module is referentially transparent: the current
//! time is always passed in, never read from a clock, and no function here
//! performs I/O or returns an error. Edge cases (zero denominators, empty
//! inputs, non-positive elapsed time) degrade to a defined zero/neutral
//! value so callers never need defensive wrapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::VideoObservation;

/// Reference ceiling for the velocity component (views per hour).
const VPH_CEILING: f64 = 10_000.0;

/// Reference ceiling for the engagement component (percent).
const ENGAGEMENT_CEILING: f64 = 10.0;

/// Assumed subscriber base when the real count is unknown or zero.
const ASSUMED_SUBSCRIBERS: f64 = 10_000.0;

/// Reference view count for the momentum component.
const MOMENTUM_VIEW_REFERENCE: f64 = 100_000.0;

/// Momentum decays linearly to zero by this age (one week).
const MOMENTUM_HORIZON_HOURS: f64 = 168.0;

/// Metrics derived from one observation (plus, for growth, a previous one).
///
/// Computed on demand; cheap enough that callers usually don't cache, but a
/// cache keyed by `(video_id, observed_at)` is sound since inputs are
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Views per hour since publish. Always >= 0.
    pub vph: f64,

    /// (likes + comments) / views as a percentage. Always >= 0.
    pub engagement_rate: f64,

    /// Bounded [0, 100] composite of velocity, engagement, reach, momentum.
    pub viral_score: f64,

    /// Percent view growth per hour against the previous observation.
    /// `None` until a second observation for the video exists.
    pub growth_rate: Option<f64>,
}

impl DerivedMetrics {
    /// Derive all metrics for an observation.
    ///
    /// `previous` is an earlier observation of the same video (for growth
    /// rate); `subscriber_count` feeds the reach component of the viral
    /// score and may be unknown.
    pub fn compute(
        observation: &VideoObservation,
        previous: Option<&VideoObservation>,
        subscriber_count: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        let growth_rate = previous.map(|prev| {
            let hours = hours_between(prev.observed_at, observation.observed_at);
            growth_rate(observation.view_count, prev.view_count, hours)
        });

        Self {
            vph: vph(observation.view_count, observation.published_at, now),
            engagement_rate: engagement_rate(
                observation.view_count,
                observation.like_count,
                observation.comment_count,
            ),
            viral_score: viral_score(observation, subscriber_count, now),
            growth_rate,
        }
    }
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

/// Views per hour since publish.
///
/// Returns `0.0` when no time has elapsed or `published_at` lies in the
/// future (clock skew between us and the upstream platform).
pub fn vph(view_count: u64, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = hours_between(published_at, now);
    if hours <= 0.0 {
        return 0.0;
    }
    view_count as f64 / hours
}

/// (likes + comments) / views, as a percentage. `0.0` for zero views.
pub fn engagement_rate(view_count: u64, like_count: u64, comment_count: u64) -> f64 {
    if view_count == 0 {
        return 0.0;
    }
    (like_count + comment_count) as f64 / view_count as f64 * 100.0
}

/// Percent view change per hour between two counts.
///
/// Returns `0.0` when the previous count is zero or no time has elapsed.
pub fn growth_rate(current: u64, previous: u64, hours_elapsed: f64) -> f64 {
    if previous == 0 || hours_elapsed <= 0.0 {
        return 0.0;
    }
    let percent_change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    percent_change / hours_elapsed
}

/// Weighted composite score in [0, 100].
///
/// Components (each normalized to [0, 100] before weighting):
/// - velocity (40%): vph against a 10,000/h ceiling, boosted ×1.2 under 24h
///   of age and ×1.1 under 72h
/// - engagement (30%): engagement rate against a 10% ceiling
/// - reach (20%): views relative to subscribers; a ratio above 1 (views
///   exceeding subscribers) scores above the midpoint
/// - momentum (10%): linear decay to zero at 168h, scaled by views against
///   a 100,000 reference
///
/// The weighted sum is multiplied by escalating bonus factors for
/// exceptional cases and clamped to [0, 100].
pub fn viral_score(
    observation: &VideoObservation,
    subscriber_count: Option<u64>,
    now: DateTime<Utc>,
) -> f64 {
    let age_hours = hours_between(observation.published_at, now).max(0.0);
    let views = observation.view_count as f64;

    let vph = vph(observation.view_count, observation.published_at, now);
    let engagement = engagement_rate(
        observation.view_count,
        observation.like_count,
        observation.comment_count,
    );

    // Velocity: recent uploads get a boost since early vph understates reach.
    let age_boost = if age_hours < 24.0 {
        1.2
    } else if age_hours < 72.0 {
        1.1
    } else {
        1.0
    };
    let velocity = ((vph / VPH_CEILING).min(1.0) * 100.0 * age_boost).min(100.0);

    let engagement_component = (engagement / ENGAGEMENT_CEILING).min(1.0) * 100.0;

    // Reach: views past the subscriber base means the video escaped its
    // channel's audience, so ratios above 1 map onto the upper half.
    let subscribers = match subscriber_count {
        Some(count) if count > 0 => count as f64,
        _ => ASSUMED_SUBSCRIBERS,
    };
    let ratio = views / subscribers;
    let reach = if ratio >= 1.0 {
        50.0 + ((ratio - 1.0) / 9.0).min(1.0) * 50.0
    } else {
        ratio * 50.0
    };

    let decay = (1.0 - age_hours / MOMENTUM_HORIZON_HOURS).max(0.0);
    let momentum = decay * (views / MOMENTUM_VIEW_REFERENCE).min(1.0) * 100.0;

    let mut score =
        velocity * 0.4 + engagement_component * 0.3 + reach * 0.2 + momentum * 0.1;

    if vph > 100_000.0 {
        score *= 1.5;
    }
    if engagement > 15.0 {
        score *= 1.3;
    }
    if age_hours < 6.0 && observation.view_count > 100_000 {
        score *= 1.4;
    }

    score.clamp(0.0, 100.0)
}

/// Summary statistics plus flagged indices from outlier detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    /// Indices into the input slice whose score deviates from the mean by
    /// more than the threshold in standard deviations.
    pub outliers: Vec<usize>,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl OutlierReport {
    fn empty() -> Self {
        Self {
            outliers: Vec::new(),
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
        }
    }
}

/// Default deviation threshold for [`identify_outliers`].
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 2.5;

/// Flag viral scores that deviate from the population mean by more than
/// `threshold_std_dev` standard deviations.
///
/// Fewer than 2 inputs yields an empty report with zeroed statistics.
pub fn identify_outliers(scores: &[f64], threshold_std_dev: f64) -> OutlierReport {
    if scores.len() < 2 {
        return OutlierReport::empty();
    }

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    // Population (not sample) standard deviation.
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let outliers = if std_dev > 0.0 {
        scores
            .iter()
            .enumerate()
            .filter(|(_, s)| ((*s - mean) / std_dev).abs() > threshold_std_dev)
            .map(|(i, _)| i)
            .collect()
    } else {
        Vec::new()
    };

    OutlierReport {
        outliers,
        mean,
        median,
        std_dev,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Result of a linear-regression trend fit over a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,

    /// Fit quality: |R²| × 100, clamped to [0, 100].
    pub strength: f64,
}

impl Trend {
    fn stable() -> Self {
        Self {
            direction: TrendDirection::Stable,
            slope: 0.0,
            strength: 0.0,
        }
    }
}

/// Slope magnitudes below this count as no trend.
const SLOPE_DEADBAND: f64 = 0.01;

/// Ordinary least-squares trend over timestamped values.
///
/// Points are sorted by timestamp and regressed against their index, so the
/// slope is "per observation" rather than per unit time. Fewer than 2
/// points yields a stable trend with zero strength.
pub fn trend_direction(points: &[(DateTime<Utc>, f64)]) -> Trend {
    if points.len() < 2 {
        return Trend::stable();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);

    let n = sorted.len() as f64;
    let mean_x = (sorted.len() - 1) as f64 / 2.0;
    let mean_y = sorted.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for (i, (_, value)) in sorted.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = value - mean_y;
        ss_xy += dx * dy;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
    }

    let slope = ss_xy / ss_xx;

    // A flat series has no variance to explain; the fit is perfect but the
    // trend is still "stable".
    let r_squared = if ss_yy > 0.0 {
        (ss_xy * ss_xy) / (ss_xx * ss_yy)
    } else {
        0.0
    };

    let direction = if slope > SLOPE_DEADBAND {
        TrendDirection::Up
    } else if slope < -SLOPE_DEADBAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    Trend {
        direction,
        slope,
        strength: (r_squared.abs() * 100.0).clamp(0.0, 100.0),
    }
}
