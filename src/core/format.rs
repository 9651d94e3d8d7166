//! Display formatting for market magnitudes and percentages.

use chrono::{DateTime, Utc};

/// Formats a USD magnitude with a T/B/M suffix, or as a plain 2-decimal
/// dollar amount below one million. Missing or NaN input renders as `$0`.
pub fn format_currency(value: Option<f64>) -> String {
    let value = match value {
        Some(v) if !v.is_nan() => v,
        _ => return "$0".to_string(),
    };

    if value >= 1e12 {
        format!("${:.2}T", value / 1e12)
    } else if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else {
        format!("${value:.2}")
    }
}

/// Formats a percent change with an explicit `+` for gains.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            // Round before the sign check so tiny changes print as "0.00%"
            let rounded = (v * 100.0).round() / 100.0 + 0.0;
            if rounded > 0.0 {
                format!("+{rounded:.2}%")
            } else {
                format!("{rounded:.2}%")
            }
        }
        _ => "N/A".to_string(),
    }
}

/// Formats a 24h volume. Unlike [`format_currency`] there is no trillion tier.
pub fn format_volume(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            if v >= 1e9 {
                format!("${:.2}B", v / 1e9)
            } else if v >= 1e6 {
                format!("${:.2}M", v / 1e6)
            } else {
                format!("${v:.2}")
            }
        }
        _ => "N/A".to_string(),
    }
}

/// Unit prices of small-cap coins need the extra precision.
pub fn format_price(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("${v:.6}"),
        _ => "N/A".to_string(),
    }
}

pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}
