use chrono::Duration;

/// Formats a remaining duration as `MM:SS`, clamping negatives to zero.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Fraction of `total` already elapsed, in `[0, 1]`.
pub fn progress(total: Duration, remaining: Duration) -> f64 {
    let total_ms = total.num_milliseconds();
    if total_ms <= 0 {
        return 1.0;
    }

    let remaining_ms = remaining.num_milliseconds().clamp(0, total_ms);
    (total_ms - remaining_ms) as f64 / total_ms as f64
}
