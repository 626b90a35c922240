use chrono::Duration;

/// Render a parking duration as `"<h>h <m>m"`, or `"<m>m"` under an hour.
/// Partial minutes are dropped; negative spans (clock skew) render as `"0m"`.
pub fn format_duration(elapsed: Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
