use std::{fmt::Write, time::Duration};

/// Pretty-print the elapsed time (used in progress bars)
pub fn elapsed_subsec(state: &indicatif::ProgressState, writer: &mut dyn Write) {
    let seconds = state.elapsed().as_secs();
    let sub_seconds = (state.elapsed().as_millis() % 1000) / 100;
    let _ = writer.write_str(&format!("{}.{}s", seconds, sub_seconds));
}

/// Pretty-print a duration (used in logs and diagnostics)
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    let micros = nanos / 1_000;
    let millis = duration.as_millis();
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let hours = seconds / 3_600;

    if hours > 0 {
        format!("{:.3}h", hours as f64 + (minutes % 60) as f64 / 60.0)
    } else if minutes > 0 {
        format!("{:.3}m", minutes as f64 + (seconds % 60) as f64 / 60.0)
    } else if seconds > 0 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if millis > 0 {
        format!("{:.3}ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.3}μs", nanos as f64 / 1_000.0)
    }
}
