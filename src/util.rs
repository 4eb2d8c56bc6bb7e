use chrono::{DateTime, Local, Utc};

// Chart samples are fractions of a second; keep millisecond resolution.
pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.3} s")
}

pub fn format_clock(time: DateTime<Local>) -> String {
    time.format("%H:%M:%S").to_string()
}

pub fn format_release_time(release_time: Option<DateTime<Utc>>) -> String {
    match release_time {
        Some(time) => time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "not set".to_string(),
    }
}
