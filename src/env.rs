use std::path::Path;

use chrono::{FixedOffset, Utc};
use tracing::{info, warn};

pub const DEFAULT_ABSENCE_THRESHOLD: i64 = 5;

/// Request-independent runtime configuration, resolved once at startup and
/// placed in Rocket's managed state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Offset from UTC, in minutes, used to compute the local calendar day.
    pub utc_offset_minutes: i32,
    /// Minimum absence count for the flagged-athletes report.
    pub absence_threshold: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let utc_offset_minutes = std::env::var("ATTENDANCE_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);

        let absence_threshold = std::env::var("ABSENCE_FLAG_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_ABSENCE_THRESHOLD);

        Self {
            utc_offset_minutes,
            absence_threshold,
        }
    }

    /// Today's date as an ISO `YYYY-MM-DD` string in the configured local
    /// offset. Attendance rows key off this, not server UTC.
    pub fn local_today(&self) -> String {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Utc::now()
            .with_timezone(&offset)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            absence_threshold: DEFAULT_ABSENCE_THRESHOLD,
        }
    }
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
