use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

#[derive(Serialize, Clone)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl From<DbTeam> for Team {
    fn from(team: DbTeam) -> Self {
        Self {
            id: team.id.unwrap_or_default(),
            name: team.name.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Athlete {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub grade: Option<i64>,
    pub gender: Option<String>,
    pub team_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAthlete {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub grade: Option<i64>,
    pub gender: Option<String>,
    pub team_id: Option<i64>,
}

impl From<DbAthlete> for Athlete {
    fn from(athlete: DbAthlete) -> Self {
        Self {
            id: athlete.id.unwrap_or_default(),
            first_name: athlete.first_name.unwrap_or_default(),
            last_name: athlete.last_name.unwrap_or_default(),
            grade: athlete.grade,
            gender: athlete.gender,
            team_id: athlete.team_id,
        }
    }
}

/// A day's status for one athlete. There is no third "unmarked" state:
/// the attendance page backfills `Present` rows for every athlete in
/// scope before rendering, and the history view renders missing rows as
/// `Present` without persisting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            other => Err(AppError::Validation(format!(
                "Unknown attendance status: {}",
                other
            ))),
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Serialize, Clone)]
pub struct AttendanceRecord {
    pub id: i64,
    pub athlete_id: i64,
    pub date: String,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceRecord {
    pub id: Option<i64>,
    pub athlete_id: Option<i64>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
}

impl From<DbAttendanceRecord> for AttendanceRecord {
    fn from(record: DbAttendanceRecord) -> Self {
        Self {
            id: record.id.unwrap_or_default(),
            athlete_id: record.athlete_id.unwrap_or_default(),
            date: record.date.unwrap_or_default(),
            status: record
                .status
                .as_deref()
                .map(|s| AttendanceStatus::parse(s).unwrap_or_default())
                .unwrap_or_default(),
            note: record.note,
        }
    }
}

/// One history row: an athlete left-joined against the selected date.
#[derive(sqlx::FromRow, Clone)]
pub struct DbHistoryRow {
    pub athlete_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct HistoryRow {
    pub athlete_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

impl From<DbHistoryRow> for HistoryRow {
    fn from(row: DbHistoryRow) -> Self {
        Self {
            athlete_id: row.athlete_id.unwrap_or_default(),
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
            status: row
                .status
                .as_deref()
                .map(|s| AttendanceStatus::parse(s).unwrap_or_default())
                .unwrap_or_default(),
            note: row.note,
        }
    }
}

/// Output row of the flagged-athletes aggregation.
#[derive(sqlx::FromRow, Serialize, Clone)]
pub struct FlaggedAthlete {
    pub athlete_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub absence_count: i64,
}

/// A single absence entry for the athlete report and absence management.
#[derive(sqlx::FromRow, Serialize, Clone)]
pub struct AbsenceEntry {
    pub id: i64,
    pub date: String,
    pub note: Option<String>,
}
