use chrono::Utc;
use rocket::http::ContentType;
use rocket::response::{self, Responder, Response};
use sqlx::{Pool, Sqlite};
use std::io::{Cursor, Write};
use tracing::{info, instrument};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::csv::csv_quote;
use crate::db::{get_all_coaches, get_all_teams, get_athletes};
use crate::error::AppError;
use crate::models::DbAttendanceRecord;

/// Filters shared by the athlete and attendance exports. Date bounds are
/// inclusive ISO strings.
#[derive(Debug, Default, Clone)]
pub struct ExportFilter {
    pub team_id: Option<i64>,
    pub since: Option<String>,
    pub until: Option<String>,
}

pub fn timestamped_filename(table: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        table,
        Utc::now().format("%Y%m%d_%H%M%S"),
        extension
    )
}

#[instrument(skip(pool))]
pub async fn build_teams_csv(pool: &Pool<Sqlite>) -> Result<String, AppError> {
    let mut csv = String::from("id,name\n");
    for team in get_all_teams(pool).await? {
        csv.push_str(&format!("{},{}\n", team.id, csv_quote(&team.name)));
    }
    Ok(csv)
}

#[instrument(skip(pool))]
pub async fn build_athletes_csv(
    pool: &Pool<Sqlite>,
    filter: &ExportFilter,
) -> Result<String, AppError> {
    let mut csv = String::from("id,first_name,last_name,grade,gender,team_id\n");
    for athlete in get_athletes(pool, filter.team_id).await? {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            athlete.id,
            csv_quote(&athlete.first_name),
            csv_quote(&athlete.last_name),
            athlete.grade.map(|g| g.to_string()).unwrap_or_default(),
            csv_quote(athlete.gender.as_deref().unwrap_or("")),
            athlete.team_id.map(|t| t.to_string()).unwrap_or_default(),
        ));
    }
    Ok(csv)
}

#[instrument(skip(pool))]
pub async fn build_attendance_csv(
    pool: &Pool<Sqlite>,
    filter: &ExportFilter,
) -> Result<String, AppError> {
    let mut query = String::from(
        "SELECT att.id, att.athlete_id, att.date, att.status, att.note
         FROM attendance att
         JOIN athletes a ON a.id = att.athlete_id
         WHERE 1 = 1",
    );
    if filter.team_id.is_some() {
        query.push_str(" AND a.team_id = ?");
    }
    if filter.since.is_some() {
        query.push_str(" AND att.date >= ?");
    }
    if filter.until.is_some() {
        query.push_str(" AND att.date <= ?");
    }
    query.push_str(" ORDER BY att.date, att.athlete_id");

    let mut q = sqlx::query_as::<_, DbAttendanceRecord>(&query);
    if let Some(team_id) = filter.team_id {
        q = q.bind(team_id);
    }
    if let Some(since) = &filter.since {
        q = q.bind(since);
    }
    if let Some(until) = &filter.until {
        q = q.bind(until);
    }

    let mut csv = String::from("id,athlete_id,date,status,note\n");
    for row in q.fetch_all(pool).await? {
        let record = crate::models::AttendanceRecord::from(row);
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            record.id,
            record.athlete_id,
            record.date,
            record.status,
            csv_quote(record.note.as_deref().unwrap_or("")),
        ));
    }
    Ok(csv)
}

/// Coach export never includes password hashes.
#[instrument(skip(pool))]
pub async fn build_coaches_csv(pool: &Pool<Sqlite>) -> Result<String, AppError> {
    let mut csv = String::from("id,name,username,role,team_id,email\n");
    for coach in get_all_coaches(pool).await? {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            coach.id,
            csv_quote(&coach.name),
            csv_quote(&coach.username),
            coach.role,
            coach.team_id.map(|t| t.to_string()).unwrap_or_default(),
            csv_quote(coach.email.as_deref().unwrap_or("")),
        ));
    }
    Ok(csv)
}

/// Bundles all four table exports into one ZIP, each entry carrying its
/// own timestamped filename.
#[instrument(skip(pool))]
pub async fn build_export_zip(
    pool: &Pool<Sqlite>,
    filter: &ExportFilter,
) -> Result<Vec<u8>, AppError> {
    info!("Building full export bundle");

    let entries = [
        ("teams", build_teams_csv(pool).await?),
        ("athletes", build_athletes_csv(pool, filter).await?),
        ("attendance", build_attendance_csv(pool, filter).await?),
        ("coaches", build_coaches_csv(pool).await?),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (table, csv) in entries {
        zip.start_file(timestamped_filename(table, "csv"), opts)
            .map_err(|e| AppError::Internal(format!("Zip write error: {}", e)))?;
        zip.write_all(csv.as_bytes())
            .map_err(|e| AppError::Internal(format!("Zip write error: {}", e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| AppError::Internal(format!("Zip write error: {}", e)))?;

    Ok(cursor.into_inner())
}

/// A downloadable attachment response (CSV or ZIP).
pub struct ExportDownload {
    pub filename: String,
    pub content_type: ContentType,
    pub bytes: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for ExportDownload {
    fn respond_to(self, _req: &'r rocket::Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(self.content_type)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .sized_body(self.bytes.len(), Cursor::new(self.bytes))
            .ok()
    }
}
