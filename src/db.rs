use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{Coach, CoachSession, DbCoach, DbCoachSession};
use crate::error::AppError;
use crate::models::{
    AbsenceEntry, Athlete, AttendanceRecord, AttendanceStatus, DbAthlete, DbAttendanceRecord,
    DbHistoryRow, DbTeam, FlaggedAthlete, HistoryRow, Team,
};

pub const DEFAULT_TEAM_NAMES: [&str; 4] = ["Undercut", "Chicane", "Box Box", "Push Mode"];

// ---------------------------------------------------------------------------
// Teams

#[instrument(skip(pool))]
pub async fn get_all_teams(pool: &Pool<Sqlite>) -> Result<Vec<Team>, AppError> {
    let rows = sqlx::query_as::<_, DbTeam>("SELECT id, name FROM teams ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Team::from).collect())
}

#[instrument(skip(pool))]
pub async fn create_team(pool: &Pool<Sqlite>, name: &str) -> Result<i64, AppError> {
    info!("Creating team");
    let res = sqlx::query("INSERT INTO teams (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Seeds the default team list when the table is empty. Returns whether
/// anything was inserted.
#[instrument(skip(pool))]
pub async fn seed_default_teams(pool: &Pool<Sqlite>) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM teams")
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Ok(false);
    }

    for name in DEFAULT_TEAM_NAMES {
        create_team(pool, name).await?;
    }

    info!("Seeded default teams");
    Ok(true)
}

/// Resolves a team reference: a numeric id of an existing team, or an
/// exact team name. Anything else resolves to no team. Generic over the
/// executor so the CSV import can run it inside its transaction.
#[instrument(skip(executor))]
pub async fn resolve_team_reference<'e, E>(
    executor: E,
    reference: &str,
) -> Result<Option<i64>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let reference = reference.trim();
    if reference.is_empty() {
        return Ok(None);
    }

    let numeric_id = reference.parse::<i64>().ok();

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM teams WHERE (? IS NOT NULL AND id = ?) OR name = ?",
    )
    .bind(numeric_id)
    .bind(numeric_id)
    .bind(reference)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Athletes

#[instrument(skip(pool))]
pub async fn get_athletes(
    pool: &Pool<Sqlite>,
    team_id: Option<i64>,
) -> Result<Vec<Athlete>, AppError> {
    info!("Getting athletes");
    let query = if team_id.is_some() {
        "SELECT id, first_name, last_name, grade, gender, team_id FROM athletes
         WHERE team_id = ? ORDER BY last_name, first_name"
    } else {
        "SELECT id, first_name, last_name, grade, gender, team_id FROM athletes
         ORDER BY last_name, first_name"
    };

    let mut q = sqlx::query_as::<_, DbAthlete>(query);
    if let Some(team_id) = team_id {
        q = q.bind(team_id);
    }

    let rows = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Athlete::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_athlete(pool: &Pool<Sqlite>, id: i64) -> Result<Athlete, AppError> {
    let row = sqlx::query_as::<_, DbAthlete>(
        "SELECT id, first_name, last_name, grade, gender, team_id FROM athletes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(athlete) => Ok(Athlete::from(athlete)),
        _ => Err(AppError::NotFound(format!(
            "Athlete with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn athlete_exists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM athletes WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// The shared roster-identity check: case-insensitive first/last name
/// within one team. Manual adds and CSV import both go through this.
/// `IS` rather than `=` so NULL (unassigned) teams still match each other.
/// Generic over the executor so the import can check against rows it has
/// already inserted in its own transaction.
#[instrument(skip(executor))]
pub async fn find_duplicate_athlete<'e, E>(
    executor: E,
    first_name: &str,
    last_name: &str,
    team_id: Option<i64>,
) -> Result<Option<i64>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM athletes
         WHERE lower(first_name) = lower(?) AND lower(last_name) = lower(?) AND team_id IS ?",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(team_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(pool))]
pub async fn create_athlete(
    pool: &Pool<Sqlite>,
    first_name: &str,
    last_name: &str,
    grade: Option<i64>,
    gender: Option<&str>,
    team_id: Option<i64>,
) -> Result<i64, AppError> {
    info!("Creating athlete");

    if find_duplicate_athlete(pool, first_name, last_name, team_id)
        .await?
        .is_some()
    {
        return Err(AppError::Validation(format!(
            "Athlete {} {} already exists on this team",
            first_name, last_name
        )));
    }

    let res = sqlx::query(
        "INSERT INTO athletes (first_name, last_name, grade, gender, team_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(grade)
    .bind(gender)
    .bind(team_id)
    .execute(pool)
    .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(err) => {
            let err = AppError::from(err);
            if err.is_unique_violation() {
                // Lost a race against a concurrent insert of the same identity.
                Err(AppError::Validation(format!(
                    "Athlete {} {} already exists on this team",
                    first_name, last_name
                )))
            } else {
                Err(err)
            }
        }
    }
}

/// Removes an athlete and all of their attendance rows in one transaction.
/// The schema has no DB-level cascade, so the attendance delete comes first.
#[instrument(skip(pool))]
pub async fn delete_athlete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting athlete");

    if !athlete_exists(pool, id).await? {
        return Err(AppError::NotFound(format!(
            "Athlete with id {} not found in database",
            id
        )));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attendance WHERE athlete_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM athletes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendance

/// The explicit reconciliation operation: persist a `Present` row for
/// every in-scope athlete with no record for `date`. Invoked once per
/// attendance page load, never hidden inside a query. Idempotent: the
/// unique (athlete_id, date) index turns repeats into no-ops, and an
/// existing `Absent` row is never touched.
#[instrument(skip(pool))]
pub async fn reconcile_attendance_day(
    pool: &Pool<Sqlite>,
    date: &str,
    team_id: Option<i64>,
) -> Result<u64, AppError> {
    info!("Reconciling attendance day");

    // The WHERE clause is required by SQLite when combining
    // INSERT ... SELECT with an upsert clause.
    let query = if team_id.is_some() {
        "INSERT INTO attendance (athlete_id, date, status, note)
         SELECT a.id, ?, 'Present', NULL FROM athletes a
         WHERE a.team_id = ?
         ON CONFLICT (athlete_id, date) DO NOTHING"
    } else {
        "INSERT INTO attendance (athlete_id, date, status, note)
         SELECT a.id, ?, 'Present', NULL FROM athletes a
         WHERE 1 = 1
         ON CONFLICT (athlete_id, date) DO NOTHING"
    };

    let mut q = sqlx::query(query).bind(date);
    if let Some(team_id) = team_id {
        q = q.bind(team_id);
    }

    let res = q.execute(pool).await?;
    if res.rows_affected() > 0 {
        info!(
            backfilled = res.rows_affected(),
            "Backfilled Present rows for unrecorded athletes"
        );
    }
    Ok(res.rows_affected())
}

#[instrument(skip(pool))]
pub async fn get_attendance_for_date(
    pool: &Pool<Sqlite>,
    date: &str,
    team_id: Option<i64>,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let query = if team_id.is_some() {
        "SELECT att.id, att.athlete_id, att.date, att.status, att.note
         FROM attendance att
         JOIN athletes a ON a.id = att.athlete_id
         WHERE att.date = ? AND a.team_id = ?"
    } else {
        "SELECT att.id, att.athlete_id, att.date, att.status, att.note
         FROM attendance att
         WHERE att.date = ?"
    };

    let mut q = sqlx::query_as::<_, DbAttendanceRecord>(query).bind(date);
    if let Some(team_id) = team_id {
        q = q.bind(team_id);
    }

    let rows = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(AttendanceRecord::from).collect())
}

#[instrument(skip(pool))]
pub async fn find_attendance_record(
    pool: &Pool<Sqlite>,
    athlete_id: i64,
    date: &str,
) -> Result<Option<AttendanceRecord>, AppError> {
    let row = sqlx::query_as::<_, DbAttendanceRecord>(
        "SELECT id, athlete_id, date, status, note FROM attendance
         WHERE athlete_id = ? AND date = ?",
    )
    .bind(athlete_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(AttendanceRecord::from))
}

/// Marks attendance for one athlete on one date. An existing row toggles
/// Present<->Absent and takes the submitted note; a missing row inserts a
/// fresh `Present` row with the submitted note, matching what
/// reconciliation would have backfilled. Unknown athlete ids are ignored
/// (`None`), and an
/// insert that loses the unique-index race is treated as "already exists"
/// rather than re-raised.
#[instrument(skip(pool))]
pub async fn toggle_attendance(
    pool: &Pool<Sqlite>,
    athlete_id: i64,
    date: &str,
    note: Option<&str>,
) -> Result<Option<AttendanceStatus>, AppError> {
    if !athlete_exists(pool, athlete_id).await? {
        warn!(athlete_id, "Ignoring attendance mark for unknown athlete");
        return Ok(None);
    }

    if let Some(record) = find_attendance_record(pool, athlete_id, date).await? {
        let new_status = record.status.toggled();
        sqlx::query("UPDATE attendance SET status = ?, note = ? WHERE id = ?")
            .bind(new_status.as_str())
            .bind(note)
            .bind(record.id)
            .execute(pool)
            .await?;

        return Ok(Some(new_status));
    }

    let res = sqlx::query("INSERT INTO attendance (athlete_id, date, status, note) VALUES (?, ?, ?, ?)")
        .bind(athlete_id)
        .bind(date)
        .bind(AttendanceStatus::Present.as_str())
        .bind(note)
        .execute(pool)
        .await;

    match res {
        Ok(_) => Ok(Some(AttendanceStatus::Present)),
        Err(err) => {
            let err = AppError::from(err);
            if err.is_unique_violation() {
                info!(athlete_id, date, "Concurrent insert won the race, keeping its row");
                let existing = find_attendance_record(pool, athlete_id, date).await?;
                Ok(existing.map(|r| r.status))
            } else {
                Err(err)
            }
        }
    }
}

#[instrument(skip(pool))]
pub async fn get_attendance_dates(pool: &Pool<Sqlite>) -> Result<Vec<String>, AppError> {
    let dates =
        sqlx::query_scalar::<_, String>("SELECT DISTINCT date FROM attendance ORDER BY date DESC")
            .fetch_all(pool)
            .await?;

    Ok(dates)
}

/// Every in-scope athlete left-joined against the selected date's rows.
/// Missing rows surface with the default `Present` status; nothing is
/// persisted here.
#[instrument(skip(pool))]
pub async fn get_history_for_date(
    pool: &Pool<Sqlite>,
    date: &str,
    team_id: Option<i64>,
) -> Result<Vec<HistoryRow>, AppError> {
    let query = if team_id.is_some() {
        "SELECT a.id AS athlete_id, a.first_name, a.last_name, att.status, att.note
         FROM athletes a
         LEFT JOIN attendance att ON att.athlete_id = a.id AND att.date = ?
         WHERE a.team_id = ?
         ORDER BY a.last_name, a.first_name"
    } else {
        "SELECT a.id AS athlete_id, a.first_name, a.last_name, att.status, att.note
         FROM athletes a
         LEFT JOIN attendance att ON att.athlete_id = a.id AND att.date = ?
         ORDER BY a.last_name, a.first_name"
    };

    let mut q = sqlx::query_as::<_, DbHistoryRow>(query).bind(date);
    if let Some(team_id) = team_id {
        q = q.bind(team_id);
    }

    let rows = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(HistoryRow::from).collect())
}

#[instrument(skip(pool))]
pub async fn delete_attendance_record(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting attendance record");
    sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_absences_for_athlete(
    pool: &Pool<Sqlite>,
    athlete_id: i64,
) -> Result<Vec<AbsenceEntry>, AppError> {
    let rows = sqlx::query_as::<_, AbsenceEntry>(
        "SELECT id, date, note FROM attendance
         WHERE athlete_id = ? AND status = 'Absent'
         ORDER BY date DESC",
    )
    .bind(athlete_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Reporting

/// Absence counts per athlete, filtered and thresholded. Ordering is
/// count descending, then last name, then first name.
#[instrument(skip(pool))]
pub async fn get_flagged_athletes(
    pool: &Pool<Sqlite>,
    threshold: i64,
    team_id: Option<i64>,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<Vec<FlaggedAthlete>, AppError> {
    info!("Computing flagged athletes");

    let mut query = String::from(
        "SELECT a.id AS athlete_id, a.first_name, a.last_name, COUNT(att.id) AS absence_count
         FROM athletes a
         JOIN attendance att ON att.athlete_id = a.id AND att.status = 'Absent'",
    );

    if since.is_some() {
        query.push_str(" AND att.date >= ?");
    }
    if until.is_some() {
        query.push_str(" AND att.date <= ?");
    }
    if team_id.is_some() {
        query.push_str(" WHERE a.team_id = ?");
    }

    query.push_str(
        " GROUP BY a.id, a.first_name, a.last_name
         HAVING COUNT(att.id) >= ?
         ORDER BY absence_count DESC, a.last_name, a.first_name",
    );

    let mut q = sqlx::query_as::<_, FlaggedAthlete>(&query);
    if let Some(since) = since {
        q = q.bind(since);
    }
    if let Some(until) = until {
        q = q.bind(until);
    }
    if let Some(team_id) = team_id {
        q = q.bind(team_id);
    }
    q = q.bind(threshold);

    Ok(q.fetch_all(pool).await?)
}

// ---------------------------------------------------------------------------
// Coaches

#[instrument(skip_all, fields(username))]
pub async fn authenticate_coach(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<Coach>, AppError> {
    info!("Authenticating coach");
    let row = sqlx::query_as::<_, DbCoachCredentials>(
        "SELECT id, password FROM coaches WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let valid = bcrypt::verify(password, &row.password).unwrap_or(false);
            if valid {
                Ok(Some(get_coach(pool, row.id).await?))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[derive(sqlx::FromRow)]
struct DbCoachCredentials {
    id: i64,
    password: String,
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_coach(
    pool: &Pool<Sqlite>,
    name: &str,
    username: &str,
    password: &str,
    role: &str,
    team_id: Option<i64>,
    email: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new coach");

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM coaches WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO coaches (name, username, password, role, team_id, email)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(username)
    .bind(hashed_password)
    .bind(role)
    .bind(team_id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_coach(pool: &Pool<Sqlite>, id: i64) -> Result<Coach, AppError> {
    let row = sqlx::query_as::<_, DbCoach>(
        "SELECT id, name, username, role, team_id, email FROM coaches WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(coach) => Ok(Coach::from(coach)),
        _ => Err(AppError::NotFound(format!(
            "Coach with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_coach_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<Coach>, AppError> {
    let row = sqlx::query_as::<_, DbCoach>(
        "SELECT id, name, username, role, team_id, email FROM coaches WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Coach::from))
}

#[instrument(skip(pool))]
pub async fn get_all_coaches(pool: &Pool<Sqlite>) -> Result<Vec<Coach>, AppError> {
    let rows = sqlx::query_as::<_, DbCoach>(
        "SELECT id, name, username, role, team_id, email FROM coaches ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Coach::from).collect())
}

#[instrument(skip_all, fields(coach_id))]
pub async fn update_coach_password(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating coach password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE coaches SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(coach_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Seeds a default admin account so a fresh database is usable.
#[instrument(skip(pool))]
pub async fn seed_default_coach(pool: &Pool<Sqlite>) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM coaches")
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Ok(false);
    }

    create_coach(pool, "Admin", "admin", "adminpass", "admin", None, None).await?;
    info!("Seeded default admin coach");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Sessions

#[instrument(skip(pool, token))]
pub async fn create_coach_session(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating coach session");

    let res = sqlx::query("INSERT INTO coach_sessions (coach_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(coach_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<CoachSession, AppError> {
    let session = sqlx::query_as::<_, DbCoachSession>(
        "SELECT id, coach_id, token, created_at, expires_at FROM coach_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(CoachSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM coach_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM coach_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Password resets

#[instrument(skip(pool, token))]
pub async fn create_password_reset(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating password reset token");

    let res = sqlx::query("INSERT INTO password_resets (coach_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(coach_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[derive(sqlx::FromRow)]
struct DbPasswordReset {
    id: i64,
    coach_id: i64,
    expires_at: NaiveDateTime,
}

/// Looks up a reset token, deletes it, and returns the coach it belongs
/// to. Expired or unknown tokens fail; a token can only be used once.
#[instrument(skip(pool, token))]
pub async fn consume_password_reset(pool: &Pool<Sqlite>, token: &str) -> Result<i64, AppError> {
    let row = sqlx::query_as::<_, DbPasswordReset>(
        "SELECT id, coach_id, expires_at FROM password_resets WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(AppError::Authentication("Invalid reset token".to_string()));
    };

    sqlx::query("DELETE FROM password_resets WHERE id = ?")
        .bind(row.id)
        .execute(pool)
        .await?;

    if row.expires_at <= Utc::now().naive_utc() {
        return Err(AppError::Authentication("Reset token expired".to_string()));
    }

    Ok(row.coach_id)
}
