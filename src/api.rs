use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use validator::Validate;

use crate::auth::{Coach, CoachSession, Permission};
use crate::csv::{RosterImportReport, import_roster_csv};
use crate::db::{
    authenticate_coach, create_athlete, create_coach, create_coach_session, create_password_reset,
    delete_athlete, delete_attendance_record, find_coach_by_username, get_absences_for_athlete,
    get_all_coaches, get_all_teams, get_athletes, get_attendance_dates, get_attendance_for_date,
    get_flagged_athletes, get_history_for_date, invalidate_session, reconcile_attendance_day,
    seed_default_teams, toggle_attendance, update_coach_password,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::export::{
    ExportDownload, ExportFilter, build_athletes_csv, build_attendance_csv, build_coaches_csv,
    build_teams_csv, build_export_zip, timestamped_filename,
};
use crate::models::{Athlete, AttendanceStatus, FlaggedAthlete, Team};
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub coach: Option<CoachData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CoachData {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub role: String,
    pub team_id: Option<i64>,
    pub email: Option<String>,
}

impl From<Coach> for CoachData {
    fn from(coach: Coach) -> Self {
        Self {
            id: coach.id,
            name: coach.name.clone(),
            username: coach.username.clone(),
            role: coach.role.to_string(),
            team_id: coach.team_id,
            email: coach.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TeamData {
    pub id: i64,
    pub name: String,
}

impl From<Team> for TeamData {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AthleteData {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub grade: Option<i64>,
    pub gender: Option<String>,
    pub team_id: Option<i64>,
}

impl From<Athlete> for AthleteData {
    fn from(athlete: Athlete) -> Self {
        Self {
            id: athlete.id,
            first_name: athlete.first_name,
            last_name: athlete.last_name,
            grade: athlete.grade,
            gender: athlete.gender,
            team_id: athlete.team_id,
        }
    }
}

fn validate_iso_date(value: &str) -> Result<(), AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("Invalid ISO date: {}", value)))
}

// ---------------------------------------------------------------------------
// Home & health

/// Athlete directory, ordered by last name. Open like the original home
/// page; it exposes nothing beyond names.
#[get("/")]
pub async fn api_home(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<AthleteData>>, Status> {
    let athletes = get_athletes(db, None).await?;
    Ok(Json(athletes.into_iter().map(AthleteData::from).collect()))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

// ---------------------------------------------------------------------------
// Sessions

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use chrono::Utc;
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;

    match authenticate_coach(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(coach) => {
            let token = CoachSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(1);

            create_coach_session(db, coach.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build(("session_token", token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(1));
            cookies.add_private(cookie);

            cookies.add_private(
                Cookie::build(("coach_id", coach.id.to_string()))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            cookies.add_private(
                Cookie::build(("coach_role", coach.role.to_string()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            Ok(Json(LoginResponse {
                success: true,
                coach: Some(CoachData::from(coach)),
                error: None,
                redirect_url: Some("/api/attendance".to_string()),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            coach: None,
            error: Some("Invalid username or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[get("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Redirect {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("coach_id"));
    cookies.remove_private(rocket::http::Cookie::build("coach_role"));

    Redirect::to("/api/")
}

#[get("/me")]
pub async fn api_me(coach: Coach) -> Json<CoachData> {
    Json(CoachData::from(coach))
}

#[get("/me", rank = 2)]
pub fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

// ---------------------------------------------------------------------------
// Attendance

#[derive(Serialize, Deserialize)]
pub struct AttendanceEntryData {
    pub athlete_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AttendancePageResponse {
    pub date: String,
    pub selected_team_id: Option<i64>,
    pub teams: Vec<TeamData>,
    pub athletes: Vec<AttendanceEntryData>,
    pub present_count: usize,
    pub absent_count: usize,
}

/// The attendance page. Reconciliation runs exactly once here, up front:
/// after it, every athlete in scope has a persisted row for today.
#[get("/attendance?<team_id>")]
pub async fn api_attendance(
    team_id: Option<i64>,
    coach: Coach,
    config: &State<AppConfig>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AttendancePageResponse>, Status> {
    coach.require_permission(Permission::MarkAttendance)?;

    let today = config.local_today();

    reconcile_attendance_day(db, &today, team_id).await?;

    let athletes = get_athletes(db, team_id).await?;
    let records = get_attendance_for_date(db, &today, team_id).await?;
    let by_athlete: HashMap<i64, (AttendanceStatus, Option<String>)> = records
        .into_iter()
        .map(|r| (r.athlete_id, (r.status, r.note)))
        .collect();

    let entries: Vec<AttendanceEntryData> = athletes
        .into_iter()
        .map(|a| {
            let (status, note) = by_athlete
                .get(&a.id)
                .cloned()
                .unwrap_or((AttendanceStatus::Present, None));
            AttendanceEntryData {
                athlete_id: a.id,
                first_name: a.first_name,
                last_name: a.last_name,
                status,
                note,
            }
        })
        .collect();

    let present_count = entries
        .iter()
        .filter(|e| e.status == AttendanceStatus::Present)
        .count();
    let absent_count = entries.len() - present_count;

    let teams = get_all_teams(db).await?;

    Ok(Json(AttendancePageResponse {
        date: today,
        selected_team_id: team_id,
        teams: teams.into_iter().map(TeamData::from).collect(),
        athletes: entries,
        present_count,
        absent_count,
    }))
}

#[derive(Deserialize)]
pub struct MarkAttendanceRequest {
    athlete_id: Option<i64>,
    note: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub athlete_id: Option<i64>,
    pub status: Option<AttendanceStatus>,
    pub ignored: bool,
}

/// Toggles one athlete's status for today. A missing or unknown athlete
/// id is ignored rather than rejected, matching the form-post heritage of
/// this endpoint.
#[post("/attendance", data = "<request>")]
pub async fn api_mark_attendance(
    request: Json<MarkAttendanceRequest>,
    coach: Coach,
    config: &State<AppConfig>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MarkAttendanceResponse>, Status> {
    coach.require_permission(Permission::MarkAttendance)?;

    let today = config.local_today();

    let Some(athlete_id) = request.athlete_id else {
        return Ok(Json(MarkAttendanceResponse {
            athlete_id: None,
            status: None,
            ignored: true,
        }));
    };

    let status = toggle_attendance(db, athlete_id, &today, request.note.as_deref()).await?;

    Ok(Json(MarkAttendanceResponse {
        athlete_id: Some(athlete_id),
        ignored: status.is_none(),
        status,
    }))
}

// ---------------------------------------------------------------------------
// History & reporting

#[derive(Serialize, Deserialize)]
pub struct HistoryRowData {
    pub athlete_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct HistoryResponse {
    pub dates: Vec<String>,
    pub selected_date: String,
    pub selected_team_id: Option<i64>,
    pub rows: Vec<HistoryRowData>,
}

#[get("/history?<date>&<team_id>")]
pub async fn api_history(
    date: Option<String>,
    team_id: Option<i64>,
    coach: Coach,
    config: &State<AppConfig>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<HistoryResponse>, Status> {
    coach.require_permission(Permission::ViewHistory)?;

    let selected_date = match date {
        Some(date) => {
            validate_iso_date(&date)?;
            date
        }
        None => config.local_today(),
    };

    let dates = get_attendance_dates(db).await?;
    let rows = get_history_for_date(db, &selected_date, team_id).await?;

    Ok(Json(HistoryResponse {
        dates,
        selected_date,
        selected_team_id: team_id,
        rows: rows
            .into_iter()
            .map(|r| HistoryRowData {
                athlete_id: r.athlete_id,
                first_name: r.first_name,
                last_name: r.last_name,
                status: r.status,
                note: r.note,
            })
            .collect(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct FlaggedAthleteData {
    pub athlete_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub absence_count: i64,
}

impl From<FlaggedAthlete> for FlaggedAthleteData {
    fn from(f: FlaggedAthlete) -> Self {
        Self {
            athlete_id: f.athlete_id,
            first_name: f.first_name,
            last_name: f.last_name,
            absence_count: f.absence_count,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct FlaggedAthletesResponse {
    pub threshold: i64,
    pub flagged: Vec<FlaggedAthleteData>,
}

#[get("/flagged_athletes?<team_id>&<since>&<until>&<threshold>")]
pub async fn api_flagged_athletes(
    team_id: Option<i64>,
    since: Option<String>,
    until: Option<String>,
    threshold: Option<i64>,
    coach: Coach,
    config: &State<AppConfig>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<FlaggedAthletesResponse>, Status> {
    coach.require_permission(Permission::ViewReports)?;

    for bound in [&since, &until].into_iter().flatten() {
        validate_iso_date(bound)?;
    }

    let threshold = threshold.unwrap_or(config.absence_threshold);

    let flagged =
        get_flagged_athletes(db, threshold, team_id, since.as_deref(), until.as_deref()).await?;

    Ok(Json(FlaggedAthletesResponse {
        threshold,
        flagged: flagged.into_iter().map(FlaggedAthleteData::from).collect(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct AbsenceData {
    pub id: i64,
    pub date: String,
    pub note: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AbsencesResponse {
    pub athletes: Vec<AthleteData>,
    pub selected_athlete_id: Option<i64>,
    pub absences: Vec<AbsenceData>,
}

async fn absences_response(
    db: &Pool<Sqlite>,
    athlete_id: Option<i64>,
) -> Result<AbsencesResponse, AppError> {
    let athletes = get_athletes(db, None).await?;

    let absences = match athlete_id {
        Some(id) => get_absences_for_athlete(db, id)
            .await?
            .into_iter()
            .map(|a| AbsenceData {
                id: a.id,
                date: a.date,
                note: a.note,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(AbsencesResponse {
        athletes: athletes.into_iter().map(AthleteData::from).collect(),
        selected_athlete_id: athlete_id,
        absences,
    })
}

/// Read-only absence report for one athlete.
#[get("/athlete_report?<athlete_id>")]
pub async fn api_athlete_report(
    athlete_id: Option<i64>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AbsencesResponse>, Status> {
    coach.require_permission(Permission::ViewReports)?;
    Ok(Json(absences_response(db, athlete_id).await?))
}

#[get("/manage_absences?<athlete_id>")]
pub async fn api_manage_absences(
    athlete_id: Option<i64>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AbsencesResponse>, Status> {
    coach.require_permission(Permission::ManageAbsences)?;
    Ok(Json(absences_response(db, athlete_id).await?))
}

#[derive(Deserialize)]
pub struct DeleteAbsenceRequest {
    delete_id: i64,
    athlete_id: Option<i64>,
}

#[post("/manage_absences", data = "<request>")]
pub async fn api_delete_absence(
    request: Json<DeleteAbsenceRequest>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AbsencesResponse>, Status> {
    coach.require_permission(Permission::ManageAbsences)?;

    delete_attendance_record(db, request.delete_id).await?;

    Ok(Json(absences_response(db, request.athlete_id).await?))
}

// ---------------------------------------------------------------------------
// Roster

#[derive(Serialize, Deserialize)]
pub struct RosterResponse {
    pub athletes: Vec<AthleteData>,
    pub teams: Vec<TeamData>,
}

#[get("/manage_roster")]
pub async fn api_manage_roster(
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<RosterResponse>, Status> {
    coach.require_permission(Permission::ManageRoster)?;

    let athletes = get_athletes(db, None).await?;
    let teams = get_all_teams(db).await?;

    Ok(Json(RosterResponse {
        athletes: athletes.into_iter().map(AthleteData::from).collect(),
        teams: teams.into_iter().map(TeamData::from).collect(),
    }))
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RosterMutationRequest {
    Add {
        first_name: String,
        last_name: String,
        grade: Option<i64>,
        gender: Option<String>,
        team_id: Option<i64>,
    },
    Delete {
        athlete_id: i64,
    },
}

#[post("/manage_roster", data = "<request>")]
pub async fn api_mutate_roster(
    request: Json<RosterMutationRequest>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    coach
        .require_permission(Permission::ManageRoster)
        .map_err(|_| {
            Custom(
                Status::Forbidden,
                Json(ValidationResponse::with_error(
                    "permission",
                    "You don't have permission to manage the roster",
                )),
            )
        })?;

    match request.into_inner() {
        RosterMutationRequest::Add {
            first_name,
            last_name,
            grade,
            gender,
            team_id,
        } => {
            let first_name = first_name.trim().to_string();
            let last_name = last_name.trim().to_string();
            if first_name.is_empty() || last_name.is_empty() {
                return Err(Custom(
                    Status::UnprocessableEntity,
                    Json(ValidationResponse::with_error(
                        "name",
                        "First and last name are required",
                    )),
                ));
            }

            create_athlete(
                db,
                &first_name,
                &last_name,
                grade,
                gender.as_deref(),
                team_id,
            )
            .await
            .validate_custom()?;

            Ok(Status::Created)
        }
        RosterMutationRequest::Delete { athlete_id } => {
            delete_athlete(db, athlete_id).await.validate_custom()?;
            Ok(Status::Ok)
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct ImportCsvRequest {
    #[validate(length(min = 1, message = "CSV content is required"))]
    csv: String,
}

#[post("/import_csv", data = "<request>")]
pub async fn api_import_csv(
    request: Json<ImportCsvRequest>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<RosterImportReport>, Custom<Json<ValidationResponse>>> {
    coach
        .require_permission(Permission::ImportRoster)
        .map_err(|_| {
            Custom(
                Status::Forbidden,
                Json(ValidationResponse::with_error(
                    "permission",
                    "You don't have permission to import rosters",
                )),
            )
        })?;

    let validated = request.validate_custom()?;

    let report = import_roster_csv(db, &validated.csv).await.validate_custom()?;

    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Coaches & passwords

#[derive(Deserialize, Validate, Clone)]
pub struct AddCoachRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    team_id: Option<i64>,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    role: Option<String>,
}

#[get("/add_coach")]
pub async fn api_add_coach_form(
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TeamData>>, Status> {
    coach.require_permission(Permission::AddCoaches)?;

    let teams = get_all_teams(db).await?;
    Ok(Json(teams.into_iter().map(TeamData::from).collect()))
}

#[post("/add_coach", data = "<request>")]
pub async fn api_add_coach(
    request: Json<AddCoachRequest>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let role = validated.role.as_deref().unwrap_or("coach");
    match role {
        "admin" => coach
            .require_all_permissions(&[Permission::AddCoaches, Permission::EditCoachRoles])
            .map_err(Status::to_validation_response_status)?,
        _ => coach
            .require_permission(Permission::AddCoaches)
            .map_err(Status::to_validation_response_status)?,
    };

    let existing = find_coach_by_username(db, &validated.username)
        .await
        .validate_custom()?;

    if existing.is_some() {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "username",
                "Username already exists",
            )),
        ));
    }

    create_coach(
        db,
        &validated.name,
        &validated.username,
        &validated.password,
        role,
        validated.team_id,
        validated.email.as_deref(),
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

trait StatusValidationExt {
    fn to_validation_response_status(self) -> Custom<Json<ValidationResponse>>;
}

impl StatusValidationExt for Status {
    fn to_validation_response_status(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = if self == Status::Forbidden {
            (
                "permission",
                "You don't have permission to perform this action",
            )
        } else if self == Status::Unauthorized {
            ("authentication", "Authentication required")
        } else {
            ("error", "An error occurred")
        };
        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

#[get("/reset_password")]
pub async fn api_reset_password_form(
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CoachData>>, Status> {
    coach.require_permission(Permission::ResetPasswords)?;

    let coaches = get_all_coaches(db).await?;
    Ok(Json(coaches.into_iter().map(CoachData::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    coach_id: i64,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/reset_password", data = "<request>")]
pub async fn api_reset_password(
    request: Json<ResetPasswordRequest>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    coach
        .require_permission(Permission::ResetPasswords)
        .map_err(Status::to_validation_response_status)?;

    let validated = request.validate_custom()?;

    update_coach_password(db, validated.coach_id, &validated.new_password)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(email(message = "Invalid email address"))]
    email: String,
}

#[derive(Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
}

/// Mints a single-use reset token when username and email match a coach.
/// The response never reveals whether they did; delivery is out of band.
#[post("/forgot_password", data = "<request>")]
pub async fn api_forgot_password(
    request: Json<ForgotPasswordRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ForgotPasswordResponse>, Custom<Json<ValidationResponse>>> {
    use chrono::Utc;

    let validated = request.validate_custom()?;

    let coach = find_coach_by_username(db, &validated.username)
        .await
        .validate_custom()?;

    if let Some(coach) = coach {
        let email_matches = coach
            .email
            .as_deref()
            .map(|e| e.eq_ignore_ascii_case(validated.email.trim()))
            .unwrap_or(false);

        if email_matches {
            let token = CoachSession::generate_token();
            let expires_at = (Utc::now() + chrono::Duration::hours(1)).naive_utc();
            create_password_reset(db, coach.id, &token, expires_at)
                .await
                .validate_custom()?;
            tracing::info!(coach_id = coach.id, token = %token, "Password reset token issued");
        }
    }

    Ok(Json(ForgotPasswordResponse {
        message: "If the account exists, a reset link has been issued".to_string(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct CompleteResetRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/reset_password/<token>", data = "<request>")]
pub async fn api_complete_password_reset(
    token: &str,
    request: Json<CompleteResetRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let coach_id = crate::db::consume_password_reset(db, token)
        .await
        .validate_custom()?;

    update_coach_password(db, coach_id, &validated.new_password)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Admin export & seeding

#[get("/admin/export?<table>&<team_id>&<since>&<until>")]
pub async fn api_admin_export(
    table: Option<String>,
    team_id: Option<i64>,
    since: Option<String>,
    until: Option<String>,
    coach: Coach,
    db: &State<Pool<Sqlite>>,
) -> Result<ExportDownload, Status> {
    coach.require_permission(Permission::ExportData)?;

    for bound in [&since, &until].into_iter().flatten() {
        validate_iso_date(bound)?;
    }

    let filter = ExportFilter {
        team_id,
        since,
        until,
    };

    let table = table.unwrap_or_else(|| "all".to_string());
    let download = match table.as_str() {
        "teams" => ExportDownload {
            filename: timestamped_filename("teams", "csv"),
            content_type: rocket::http::ContentType::CSV,
            bytes: build_teams_csv(db).await?.into_bytes(),
        },
        "athletes" => ExportDownload {
            filename: timestamped_filename("athletes", "csv"),
            content_type: rocket::http::ContentType::CSV,
            bytes: build_athletes_csv(db, &filter).await?.into_bytes(),
        },
        "attendance" => ExportDownload {
            filename: timestamped_filename("attendance", "csv"),
            content_type: rocket::http::ContentType::CSV,
            bytes: build_attendance_csv(db, &filter).await?.into_bytes(),
        },
        "coaches" => ExportDownload {
            filename: timestamped_filename("coaches", "csv"),
            content_type: rocket::http::ContentType::CSV,
            bytes: build_coaches_csv(db).await?.into_bytes(),
        },
        "all" => ExportDownload {
            filename: timestamped_filename("export", "zip"),
            content_type: rocket::http::ContentType::ZIP,
            bytes: build_export_zip(db, &filter).await?,
        },
        other => {
            return Err(AppError::Validation(format!("Unknown export table: {}", other)).into());
        }
    };

    Ok(download)
}

#[derive(Serialize, Deserialize)]
pub struct SeedTeamsResponse {
    pub seeded: bool,
    pub message: String,
}

#[get("/seed_teams")]
pub async fn api_seed_teams(db: &State<Pool<Sqlite>>) -> Result<Json<SeedTeamsResponse>, Status> {
    let seeded = seed_default_teams(db).await?;

    Ok(Json(SeedTeamsResponse {
        seeded,
        message: if seeded {
            "Teams seeded".to_string()
        } else {
            "Teams already exist".to_string()
        },
    }))
}
