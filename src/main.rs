#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod csv;
mod db;
mod env;
mod error;
mod export;
mod models;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use api::{
    api_add_coach, api_add_coach_form, api_admin_export, api_athlete_report, api_attendance,
    api_complete_password_reset, api_delete_absence, api_flagged_athletes, api_forgot_password,
    api_history, api_home, api_import_csv, api_login, api_logout, api_manage_absences,
    api_manage_roster, api_mark_attendance, api_me, api_me_unauthorized, api_mutate_roster,
    api_reset_password, api_reset_password_form, api_seed_teams, health,
};
use auth::unauthorized_api;
use db::{clean_expired_sessions, seed_default_coach, seed_default_teams};
use env::AppConfig;
use error::AppError;
use rocket::{Build, Rocket, tokio};
use telemetry::TelemetryFairing;
use telemetry::init_tracing;
use thiserror::Error;

use sqlx::SqlitePool;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

#[launch]
async fn rocket() -> _ {
    init_tracing();

    if let Err(e) = env::load_environment() {
        warn!("Failed to load environment files: {}", e);
    }

    let database_url = std::env::var("DATABASE_URL").unwrap_or_default();

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    match seed_default_coach(&pool).await {
        Ok(true) => info!("Seeded default admin coach"),
        Ok(false) => {}
        Err(e) => error!("Failed to seed default coach: {}", e),
    }

    match seed_default_teams(&pool).await {
        Ok(true) => info!("Seeded default teams"),
        Ok(false) => {}
        Err(e) => error!("Failed to seed default teams: {}", e),
    }

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(pool)
}

pub fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting attendance tracker");

    rocket::build()
        .manage(pool)
        .manage(AppConfig::from_env())
        .mount(
            "/api",
            routes![
                api_home,
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_attendance,
                api_mark_attendance,
                api_history,
                api_flagged_athletes,
                api_athlete_report,
                api_manage_absences,
                api_delete_absence,
                api_manage_roster,
                api_mutate_roster,
                api_import_csv,
                api_add_coach_form,
                api_add_coach,
                api_reset_password_form,
                api_reset_password,
                api_forgot_password,
                api_complete_password_reset,
                api_admin_export,
                api_seed_teams,
            ],
        )
        .register("/api", catchers![unauthorized_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
