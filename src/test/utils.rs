#[cfg(test)]
pub mod test_utils {
    use crate::db::{create_athlete, create_coach, create_team};
    use crate::error::AppError;
    use crate::models::AttendanceStatus;
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        teams: Vec<String>,
        athletes: Vec<TestAthlete>,
        coaches: Vec<TestCoach>,
        attendance: Vec<TestAttendance>,
    }

    pub struct TestAthlete {
        pub first_name: String,
        pub last_name: String,
        pub grade: Option<i64>,
        pub gender: Option<String>,
        pub team_name: Option<String>,
    }

    pub struct TestCoach {
        pub name: String,
        pub username: String,
        pub role: String,
        pub team_name: Option<String>,
        pub email: Option<String>,
        pub password: String,
    }

    pub struct TestAttendance {
        pub athlete: String,
        pub date: String,
        pub status: AttendanceStatus,
        pub note: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn team(mut self, name: &str) -> Self {
            self.teams.push(name.to_string());
            self
        }

        pub fn athlete(mut self, first_name: &str, last_name: &str, team: Option<&str>) -> Self {
            self.athletes.push(TestAthlete {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                grade: None,
                gender: None,
                team_name: team.map(String::from),
            });
            self
        }

        pub fn coach(mut self, username: &str, name: &str) -> Self {
            self.coaches.push(TestCoach {
                name: name.to_string(),
                username: username.to_string(),
                role: "coach".to_string(),
                team_name: None,
                email: None,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(mut self, username: &str, name: &str) -> Self {
            self.coaches.push(TestCoach {
                name: name.to_string(),
                username: username.to_string(),
                role: "admin".to_string(),
                team_name: None,
                email: None,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn coach_with_email(mut self, username: &str, name: &str, email: &str) -> Self {
            self.coaches.push(TestCoach {
                name: name.to_string(),
                username: username.to_string(),
                role: "coach".to_string(),
                team_name: None,
                email: Some(email.to_string()),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        /// Athlete key is `"First Last"` as passed to `athlete`.
        pub fn attendance(
            mut self,
            athlete: &str,
            date: &str,
            status: AttendanceStatus,
            note: Option<&str>,
        ) -> Self {
            self.attendance.push(TestAttendance {
                athlete: athlete.to_string(),
                date: date.to_string(),
                status,
                note: note.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            // A pool wider than one connection would hand each connection
            // its own empty in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut team_id_map: HashMap<String, i64> = HashMap::new();
            let mut athlete_id_map: HashMap<String, i64> = HashMap::new();
            let mut coach_id_map: HashMap<String, i64> = HashMap::new();

            for team in &self.teams {
                let team_id = create_team(&pool, team).await?;
                team_id_map.insert(team.clone(), team_id);
            }

            for athlete in &self.athletes {
                let team_id = athlete
                    .team_name
                    .as_ref()
                    .and_then(|name| team_id_map.get(name).copied());

                let athlete_id = create_athlete(
                    &pool,
                    &athlete.first_name,
                    &athlete.last_name,
                    athlete.grade,
                    athlete.gender.as_deref(),
                    team_id,
                )
                .await?;

                athlete_id_map.insert(
                    format!("{} {}", athlete.first_name, athlete.last_name),
                    athlete_id,
                );
            }

            for coach in &self.coaches {
                let team_id = coach
                    .team_name
                    .as_ref()
                    .and_then(|name| team_id_map.get(name).copied());

                let coach_id = create_coach(
                    &pool,
                    &coach.name,
                    &coach.username,
                    &coach.password,
                    &coach.role,
                    team_id,
                    coach.email.as_deref(),
                )
                .await?;

                coach_id_map.insert(coach.username.clone(), coach_id);
            }

            for entry in &self.attendance {
                let athlete_id = athlete_id_map
                    .get(&entry.athlete)
                    .copied()
                    .ok_or_else(|| {
                        AppError::Validation(format!("Unknown test athlete: {}", entry.athlete))
                    })?;

                sqlx::query(
                    "INSERT INTO attendance (athlete_id, date, status, note) VALUES (?, ?, ?, ?)",
                )
                .bind(athlete_id)
                .bind(&entry.date)
                .bind(entry.status.as_str())
                .bind(&entry.note)
                .execute(&pool)
                .await?;
            }

            Ok(TestDb {
                pool,
                team_id_map,
                athlete_id_map,
                coach_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub team_id_map: HashMap<String, i64>,
        pub athlete_id_map: HashMap<String, i64>,
        pub coach_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn team_id(&self, name: &str) -> Option<i64> {
            self.team_id_map.get(name).copied()
        }

        pub fn athlete_id(&self, full_name: &str) -> Option<i64> {
            self.athlete_id_map.get(full_name).copied()
        }

        pub fn coach_id(&self, username: &str) -> Option<i64> {
            self.coach_id_map.get(username).copied()
        }

        pub async fn attendance_count(
            &self,
            athlete_id: i64,
            date: &str,
        ) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM attendance WHERE athlete_id = ? AND date = ?",
            )
            .bind(athlete_id)
            .bind(date)
            .fetch_one(&self.pool)
            .await
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .team("Undercut")
            .team("Chicane")
            .athlete("Ava", "Jones", Some("Undercut"))
            .athlete("Ben", "Ortiz", Some("Undercut"))
            .athlete("Cara", "Diaz", Some("Chicane"))
            .athlete("Dan", "Reyes", None)
            .coach("coach_user", "Coach User")
            .admin("admin_user", "Admin User")
            .build()
            .await
            .expect("Failed to build test DB")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = crate::init_rocket(test_db.pool.clone());
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build test client");
        (client, test_db)
    }

    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .iter()
            .map(|cookie| cookie.clone().into_owned())
            .collect()
    }
}
