use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

pub struct CoachSession {
    pub id: i64,
    pub coach_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachSession {
    pub id: Option<i64>,
    pub coach_id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbCoachSession> for CoachSession {
    fn from(session: DbCoachSession) -> Self {
        Self {
            id: session.id.unwrap_or_default(),
            coach_id: session.coach_id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or_else(|| Utc::now().naive_utc()),
            expires_at: session.expires_at.unwrap_or_else(|| Utc::now().naive_utc()),
        }
    }
}

impl CoachSession {
    pub fn generate_token() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
