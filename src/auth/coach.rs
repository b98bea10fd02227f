use rocket::http::Status;
use serde::Serialize;

use super::{Permission, Role};

/// The authenticated principal. Every gated route takes a `Coach` request
/// guard; permission checks go through the role's permission set.
#[derive(Debug, Serialize, Clone)]
pub struct Coach {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub email: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoach {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub team_id: Option<i64>,
    pub email: Option<String>,
}

impl From<DbCoach> for Coach {
    fn from(coach: DbCoach) -> Self {
        Self {
            id: coach.id.unwrap_or_default(),
            name: coach.name.unwrap_or_default(),
            username: coach.username.unwrap_or_default(),
            role: Role::from_str(&coach.role.unwrap_or_default()).unwrap_or(Role::Coach),
            team_id: coach.team_id,
            email: coach.email,
        }
    }
}

impl Coach {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn require_all_permissions(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().all(|p| self.role.has_permission(*p)) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permissions = ?permissions,
                "Permission denied (require all)"
            );
            Err(Status::Forbidden)
        }
    }
}
