use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    MarkAttendance,
    ViewHistory,
    ViewReports,
    ManageRoster,
    ImportRoster,
    ManageAbsences,
    AddCoaches,

    ResetPasswords,
    EditCoachRoles,
    ExportData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Coach,
    Admin,
}

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::MarkAttendance);
    permissions.insert(Permission::ViewHistory);
    permissions.insert(Permission::ViewReports);
    permissions.insert(Permission::ManageRoster);
    permissions.insert(Permission::ImportRoster);
    permissions.insert(Permission::ManageAbsences);
    permissions.insert(Permission::AddCoaches);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COACH_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ResetPasswords);
    permissions.insert(Permission::EditCoachRoles);
    permissions.insert(Permission::ExportData);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Coach => &COACH_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Coach => "coach",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "coach" => Ok(Role::Coach),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
