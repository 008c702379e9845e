use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{
    AadObjectId, DatabaseId, DatabasePrincipalId, LoginId, PermissionName, ServerPrincipalId,
};

/// Longest name SQL Server accepts for a `sysname`.
pub const MAX_NAME_LEN: usize = 128;

pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Kind of database user, mirrored from `sys.database_principals.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// `S`: mapped to a SQL login.
    Sql,
    /// `U`: Windows user.
    Windows,
    /// `G`: Windows group.
    WindowsGroup,
    /// `E`: Azure AD user or service principal.
    AzureAd,
    /// `X`: Azure AD group.
    AzureAdGroup,
}

impl UserType {
    pub fn from_code(code: &str) -> Option<UserType> {
        match code.trim() {
            "S" => Some(UserType::Sql),
            "U" => Some(UserType::Windows),
            "G" => Some(UserType::WindowsGroup),
            "E" => Some(UserType::AzureAd),
            "X" => Some(UserType::AzureAdGroup),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            UserType::Sql => "S",
            UserType::Windows => "U",
            UserType::WindowsGroup => "G",
            UserType::AzureAd => "E",
            UserType::AzureAdGroup => "X",
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, UserType::AzureAd | UserType::AzureAdGroup)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Sql => write!(f, "SQL user"),
            UserType::Windows => write!(f, "Windows user"),
            UserType::WindowsGroup => write!(f, "Windows group"),
            UserType::AzureAd => write!(f, "Azure AD user"),
            UserType::AzureAdGroup => write!(f, "Azure AD group"),
        }
    }
}

/// Any database principal type, including roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User(UserType),
    DatabaseRole,
    ApplicationRole,
}

impl PrincipalType {
    pub fn from_code(code: &str) -> Option<PrincipalType> {
        match code.trim() {
            "R" => Some(PrincipalType::DatabaseRole),
            "A" => Some(PrincipalType::ApplicationRole),
            other => UserType::from_code(other).map(PrincipalType::User),
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalType::User(t) => write!(f, "{t}"),
            PrincipalType::DatabaseRole => write!(f, "database role"),
            PrincipalType::ApplicationRole => write!(f, "application role"),
        }
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub name: String,
    /// `None` on create means the server default collation.
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSettings {
    pub name: String,
    pub owner_id: DatabasePrincipalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRoleSettings {
    pub name: String,
    pub owner_id: DatabasePrincipalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub name: String,
    pub user_type: UserType,
    /// Set for [`UserType::Sql`].
    pub login_id: Option<LoginId>,
    /// Set for external users; for service principals this is the client id.
    pub aad_object_id: Option<AadObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRoleSettings {
    pub name: String,
    pub owner_id: ServerPrincipalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlLoginSettings {
    pub name: String,
    /// Write-only; never populated when read back from the server.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub must_change_password: bool,
    pub default_database_id: DatabaseId,
    pub default_language: Option<String>,
    pub check_password_expiration: bool,
    pub check_password_policy: bool,
}

impl SqlLoginSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)?;
        if self.must_change_password
            && !(self.check_password_expiration && self.check_password_policy)
        {
            return Err(DomainError::InvalidConfig(
                "must_change_password requires check_password_expiration and check_password_policy"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: PermissionName,
    pub with_grant_option: bool,
}
