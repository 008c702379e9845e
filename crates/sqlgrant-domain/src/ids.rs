use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::DomainError;

// ── Numeric identifiers ──────────────────────────────────────────────────────

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl $name {
            pub fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().parse::<i32>() {
                    Ok(v) if v >= 0 => Ok($name(v)),
                    _ => Err(DomainError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

numeric_id!(
    /// `sys.databases.database_id`.
    DatabaseId,
    "database"
);
numeric_id!(
    /// `sys.schemas.schema_id`.
    SchemaId,
    "schema"
);
numeric_id!(
    /// `principal_id` of a database principal of type `R`.
    DatabaseRoleId,
    "database role"
);
numeric_id!(
    /// `principal_id` of a database user.
    UserId,
    "user"
);
numeric_id!(
    /// Any database principal: user, role or application role.
    DatabasePrincipalId,
    "database principal"
);
numeric_id!(
    /// `principal_id` of a server principal of type `R`.
    ServerRoleId,
    "server role"
);
numeric_id!(
    /// Any server principal: login or server role.
    ServerPrincipalId,
    "server principal"
);

impl DatabaseId {
    pub const MASTER: DatabaseId = DatabaseId(1);
}

impl DatabasePrincipalId {
    /// No explicit principal; DDL falls back to the connected user.
    pub const EMPTY: DatabasePrincipalId = DatabasePrincipalId(-1);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl Default for DatabasePrincipalId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl ServerPrincipalId {
    pub const EMPTY: ServerPrincipalId = ServerPrincipalId(-1);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl Default for ServerPrincipalId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<DatabaseRoleId> for DatabasePrincipalId {
    fn from(id: DatabaseRoleId) -> Self {
        DatabasePrincipalId(id.0)
    }
}

impl From<UserId> for DatabasePrincipalId {
    fn from(id: UserId) -> Self {
        DatabasePrincipalId(id.0)
    }
}

impl From<ServerRoleId> for ServerPrincipalId {
    fn from(id: ServerRoleId) -> Self {
        ServerPrincipalId(id.0)
    }
}

// ── Azure AD identifiers ─────────────────────────────────────────────────────

macro_rules! guid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(uuid: Uuid) -> Self {
                $name(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Reinterpret a 16-byte SID the way SQL Server converts
            /// `VARBINARY` to `UNIQUEIDENTIFIER`.
            pub fn from_sid(sid: &[u8]) -> Result<Self, DomainError> {
                Uuid::from_slice_le(sid)
                    .map($name)
                    .map_err(|_| DomainError::InvalidSid(format!("0x{}", hex::encode_upper(sid))))
            }

            /// SID bytes SQL Server stores for this external principal.
            pub fn to_sid(&self) -> [u8; 16] {
                self.0.to_bytes_le()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut buf = Uuid::encode_buffer();
                f.write_str(self.0.hyphenated().encode_upper(&mut buf))
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map($name)
                    .map_err(|_| DomainError::InvalidObjectId(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

guid_id!(
    /// Object id of an Azure AD user or group.
    AadObjectId
);
guid_id!(
    /// Application (client) id of an Azure AD service principal.
    ClientId
);

// ── Login SID ────────────────────────────────────────────────────────────────

/// Login identifier: the login SID rendered as `0x`-prefixed upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoginId(String);

impl LoginId {
    pub fn from_sid(sid: &[u8]) -> Self {
        LoginId(format!("0x{}", hex::encode_upper(sid)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn sid(&self) -> Vec<u8> {
        // Validated on construction.
        hex::decode(&self.0[2..]).unwrap_or_default()
    }
}

impl fmt::Display for LoginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LoginId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .or_else(|| s.trim().strip_prefix("0X"))
            .ok_or_else(|| DomainError::InvalidSid(s.to_string()))?;
        let bytes = hex::decode(digits).map_err(|_| DomainError::InvalidSid(s.to_string()))?;
        if bytes.is_empty() || bytes.len() > 85 {
            return Err(DomainError::InvalidSid(s.to_string()));
        }
        Ok(LoginId::from_sid(&bytes))
    }
}

impl Serialize for LoginId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LoginId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Permission names ─────────────────────────────────────────────────────────

/// Database permission keyword such as `SELECT` or `ALTER ANY USER`.
///
/// Permission names are spliced into GRANT/REVOKE statements verbatim, so
/// only upper-case words separated by single spaces are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionName(String);

impl PermissionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PermissionName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let valid = !upper.is_empty()
            && upper
                .split(' ')
                .all(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_uppercase()));
        if valid {
            Ok(PermissionName(upper))
        } else {
            Err(DomainError::InvalidPermission(s.to_string()))
        }
    }
}

impl Serialize for PermissionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PermissionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Composite resource ids ───────────────────────────────────────────────────

fn split_exact<'a>(
    s: &'a str,
    n: usize,
    expected: &'static str,
) -> Result<Vec<&'a str>, DomainError> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return Err(DomainError::InvalidResourceId {
            id: s.to_string(),
            expected,
        });
    }
    Ok(parts)
}

/// `<database_id>/<object_id>`: the external key of every database-scoped object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatabaseScoped<T> {
    pub database_id: DatabaseId,
    pub object_id: T,
}

impl<T> DatabaseScoped<T> {
    pub fn new(database_id: DatabaseId, object_id: T) -> Self {
        Self { database_id, object_id }
    }
}

impl<T: fmt::Display> fmt::Display for DatabaseScoped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database_id, self.object_id)
    }
}

impl<T: FromStr<Err = DomainError>> FromStr for DatabaseScoped<T> {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(s, 2, "<database_id>/<object_id>")?;
        Ok(Self {
            database_id: parts[0].parse()?,
            object_id: parts[1].parse()?,
        })
    }
}

/// `<database_id>/<role_id>/<member_id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleMemberId {
    pub database_id: DatabaseId,
    pub role_id: DatabaseRoleId,
    pub member_id: DatabasePrincipalId,
}

impl fmt::Display for RoleMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.database_id, self.role_id, self.member_id)
    }
}

impl FromStr for RoleMemberId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(s, 3, "<database_id>/<role_id>/<member_id>")?;
        Ok(Self {
            database_id: parts[0].parse()?,
            role_id: parts[1].parse()?,
            member_id: parts[2].parse()?,
        })
    }
}

/// `<role_id>/<member_id>` for server role membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerRoleMemberId {
    pub role_id: ServerRoleId,
    pub member_id: ServerPrincipalId,
}

impl fmt::Display for ServerRoleMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role_id, self.member_id)
    }
}

impl FromStr for ServerRoleMemberId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(s, 2, "<role_id>/<member_id>")?;
        Ok(Self {
            role_id: parts[0].parse()?,
            member_id: parts[1].parse()?,
        })
    }
}

/// `<database_id>/<principal_id>/<permission>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabasePermissionId {
    pub database_id: DatabaseId,
    pub principal_id: DatabasePrincipalId,
    pub permission: PermissionName,
}

impl fmt::Display for DatabasePermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.database_id, self.principal_id, self.permission)
    }
}

impl FromStr for DatabasePermissionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(s, 3, "<database_id>/<principal_id>/<permission>")?;
        Ok(Self {
            database_id: parts[0].parse()?,
            principal_id: parts[1].parse()?,
            permission: parts[2].parse()?,
        })
    }
}

/// `<database_id>/<schema_id>/<principal_id>/<permission>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaPermissionId {
    pub database_id: DatabaseId,
    pub schema_id: SchemaId,
    pub principal_id: DatabasePrincipalId,
    pub permission: PermissionName,
}

impl fmt::Display for SchemaPermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.database_id, self.schema_id, self.principal_id, self.permission
        )
    }
}

impl FromStr for SchemaPermissionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(s, 4, "<database_id>/<schema_id>/<principal_id>/<permission>")?;
        Ok(Self {
            database_id: parts[0].parse()?,
            schema_id: parts[1].parse()?,
            principal_id: parts[2].parse()?,
            permission: parts[3].parse()?,
        })
    }
}
