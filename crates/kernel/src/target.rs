use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Boxed error carried verbatim from whatever backs a [`SeedTarget`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Challenge-response variant used to verify a principal's secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthMechanism {
    #[serde(rename = "SCRAM-SHA-1")]
    ScramSha1,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
}

impl AuthMechanism {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScramSha1 => "SCRAM-SHA-1",
            Self::ScramSha256 => "SCRAM-SHA-256",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMechanism {
    type Err = TargetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SCRAM-SHA-1" => Ok(Self::ScramSha1),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            other => Err(TargetError::UnsupportedMechanism {
                mechanism: other.to_string(),
            }),
        }
    }
}

/// A role attached to a principal, scoped to one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Principal to be created on the administrative database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalSpec {
    pub name: String,
    #[serde(serialize_with = "redact")]
    pub secret: String,
    pub roles: Vec<RoleGrant>,
    pub mechanisms: Vec<AuthMechanism>,
}

/// Login material presented when authenticating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub user: String,
    #[serde(serialize_with = "redact")]
    pub secret: String,
    /// Database the principal is defined on.
    pub source_db: String,
    pub mechanisms: Vec<AuthMechanism>,
    pub digest_password: bool,
}

impl Credentials {
    /// The mechanism a session negotiates with: the first one listed.
    pub fn mechanism(&self) -> Result<AuthMechanism, TargetError> {
        self.mechanisms
            .first()
            .copied()
            .ok_or_else(|| TargetError::UnsupportedMechanism {
                mechanism: "<none>".to_string(),
            })
    }
}

/// Collection to be created inside an application database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub database: String,
    pub name: String,
    pub capped: bool,
}

/// Principal as reported back by a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalInfo {
    pub name: String,
    pub db: String,
    pub roles: Vec<RoleGrant>,
    pub mechanisms: Vec<String>,
}

/// Collection as reported back by a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub database: String,
    pub name: String,
    pub capped: bool,
    pub document_count: u64,
}

/// Errors raised by a [`SeedTarget`].
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("user '{user}' already exists on database '{db}'")]
    DuplicatePrincipal {
        user: String,
        db: String,
        #[source]
        source: BoxError,
    },

    #[error("unsupported authentication mechanism: {mechanism}")]
    UnsupportedMechanism { mechanism: String },

    #[error("authentication failed for user '{user}': {message}")]
    Authentication { user: String, message: String },

    #[error("collection '{db}.{name}' already exists")]
    DuplicateCollection {
        db: String,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error(transparent)]
    Driver(BoxError),
}

impl TargetError {
    pub fn driver(err: impl Into<BoxError>) -> Self {
        Self::Driver(err.into())
    }
}

/// A database session the seed runner drives.
///
/// Implementations own exactly one logical session. After a successful
/// [`authenticate`](SeedTarget::authenticate) every later call runs as the
/// authenticated principal.
#[async_trait]
pub trait SeedTarget: Send {
    /// Create `principal` on `admin_db`.
    async fn create_user(
        &mut self,
        admin_db: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), TargetError>;

    /// Authenticate this session with `credentials`.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TargetError>;

    /// Create an empty collection.
    async fn create_collection(&mut self, collection: &CollectionSpec) -> Result<(), TargetError>;

    /// Look up a principal by name.
    async fn principal(
        &mut self,
        admin_db: &str,
        name: &str,
    ) -> Result<Option<PrincipalInfo>, TargetError>;

    /// Look up a collection and count its documents.
    async fn collection(
        &mut self,
        database: &str,
        name: &str,
    ) -> Result<Option<CollectionInfo>, TargetError>;
}

fn redact<T: ?Sized, S: Serializer>(_secret: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanism_names_round_trip_through_from_str() {
        for mechanism in [AuthMechanism::ScramSha1, AuthMechanism::ScramSha256] {
            assert_eq!(mechanism.as_str().parse::<AuthMechanism>().unwrap(), mechanism);
        }
    }

    #[test]
    fn unknown_mechanism_is_unsupported() {
        let err = "MONGODB-X509".parse::<AuthMechanism>().unwrap_err();
        assert!(matches!(
            err,
            TargetError::UnsupportedMechanism { ref mechanism } if mechanism == "MONGODB-X509"
        ));
    }

    #[test]
    fn credentials_without_mechanisms_are_rejected() {
        let credentials = Credentials {
            user: "tgfp".to_string(),
            secret: "pw".to_string(),
            source_db: "admin".to_string(),
            mechanisms: vec![],
            digest_password: true,
        };
        assert!(credentials.mechanism().is_err());
    }

    #[test]
    fn duplicate_errors_keep_the_server_error_as_source() {
        use std::error::Error as _;

        let err = TargetError::DuplicatePrincipal {
            user: "tgfp".to_string(),
            db: "admin".to_string(),
            source: "Command failed with error 51003 (Location51003): 'User \"tgfp@admin\" already exists'".into(),
        };

        assert_eq!(err.to_string(), "user 'tgfp' already exists on database 'admin'");
        let source = err.source().unwrap().to_string();
        assert!(source.contains("51003"), "{source}");
        assert!(source.contains("User \"tgfp@admin\" already exists"), "{source}");
    }

    #[test]
    fn role_grant_displays_as_role_at_db() {
        let grant = RoleGrant::new("userAdminAnyDatabase", "admin");
        assert_eq!(grant.to_string(), "userAdminAnyDatabase@admin");
    }
}
