//! MongoDB-backed seed target.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::{
    bson::{self, doc, Document},
    error::{Error as MongoError, ErrorKind},
    options::{AuthMechanism as DriverMechanism, ClientOptions, Credential},
    results::CollectionSpecification,
    Client,
};
use serde::Deserialize;
use tgfp_kernel::{
    settings::DatabaseSettings, AuthMechanism, CollectionInfo, CollectionSpec, Credentials,
    PrincipalInfo, PrincipalSpec, RoleGrant, SeedTarget, TargetError,
};

const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
const NAMESPACE_EXISTS: i32 = 48;
const USER_ALREADY_EXISTS: i32 = 51003;

/// One logical session against a MongoDB deployment.
///
/// Authenticating swaps the underlying client for one carrying the
/// credential, so every later operation runs as that principal.
pub struct MongoTarget {
    options: ClientOptions,
    client: Client,
    authenticated_as: Option<String>,
}

impl MongoTarget {
    /// Build a client from `settings`. No network round trip happens until
    /// the first operation.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, TargetError> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .map_err(TargetError::driver)?;
        options.app_name = Some(settings.app_name.clone());
        options.connect_timeout = Some(Duration::from_millis(settings.connect_timeout_ms));
        options.server_selection_timeout =
            Some(Duration::from_millis(settings.server_selection_timeout_ms));

        let client = Client::with_options(options.clone()).map_err(TargetError::driver)?;

        tracing::debug!(
            target: "tgfp-db",
            hosts = ?options.hosts,
            app_name = %settings.app_name,
            "mongodb client created"
        );

        Ok(Self {
            options,
            client,
            authenticated_as: None,
        })
    }

    pub fn authenticated_as(&self) -> Option<&str> {
        self.authenticated_as.as_deref()
    }
}

#[async_trait]
impl SeedTarget for MongoTarget {
    async fn create_user(
        &mut self,
        admin_db: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), TargetError> {
        let roles: Vec<Document> = principal
            .roles
            .iter()
            .map(|grant| doc! { "role": &grant.role, "db": &grant.db })
            .collect();
        let mechanisms: Vec<&str> = principal
            .mechanisms
            .iter()
            .map(|mechanism| mechanism.as_str())
            .collect();

        let command = doc! {
            "createUser": &principal.name,
            "pwd": &principal.secret,
            "roles": roles,
            "mechanisms": mechanisms,
        };

        self.client
            .database(admin_db)
            .run_command(command)
            .await
            .map_err(|err| match command_code(&err) {
                Some(USER_ALREADY_EXISTS) => TargetError::DuplicatePrincipal {
                    user: principal.name.clone(),
                    db: admin_db.to_string(),
                    source: err.into(),
                },
                _ => classify(err),
            })?;

        Ok(())
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TargetError> {
        let mechanism = credentials.mechanism()?;
        if mechanism == AuthMechanism::ScramSha1 && !credentials.digest_password {
            return Err(TargetError::Authentication {
                user: credentials.user.clone(),
                message: "SCRAM-SHA-1 requires a digested password".to_string(),
            });
        }

        let credential = Credential::builder()
            .username(credentials.user.clone())
            .password(credentials.secret.clone())
            .source(credentials.source_db.clone())
            .mechanism(driver_mechanism(mechanism))
            .build();

        let mut options = self.options.clone();
        options.credential = Some(credential);
        let client = Client::with_options(options).map_err(TargetError::driver)?;

        // The handshake only happens on first use; force it here.
        client
            .database(&credentials.source_db)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| {
                if is_authentication_failure(&err) {
                    TargetError::Authentication {
                        user: credentials.user.clone(),
                        message: err.to_string(),
                    }
                } else {
                    classify(err)
                }
            })?;

        self.client = client;
        self.authenticated_as = Some(credentials.user.clone());
        Ok(())
    }

    async fn create_collection(&mut self, collection: &CollectionSpec) -> Result<(), TargetError> {
        self.client
            .database(&collection.database)
            .create_collection(&collection.name)
            .capped(collection.capped)
            .await
            .map_err(|err| match command_code(&err) {
                Some(NAMESPACE_EXISTS) => TargetError::DuplicateCollection {
                    db: collection.database.clone(),
                    name: collection.name.clone(),
                    source: err.into(),
                },
                _ => classify(err),
            })
    }

    async fn principal(
        &mut self,
        admin_db: &str,
        name: &str,
    ) -> Result<Option<PrincipalInfo>, TargetError> {
        let reply = self
            .client
            .database(admin_db)
            .run_command(doc! { "usersInfo": { "user": name, "db": admin_db } })
            .await
            .map_err(classify)?;

        let reply: UsersInfoReply = bson::from_document(reply).map_err(TargetError::driver)?;

        Ok(reply.users.into_iter().next().map(|user| PrincipalInfo {
            name: user.user,
            db: user.db,
            roles: user
                .roles
                .into_iter()
                .map(|role| RoleGrant::new(role.role, role.db))
                .collect(),
            mechanisms: user.mechanisms,
        }))
    }

    async fn collection(
        &mut self,
        database: &str,
        name: &str,
    ) -> Result<Option<CollectionInfo>, TargetError> {
        let db = self.client.database(database);
        let mut cursor = db
            .list_collections()
            .filter(doc! { "name": name })
            .await
            .map_err(classify)?;

        if !cursor.advance().await.map_err(classify)? {
            return Ok(None);
        }
        let spec: CollectionSpecification = cursor.deserialize_current().map_err(classify)?;

        let document_count = db
            .collection::<Document>(name)
            .count_documents(doc! {})
            .await
            .map_err(classify)?;

        Ok(Some(CollectionInfo {
            database: database.to_string(),
            name: spec.name,
            capped: spec.options.capped.unwrap_or(false),
            document_count,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UsersInfoReply {
    #[serde(default)]
    users: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    user: String,
    db: String,
    #[serde(default)]
    roles: Vec<RoleEntry>,
    #[serde(default)]
    mechanisms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    role: String,
    db: String,
}

fn driver_mechanism(mechanism: AuthMechanism) -> DriverMechanism {
    match mechanism {
        AuthMechanism::ScramSha1 => DriverMechanism::ScramSha1,
        AuthMechanism::ScramSha256 => DriverMechanism::ScramSha256,
    }
}

fn command_code(err: &MongoError) -> Option<i32> {
    match &*err.kind {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn is_authentication_failure(err: &MongoError) -> bool {
    matches!(&*err.kind, ErrorKind::Authentication { .. })
        || command_code(err) == Some(AUTHENTICATION_FAILED)
}

/// Map driver errors that need no per-operation context.
fn classify(err: MongoError) -> TargetError {
    if command_code(&err) == Some(UNAUTHORIZED) {
        return TargetError::Unauthorized {
            message: err.to_string(),
        };
    }
    TargetError::driver(err)
}
