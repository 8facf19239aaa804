//! In-process model of a document server, used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tgfp_kernel::{
    AuthMechanism, CollectionInfo, CollectionSpec, Credentials, PrincipalInfo, PrincipalSpec,
    SeedTarget, TargetError,
};

#[derive(Debug, Clone)]
struct StoredUser {
    secret: String,
    roles: Vec<tgfp_kernel::RoleGrant>,
    mechanisms: Vec<AuthMechanism>,
}

#[derive(Debug, Clone)]
struct StoredCollection {
    capped: bool,
    documents: u64,
}

#[derive(Debug, Default)]
struct ServerState {
    /// Keyed by `(db, user)`.
    users: BTreeMap<(String, String), StoredUser>,
    /// Keyed by `(db, collection)`.
    collections: BTreeMap<(String, String), StoredCollection>,
}

/// Shared server state. Each [`MemoryServer::connect`] opens a new session
/// against the same users and collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an unauthenticated session.
    pub fn connect(&self) -> MemoryTarget {
        MemoryTarget {
            state: Arc::clone(&self.state),
            authenticated_as: None,
        }
    }

    /// Number of principals defined on `db`.
    pub fn user_count(&self, db: &str) -> usize {
        self.lock().users.keys().filter(|(d, _)| d == db).count()
    }

    /// Names of the collections in `db`, sorted.
    pub fn collection_names(&self, db: &str) -> Vec<String> {
        self.lock()
            .collections
            .keys()
            .filter(|(d, _)| d == db)
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session on a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryTarget {
    state: Arc<Mutex<ServerState>>,
    authenticated_as: Option<(String, String)>,
}

impl MemoryTarget {
    /// `(db, user)` this session authenticated as, if any.
    pub fn authenticated_as(&self) -> Option<(&str, &str)> {
        self.authenticated_as
            .as_ref()
            .map(|(db, user)| (db.as_str(), user.as_str()))
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SeedTarget for MemoryTarget {
    async fn create_user(
        &mut self,
        admin_db: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), TargetError> {
        if principal.mechanisms.is_empty() {
            return Err(TargetError::driver("mechanisms field must not be empty"));
        }

        let mut state = self.lock();
        let key = (admin_db.to_string(), principal.name.clone());
        if state.users.contains_key(&key) {
            return Err(TargetError::DuplicatePrincipal {
                user: principal.name.clone(),
                db: admin_db.to_string(),
                source: format!("User \"{}@{}\" already exists", principal.name, admin_db).into(),
            });
        }

        state.users.insert(
            key,
            StoredUser {
                secret: principal.secret.clone(),
                roles: principal.roles.clone(),
                mechanisms: principal.mechanisms.clone(),
            },
        );
        Ok(())
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TargetError> {
        let mechanism = credentials.mechanism()?;
        let failed = |message: &str| TargetError::Authentication {
            user: credentials.user.clone(),
            message: message.to_string(),
        };

        let state = self.lock();
        let user = state
            .users
            .get(&(credentials.source_db.clone(), credentials.user.clone()))
            .ok_or_else(|| failed("user not found"))?;

        if !user.mechanisms.contains(&mechanism) {
            return Err(failed(&format!(
                "mechanism {mechanism} is not enabled for this user"
            )));
        }
        // SCRAM-SHA-1 proofs are computed over the client-side digest.
        if mechanism == AuthMechanism::ScramSha1 && !credentials.digest_password {
            return Err(failed("SCRAM-SHA-1 requires a digested password"));
        }
        if user.secret != credentials.secret {
            return Err(failed("password mismatch"));
        }
        drop(state);

        self.authenticated_as = Some((credentials.source_db.clone(), credentials.user.clone()));
        Ok(())
    }

    async fn create_collection(&mut self, collection: &CollectionSpec) -> Result<(), TargetError> {
        let mut state = self.lock();
        let key = (collection.database.clone(), collection.name.clone());
        if state.collections.contains_key(&key) {
            return Err(TargetError::DuplicateCollection {
                db: collection.database.clone(),
                name: collection.name.clone(),
                source: format!(
                    "Collection {}.{} already exists. NamespaceExists",
                    collection.database, collection.name
                )
                .into(),
            });
        }

        state.collections.insert(
            key,
            StoredCollection {
                capped: collection.capped,
                documents: 0,
            },
        );
        Ok(())
    }

    async fn principal(
        &mut self,
        admin_db: &str,
        name: &str,
    ) -> Result<Option<PrincipalInfo>, TargetError> {
        let state = self.lock();
        Ok(state
            .users
            .get(&(admin_db.to_string(), name.to_string()))
            .map(|user| PrincipalInfo {
                name: name.to_string(),
                db: admin_db.to_string(),
                roles: user.roles.clone(),
                mechanisms: user
                    .mechanisms
                    .iter()
                    .map(|mechanism| mechanism.as_str().to_string())
                    .collect(),
            }))
    }

    async fn collection(
        &mut self,
        database: &str,
        name: &str,
    ) -> Result<Option<CollectionInfo>, TargetError> {
        let state = self.lock();
        Ok(state
            .collections
            .get(&(database.to_string(), name.to_string()))
            .map(|collection| CollectionInfo {
                database: database.to_string(),
                name: name.to_string(),
                capped: collection.capped,
                document_count: collection.documents,
            }))
    }
}
