use serde::Serialize;
use tgfp_kernel::{AuthMechanism, CollectionSpec, Credentials, PrincipalSpec, RoleGrant};

pub const ADMIN_DB: &str = "admin";
pub const PRINCIPAL_NAME: &str = "tgfp";
pub const PRINCIPAL_SECRET: &str = "test_data_pw";
pub const PRINCIPAL_ROLE: &str = "userAdminAnyDatabase";
pub const MECHANISMS: &[AuthMechanism] = &[AuthMechanism::ScramSha1];
pub const APP_DB: &str = "tgfp";
pub const PLAYERS_COLLECTION: &str = "players";

/// Everything the runner creates, in the order it creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedPlan {
    pub admin_db: String,
    pub principal: PrincipalSpec,
    pub credentials: Credentials,
    pub collection: CollectionSpec,
}

impl SeedPlan {
    /// The bootstrap plan for the football pool database.
    pub fn tgfp() -> Self {
        Self {
            admin_db: ADMIN_DB.to_string(),
            principal: PrincipalSpec {
                name: PRINCIPAL_NAME.to_string(),
                secret: PRINCIPAL_SECRET.to_string(),
                roles: vec![RoleGrant::new(PRINCIPAL_ROLE, ADMIN_DB)],
                mechanisms: MECHANISMS.to_vec(),
            },
            credentials: Credentials {
                user: PRINCIPAL_NAME.to_string(),
                secret: PRINCIPAL_SECRET.to_string(),
                source_db: ADMIN_DB.to_string(),
                mechanisms: MECHANISMS.to_vec(),
                digest_password: true,
            },
            collection: CollectionSpec {
                database: APP_DB.to_string(),
                name: PLAYERS_COLLECTION.to_string(),
                capped: false,
            },
        }
    }
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self::tgfp()
    }
}
