use tgfp_kernel::{SeedTarget, TargetError};
use thiserror::Error;

use super::plan::SeedPlan;

/// A post-seed expectation that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("principal '{user}' is missing from database '{db}'")]
    PrincipalMissing { user: String, db: String },

    #[error("principal '{user}' lacks role {role}")]
    RoleMissing { user: String, role: String },

    #[error("principal '{user}' does not allow mechanism {mechanism}")]
    MechanismMissing { user: String, mechanism: String },

    #[error("collection '{db}.{name}' is missing")]
    CollectionMissing { db: String, name: String },

    #[error("collection '{db}.{name}' has capped = {capped}")]
    CappedMismatch {
        db: String,
        name: String,
        capped: bool,
    },

    #[error("collection '{db}.{name}' holds {documents} documents, expected none")]
    CollectionNotEmpty {
        db: String,
        name: String,
        documents: u64,
    },

    #[error("login as '{user}' failed: {message}")]
    LoginFailed { user: String, message: String },
}

/// Inspect `target` for the principal and collection `plan` creates.
///
/// Returns every mismatch found; an empty list means the server is seeded.
pub async fn verify<T>(target: &mut T, plan: &SeedPlan) -> Result<Vec<Mismatch>, TargetError>
where
    T: SeedTarget + ?Sized,
{
    let mut mismatches = Vec::new();
    let principal = &plan.principal;

    match target.principal(&plan.admin_db, &principal.name).await? {
        None => mismatches.push(Mismatch::PrincipalMissing {
            user: principal.name.clone(),
            db: plan.admin_db.clone(),
        }),
        Some(found) => {
            for grant in &principal.roles {
                if !found.roles.contains(grant) {
                    mismatches.push(Mismatch::RoleMissing {
                        user: principal.name.clone(),
                        role: grant.to_string(),
                    });
                }
            }
            for mechanism in &principal.mechanisms {
                if !found.mechanisms.iter().any(|m| m == mechanism.as_str()) {
                    mismatches.push(Mismatch::MechanismMissing {
                        user: principal.name.clone(),
                        mechanism: mechanism.to_string(),
                    });
                }
            }
        }
    }

    let collection = &plan.collection;
    match target
        .collection(&collection.database, &collection.name)
        .await?
    {
        None => mismatches.push(Mismatch::CollectionMissing {
            db: collection.database.clone(),
            name: collection.name.clone(),
        }),
        Some(found) => {
            if found.capped != collection.capped {
                mismatches.push(Mismatch::CappedMismatch {
                    db: collection.database.clone(),
                    name: collection.name.clone(),
                    capped: found.capped,
                });
            }
            if found.document_count != 0 {
                mismatches.push(Mismatch::CollectionNotEmpty {
                    db: collection.database.clone(),
                    name: collection.name.clone(),
                    documents: found.document_count,
                });
            }
        }
    }

    Ok(mismatches)
}

/// Check that the plan's credentials authenticate a fresh session.
pub async fn verify_login<T>(target: &mut T, plan: &SeedPlan) -> Result<Option<Mismatch>, TargetError>
where
    T: SeedTarget + ?Sized,
{
    match target.authenticate(&plan.credentials).await {
        Ok(()) => Ok(None),
        Err(TargetError::Authentication { user, message }) => {
            Ok(Some(Mismatch::LoginFailed { user, message }))
        }
        Err(other) => Err(other),
    }
}
