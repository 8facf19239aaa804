use std::fmt;
use std::future::Future;

use serde::Serialize;
use tgfp_kernel::{SeedTarget, TargetError};
use thiserror::Error;

use super::plan::SeedPlan;

/// The three seed steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStep {
    CreatePrincipal,
    Authenticate,
    CreateCollection,
}

impl SeedStep {
    pub const ORDER: [SeedStep; 3] = [
        SeedStep::CreatePrincipal,
        SeedStep::Authenticate,
        SeedStep::CreateCollection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatePrincipal => "create_principal",
            Self::Authenticate => "authenticate",
            Self::CreateCollection => "create_collection",
        }
    }
}

impl fmt::Display for SeedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a run where every step succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub completed: Vec<SeedStep>,
}

/// A step failed. Steps listed in `completed` stay applied.
#[derive(Debug, Error)]
#[error("seed step '{step}' failed")]
pub struct SeedFailure {
    pub step: SeedStep,
    pub completed: Vec<SeedStep>,
    #[source]
    pub source: TargetError,
}

/// Run `plan` against `target`: create the principal, authenticate as it,
/// then create the collection. The first failure stops the run; nothing is
/// retried or rolled back.
pub async fn run<T>(target: &mut T, plan: &SeedPlan) -> Result<SeedReport, SeedFailure>
where
    T: SeedTarget + ?Sized,
{
    let mut completed = Vec::with_capacity(SeedStep::ORDER.len());

    tracing::info!(
        step = %SeedStep::CreatePrincipal,
        db = %plan.admin_db,
        user = %plan.principal.name,
        "creating principal"
    );
    step(
        &mut completed,
        SeedStep::CreatePrincipal,
        target.create_user(&plan.admin_db, &plan.principal),
    )
    .await?;

    tracing::info!(
        step = %SeedStep::Authenticate,
        db = %plan.credentials.source_db,
        user = %plan.credentials.user,
        mechanism = ?plan.credentials.mechanisms,
        "authenticating"
    );
    step(
        &mut completed,
        SeedStep::Authenticate,
        target.authenticate(&plan.credentials),
    )
    .await?;

    tracing::info!(
        step = %SeedStep::CreateCollection,
        db = %plan.collection.database,
        collection = %plan.collection.name,
        capped = plan.collection.capped,
        "creating collection"
    );
    step(
        &mut completed,
        SeedStep::CreateCollection,
        target.create_collection(&plan.collection),
    )
    .await?;

    tracing::info!("seed complete");
    Ok(SeedReport { completed })
}

async fn step<F>(completed: &mut Vec<SeedStep>, step: SeedStep, op: F) -> Result<(), SeedFailure>
where
    F: Future<Output = Result<(), TargetError>>,
{
    match op.await {
        Ok(()) => {
            completed.push(step);
            Ok(())
        }
        Err(source) => {
            tracing::error!(step = %step, error = %source, "seed step failed");
            Err(SeedFailure {
                step,
                completed: std::mem::take(completed),
                source,
            })
        }
    }
}
