//! Runs against a real server when `TGFP_SEED_TEST_URI` is set, e.g.
//! `TGFP_SEED_TEST_URI=mongodb://127.0.0.1:27017 cargo test --test mongo_live`.
//! Each test uses names unique to the process so reruns need no cleanup.

use tgfp_db::MongoTarget;
use tgfp_kernel::{settings::DatabaseSettings, AuthMechanism, TargetError};
use tgfp_seed::{run, verify, verify_login, SeedPlan, SeedStep};

fn settings() -> Option<DatabaseSettings> {
    let uri = std::env::var("TGFP_SEED_TEST_URI").ok()?;
    Some(DatabaseSettings {
        uri,
        app_name: "tgfp-seed-tests".to_string(),
        connect_timeout_ms: 2_000,
        server_selection_timeout_ms: 2_000,
    })
}

fn unique_plan(tag: &str) -> SeedPlan {
    let suffix = format!("{tag}_{}", std::process::id());
    let mut plan = SeedPlan::tgfp();
    plan.principal.name = format!("tgfp_{suffix}");
    plan.credentials.user = plan.principal.name.clone();
    plan.collection.database = format!("tgfp_{suffix}");
    plan
}

#[tokio::test]
async fn seed_verify_and_rerun() {
    let Some(settings) = settings() else {
        eprintln!("TGFP_SEED_TEST_URI not set; skipping");
        return;
    };
    let plan = unique_plan("rerun");

    let mut session = MongoTarget::connect(&settings).await.unwrap();
    let report = run(&mut session, &plan).await.unwrap();
    assert_eq!(report.completed, SeedStep::ORDER.to_vec());
    assert_eq!(session.authenticated_as(), Some(plan.principal.name.as_str()));

    let mut inspector = MongoTarget::connect(&settings).await.unwrap();
    let mismatches = verify(&mut inspector, &plan).await.unwrap();
    assert!(mismatches.is_empty(), "{mismatches:?}");

    let mut login = MongoTarget::connect(&settings).await.unwrap();
    assert!(verify_login(&mut login, &plan).await.unwrap().is_none());

    let mut again = MongoTarget::connect(&settings).await.unwrap();
    let failure = run(&mut again, &plan).await.unwrap_err();
    assert_eq!(failure.step, SeedStep::CreatePrincipal);
    assert!(matches!(
        failure.source,
        TargetError::DuplicatePrincipal { .. }
    ));
    let server_message = std::error::Error::source(&failure.source).unwrap().to_string();
    assert!(server_message.contains("already exists"), "{server_message}");
}

#[tokio::test]
async fn mismatched_mechanism_fails_authentication() {
    let Some(settings) = settings() else {
        eprintln!("TGFP_SEED_TEST_URI not set; skipping");
        return;
    };
    let mut plan = unique_plan("mechanism");
    plan.credentials.mechanisms = vec![AuthMechanism::ScramSha256];

    let mut session = MongoTarget::connect(&settings).await.unwrap();
    let failure = run(&mut session, &plan).await.unwrap_err();

    assert_eq!(failure.step, SeedStep::Authenticate);
    assert!(matches!(failure.source, TargetError::Authentication { .. }));
}
