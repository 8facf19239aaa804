use assert_cmd::Command;

fn tgfp_seed() -> Command {
    let mut cmd = Command::cargo_bin("tgfp-seed").unwrap();
    // Keep the run independent of any config or .env next to the workspace.
    let config_dir = std::env::temp_dir().join("tgfp-seed-cli-tests-no-config");
    cmd.env("TGFP_SEED_CONFIG_DIR", config_dir)
        .env("TGFP_SEED_ENV", "local")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn plan_prints_redacted_json() {
    let output = tgfp_seed().arg("plan").assert().success().get_output().clone();
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(plan["admin_db"], "admin");
    assert_eq!(plan["principal"]["name"], "tgfp");
    assert_eq!(plan["principal"]["secret"], "<redacted>");
    assert_eq!(plan["principal"]["roles"][0]["role"], "userAdminAnyDatabase");
    assert_eq!(plan["collection"]["database"], "tgfp");
    assert_eq!(plan["collection"]["capped"], false);
}

#[test]
fn dry_run_seed_completes_every_step() {
    let output = tgfp_seed()
        .args(["seed", "--dry-run"])
        .assert()
        .success()
        .get_output()
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(
        report["completed"],
        serde_json::json!(["create_principal", "authenticate", "create_collection"])
    );
}

#[test]
fn unknown_environment_fails() {
    tgfp_seed().env("TGFP_SEED_ENV", "qa").arg("plan").assert().failure();
}
