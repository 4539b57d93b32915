use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn repo_root() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// `fb workflow table` needs no config, token or backend.
#[test]
fn workflow_table_prints_every_role() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("fb")?;
    cmd.args(["workflow", "table"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "role=investor task_id=soumission sources=Draft(0) targets=Pending(1),Cancelled(11)",
        ))
        .stdout(predicate::str::contains(
            "role=tcc-final-validator task_id=validation-tcc-finale sources=Being_Processed(4) \
             targets=Completed(5),Awaiting_Approval(6),Rejected(10),Cancelled(11)",
        ))
        .stdout(predicate::str::contains(
            "role=iob-result-submitter task_id=resultats sources=Ongoing(7) \
             targets=Completed(5),Partially_Validated(8),Expired(9),Rejected(10),Cancelled(11)",
        ));
    Ok(())
}

#[test]
fn workflow_table_json_has_seven_rows() -> anyhow::Result<()> {
    let out = Command::cargo_bin("fb")?
        .args(["workflow", "table", "--json"])
        .output()?;
    assert!(out.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[2]["role"], "agency-final-validator");
    assert_eq!(rows[2]["sources"], serde_json::json!([2]));
    Ok(())
}

#[test]
fn config_hash_is_stable_and_layer_sensitive() -> anyhow::Result<()> {
    let base = repo_root().join("config/base.yaml");
    let uat = repo_root().join("config/uat.yaml");
    let base_s = base.to_string_lossy().to_string();
    let uat_s = uat.to_string_lossy().to_string();

    let hash_of = |paths: &[&str]| -> anyhow::Result<String> {
        let out = Command::cargo_bin("fb")?
            .arg("config-hash")
            .args(paths)
            .output()?;
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        let stdout = String::from_utf8(out.stdout)?;
        let line = stdout.lines().next().unwrap_or_default().to_string();
        Ok(line.trim_start_matches("config_hash=").to_string())
    };

    let a = hash_of(&[&base_s])?;
    let b = hash_of(&[&base_s])?;
    let c = hash_of(&[&base_s, &uat_s])?;
    assert_eq!(a.len(), 64);
    assert_eq!(a, b);
    assert_ne!(a, c);
    Ok(())
}

/// Commands that talk to the backend fail closed without a token, naming
/// the variable and never printing a value.
#[test]
fn order_show_requires_token() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("cfg.yaml");
    std::fs::write(
        &cfg,
        "auth:\n  token_env: FB_SENTINEL_CLI_TOKEN_NEVER_SET_91C2\nbakend:\n  base_url: x\n",
    )?;

    let mut cmd = Command::cargo_bin("fb")?;
    cmd.current_dir(dir.path())
        .env_remove("FB_SENTINEL_CLI_TOKEN_NEVER_SET_91C2")
        .args(["order", "show", "--id", "ord-1", "--config"])
        .arg(&cfg);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS consumer=cli"))
        .stderr(predicate::str::contains("unused=/bakend/base_url"))
        .stderr(predicate::str::contains(
            "SECRETS_MISSING: required env var 'FB_SENTINEL_CLI_TOKEN_NEVER_SET_91C2'",
        ));
    Ok(())
}

#[test]
fn secret_literal_in_config_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("cfg.yaml");
    std::fs::write(&cfg, "auth:\n  token: \"Bearer abcdefghijkl\"\n")?;

    Command::cargo_bin("fb")?
        .current_dir(dir.path())
        .arg("config-hash")
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("abcdefghijkl").not());
    Ok(())
}
