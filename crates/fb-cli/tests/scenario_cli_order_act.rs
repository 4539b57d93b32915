//! `fb order show` / `fb order act` against a mock backend.
//!
//! GREEN when:
//! - the caller's role comes from the token, or `--role` when the token
//!   grants that stage; any other `--role` is refused before any request;
//! - an illegal request fails locally and sends nothing;
//! - a partial validation sends one result submission and creates the
//!   residual with its idempotency key.

use assert_cmd::prelude::*;
use httpmock::prelude::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use predicates::prelude::*;
use serde_json::json;
use std::process::Command;

const TOKEN_ENV: &str = "FB_CLI_TEST_TOKEN";

fn token(role: &str, granted: &[&str]) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": "u-1",
            "role": role,
            "roles": granted,
            "negotiatorId": "neg-1",
            "exp": 4_000_000_000i64
        }),
        &EncodingKey::from_secret(b"test-only"),
    )
    .unwrap()
}

fn order_json(status: u8) -> serde_json::Value {
    json!({
        "id": "ord-1",
        "orderDirection": "buy",
        "securityId": "SAIDAL",
        "securityType": "stock",
        "market": "secondary",
        "quantity": 100,
        "priceLimitMin": 500.0,
        "priceLimitMax": 550.0,
        "orderStatus": status,
        "investorId": "inv-1",
        "negotiatorId": "neg-1"
    })
}

struct Fixture {
    dir: tempfile::TempDir,
    cfg: std::path::PathBuf,
}

fn fixture(server: &MockServer) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("cfg.yaml");
    std::fs::write(
        &cfg,
        format!(
            "backend:\n  base_url: \"{}\"\nauth:\n  token_env: {}\n",
            server.base_url(),
            TOKEN_ENV
        ),
    )
    .unwrap();
    Fixture { dir, cfg }
}

fn fb(f: &Fixture, role_in_token: &str) -> Command {
    fb_granting(f, role_in_token, &[])
}

fn fb_granting(f: &Fixture, role_in_token: &str, granted: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("fb").unwrap();
    cmd.current_dir(f.dir.path())
        .env(TOKEN_ENV, token(role_in_token, granted))
        .arg("--config")
        .arg(&f.cfg);
    cmd
}

#[test]
fn show_lists_actions_for_token_role() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/order/ord-1");
        then.status(200).json_body(order_json(1));
    });
    let f = fixture(&server);

    fb(&f, "premiere-validation")
        .args(["order", "show", "--id", "ord-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=Pending code=1 terminal=false"))
        .stdout(predicate::str::contains("role=agency-first-validator"))
        .stdout(predicate::str::contains("card_payment=false"))
        .stdout(predicate::str::contains("actions=validate,reject,cancel"));

    fb_granting(&f, "premiere-validation", &["tcc-first-validator"])
        .args(["--role", "tcc-first-validator", "order", "show", "--id", "ord-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("actions=cancel"));
    get.assert_hits(2);
}

#[test]
fn role_not_granted_by_token_is_refused_before_any_request() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/order/ord-1");
        then.status(200).json_body(order_json(4));
    });
    let set_action = server.mock(|when, then| {
        when.method(POST).path("/order/set-action");
        then.status(200).json_body(json!({"success": true}));
    });
    let f = fixture(&server);

    fb(&f, "investor")
        .args([
            "--role",
            "tcc-final-validator",
            "order",
            "act",
            "--id",
            "ord-1",
            "--action",
            "validate",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FORBIDDEN"))
        .stderr(predicate::str::contains("does not hold role tcc-final-validator"));
    get.assert_hits(0);
    set_action.assert_hits(0);
}

#[test]
fn illegal_action_sends_no_mutation() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/order/ord-1");
        then.status(200).json_body(order_json(2));
    });
    let set_action = server.mock(|when, then| {
        when.method(POST).path("/order/set-action");
        then.status(200).json_body(json!({"success": true}));
    });
    let f = fixture(&server);

    fb(&f, "premiere-validation")
        .args(["order", "act", "--id", "ord-1", "--action", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRANSITION_INVALID"));
    set_action.assert_hits(0);
}

#[test]
fn partial_result_creates_residual() {
    let server = MockServer::start();
    // The same copy serves the plan and the re-read; a stale re-read only
    // logs a warning.
    server.mock(|when, then| {
        when.method(GET).path("/order/ord-1");
        then.status(200).json_body(order_json(7));
    });
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/order/submit-order-result")
            .body_contains("\"orderID\":\"ord-1\"")
            .body_contains("\"taskID\":\"resultats\"")
            .body_contains("\"action\":\"partial\"")
            .body_contains("\"quantity\":60");
        then.status(200).json_body(json!({"success": true}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/order")
            .header("Idempotency-Key", "residual-ord-1")
            .body_contains("\"quantity\":40")
            .body_contains("\"orderStatus\":1")
            .body_contains("\"parentOrderId\":\"ord-1\"");
        then.status(201).json_body(json!({"id": "ord-2"}));
    });
    let f = fixture(&server);

    let mut cmd = fb(&f, "resultats");
    cmd.args([
        "order", "act", "--id", "ord-1", "--action", "partial", "--quantity", "60", "--price",
        "540",
    ]);

    let out = cmd.output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("transitioned=true order_id=ord-1 role=iob-result-submitter action=partial"));
    assert!(stdout.contains("to=Partially_Validated(8)"));
    assert!(stdout.contains("residual_order_id=ord-2"));
    submit.assert_hits(1);
    create.assert_hits(1);
}
