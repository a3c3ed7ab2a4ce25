use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn ledger_cmd(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("client-ledger");
    cmd.current_dir(root)
        .env("LEDGER_HOME", root.join("ledger"))
        .env("LEDGER_CONFIG_PATH", root.join("ledger.toml"))
        .env("RUST_LOG", "warn");
    cmd
}

fn seed(root: &Path) {
    for key in ["k1", "k2"] {
        ledger_cmd(root)
            .args(["hardware", "--key", key, "--hardware", r#"{"cpu":"x86"}"#])
            .assert()
            .success();
    }
}

#[test]
fn verify_passes_after_ingest() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("report matches store"));
}

#[test]
fn verify_flags_tampered_report_and_repair_fixes_it() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    let report_file = tmp.path().join("ledger/captured_records.txt");
    let text = fs::read_to_string(&report_file).expect("read report");
    fs::write(&report_file, format!("{text}{text}")).expect("duplicate blocks");

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("duplicate report block"));

    ledger_cmd(tmp.path())
        .arg("repair")
        .assert()
        .success()
        .stdout(predicate::str::contains("blocks=2"));

    ledger_cmd(tmp.path()).arg("verify").assert().success();
}

#[test]
fn corrupt_store_is_reported_by_verify_but_ingest_recovers() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    fs::write(tmp.path().join("ledger/captured_records.json"), "{ nope").expect("corrupt");

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("E001_STORE_CORRUPT"));

    ledger_cmd(tmp.path())
        .args(["email", "--key", "k9", "--email", "n@b.com"])
        .assert()
        .success();
    ledger_cmd(tmp.path()).arg("verify").assert().success();
}

#[test]
fn report_timezone_comes_from_config_file() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        tmp.path().join("ledger.toml"),
        "[report]\ntimezone = \"Asia/Tokyo\"\nbanner = \"Client\"\n",
    )
    .expect("write config");

    ledger_cmd(tmp.path())
        .args(["email", "--key", "d1", "--email", "a@b.com"])
        .args(["--timestamp", "2026-05-04T10:11:12Z"])
        .assert()
        .success();

    let report = fs::read_to_string(tmp.path().join("ledger/captured_records.txt"))
        .expect("read report");
    assert!(report.starts_with("==== Client 1 ===="));
    assert!(report.contains("Timestamp : 2026-05-04 19:11:12 JST"));
}

#[test]
fn invalid_config_fails_fast() {
    let tmp = tempdir().expect("tempdir");
    ledger_cmd(tmp.path())
        .env("LEDGER_REPORT_TIMEZONE", "Nowhere/Special")
        .arg("status")
        .assert()
        .failure();
}

#[test]
fn attach_stores_blob_under_key() {
    let tmp = tempdir().expect("tempdir");
    let payload = tmp.path().join("clip.wav");
    fs::write(&payload, b"RIFF0000WAVE").expect("write payload");

    ledger_cmd(tmp.path())
        .args(["attach", "--key", "d1", "--kind", "audio", "--file"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("stored="));

    let dir = tmp.path().join("ledger/blobs/d1");
    let count = fs::read_dir(&dir).expect("read blobs").count();
    assert_eq!(count, 1);
}

#[test]
fn status_mentions_unrecognized_ledger_env_vars() {
    let tmp = tempdir().expect("tempdir");
    ledger_cmd(tmp.path())
        .env("LEDGER_TIMEZONE", "UTC")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("unrecognized env var LEDGER_TIMEZONE"));
}

#[test]
fn strict_verify_fails_on_unrecognized_ledger_env_vars() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    ledger_cmd(tmp.path())
        .arg("verify")
        .assert()
        .success();

    ledger_cmd(tmp.path())
        .env("LEDGER_TIMEZONE", "UTC")
        .args(["verify", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "! unrecognized env var LEDGER_TIMEZONE; check for a typo",
        ))
        .stdout(predicate::str::contains("! strict verify failed"));

    ledger_cmd(tmp.path())
        .args(["verify", "--strict"])
        .assert()
        .success();
}
