//! Smoke tests for the developer CLI.

use assert_cmd::Command;

const MNEMONIC: &str =
    "denial kitchen pet squirrel other broom bar gas better priority spoil cross";

// Unsigned single-clause transfer on the solo network
const UNSIGNED_RAW: &str =
    "ed81f684aabbccdd20dad9947567d83b7b8d80addcb281a71d54fc7b3364ffed82271080808252088083bc614ec0";

fn cli() -> Command {
    Command::cargo_bin("vethor-core").unwrap()
}

#[test]
fn version_prints_crate_version() {
    cli()
        .arg("version")
        .assert()
        .success()
        .stdout(predicates::str::contains("vethor-core"));
}

#[test]
fn help_shows_usage() {
    cli()
        .arg("help")
        .assert()
        .success()
        .stdout(predicates::str::contains("USAGE"));
}

#[test]
fn unknown_command_exits_with_usage_error() {
    cli()
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicates::str::contains("Unknown command"));
}

#[test]
fn generate_mnemonic_outputs_requested_length() {
    let output = cli().args(["generate-mnemonic", "24"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.split_whitespace().count(), 24);

    cli()
        .args(["generate-mnemonic", "13"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Error"));
}

#[test]
fn derive_address_matches_known_wallet() {
    let output = cli().args(["derive-address", MNEMONIC]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(
        stdout.trim().to_lowercase(),
        "0x339fb3c438606519e2c75bbf531fb43a0f449a70"
    );
}

#[test]
fn inspect_tx_decodes_raw_transactions() {
    cli()
        .args(["inspect-tx", UNSIGNED_RAW])
        .assert()
        .success()
        .stdout(predicates::str::contains("chainTag"))
        .stdout(predicates::str::contains("0x7567d83b7b8d80addcb281a71d54fc7b3364ffed"));

    cli()
        .args(["inspect-tx", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Error"));
}
