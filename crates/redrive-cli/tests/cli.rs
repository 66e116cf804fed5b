use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn command_does_not_exist() {
    let mut cmd = Command::cargo_bin("redrive").unwrap();

    cmd.arg("something");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error: unrecognized subcommand"));
}

#[test]
fn help_lists_every_command() {
    let mut cmd = Command::cargo_bin("redrive").unwrap();

    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("provision")
            .and(predicate::str::contains("send"))
            .and(predicate::str::contains("work"))
            .and(predicate::str::contains("dead-letters"))
            .and(predicate::str::contains("--local")),
    );
}

#[test]
fn queue_name_is_required() {
    let mut cmd = Command::cargo_bin("redrive").unwrap();

    cmd.arg("work");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<NAME>"));
}

#[test]
fn workers_must_be_a_number() {
    let mut cmd = Command::cargo_bin("redrive").unwrap();

    cmd.args(["work", "jobs", "--workers", "many"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'many'"));
}
