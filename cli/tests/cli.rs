use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{io::Write, process::Command};
use stplc_test::shared_resource_path;
use tempfile::NamedTempFile;

fn source_file(content: &str) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".st").tempfile()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn check_when_not_a_file_then_err() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("check").arg("test/file/doesnt/exist");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error"));

    Ok(())
}

#[test]
fn check_when_trace_log_and_not_a_file_then_err() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("-v")
        .arg("-v")
        .arg("-v")
        .arg("-v")
        .arg("check")
        .arg("test/file/doesnt/exist");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error"));

    Ok(())
}

#[test]
fn check_when_valid_file_then_ok() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("check").arg(shared_resource_path("counter.st"));
    cmd.assert().success().stdout(predicate::str::contains("OK"));

    Ok(())
}

#[test]
fn check_when_syntax_error_file_then_err() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file("PROGRAM P x := ; END_PROGRAM")?;
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("check").arg(file.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("S0002"));

    Ok(())
}

#[test]
fn check_when_duplicate_type_then_err() -> Result<(), Box<dyn std::error::Error>> {
    let first = source_file("TYPE T : INT; END_TYPE")?;
    let second = source_file("TYPE T : INT; END_TYPE")?;
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("check").arg(first.path()).arg(second.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("L0005"));

    Ok(())
}

#[test]
fn run_when_doubling_then_writes_query() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("run")
        .arg(shared_resource_path("doubling.st"))
        .arg("--program")
        .arg("P")
        .arg("--query")
        .arg("P.x");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("P.x = 8"));

    Ok(())
}

#[test]
fn run_when_two_cycles_then_state_kept() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("run")
        .arg(shared_resource_path("counter.st"))
        .arg("-p")
        .arg("Main")
        .arg("-c")
        .arg("2")
        .arg("-q")
        .arg("Main.c.total");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Main.c.total = 6"));

    Ok(())
}

#[test]
fn run_when_endless_loop_then_step_limit() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file("PROGRAM P VAR x : INT; END_VAR WHILE TRUE DO x := 1; END_WHILE END_PROGRAM")?;
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("run")
        .arg(file.path())
        .arg("--program")
        .arg("P")
        .arg("--max-micro-steps")
        .arg("100");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("C0005"));

    Ok(())
}

#[test]
fn step_when_counter_then_writes_pauses() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("step")
        .arg(shared_resource_path("counter.st"))
        .arg("--program")
        .arg("Main")
        .arg("--into-calls");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("counter.st:9:4"))
        .stdout(predicate::str::contains("Cycle complete"));

    Ok(())
}

#[test]
fn run_when_log_file_then_writes_log() -> Result<(), Box<dyn std::error::Error>> {
    let log = NamedTempFile::new()?;
    let mut cmd = Command::new(cargo::cargo_bin!("stplc"));

    cmd.arg("-vvv")
        .arg("--log-file")
        .arg(log.path())
        .arg("run")
        .arg(shared_resource_path("doubling.st"))
        .arg("--program")
        .arg("P");
    cmd.assert().success();

    assert!(log.path().metadata()?.len() > 0);

    Ok(())
}
