use std::{fs, os::unix::fs::symlink, path::Path, process::Command};

use assert_cmd::prelude::*;
use common::output::{OutputFormat, decode};
use predicates::prelude::*;
use tempfile::tempdir;

fn block(threads: u32, image_size: u32, task_clock: &str) -> String {
    format!(
        "Starting seq with NThreads={threads}, and ImageSize={image_size}

 Performance counter stats for './mandelbrot_seq' (10 runs):

        {task_clock}      task-clock (msec)         #    0.998 CPUs utilized            ( +-  0.35% )
                 3      context-switches          #    0.007 K/sec                    ( +- 14.29% )
                 0      cpu-migrations            #    0.000 K/sec
             1,582      page-faults               #    0.004 M/sec                    ( +-  0.02% )

       0.452031415 seconds time elapsed                                          ( +-  0.36% )
"
    )
}

fn perflog(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("perflog").unwrap();
    cmd.current_dir(dir)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_shows_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("perflog")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("perflog"));
    Ok(())
}

#[test]
fn no_arguments_writes_finaldata() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("seq.log"),
        format!("{}{}", block(1, 1024, "451.123456"), block(1, 16384, "451.123456")),
    )
    .unwrap();
    fs::write(dir.path().join("pth.log"), block(4, 8192, "451.123456")).unwrap();
    symlink(dir.path().join("missing"), dir.path().join("broken.log")).unwrap();

    perflog(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Unable to open file"));

    let data = fs::read(dir.path().join("finaldata.p")).unwrap();
    let records = decode(&data, OutputFormat::Bincode).unwrap();
    let keys: Vec<_> = records
        .iter()
        .map(|r| (r.test_type.as_str(), r.dims.threads, r.dims.image_size))
        .collect();
    assert_eq!(keys, vec![("pth", 4, 8192), ("seq", 1, 1024)]);
    assert_eq!(records[1].metrics.pf, 1582.0);
}

#[test]
fn malformed_counter_does_not_stop_the_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("seq.log"), block(2, 512, "N/A")).unwrap();

    perflog(dir.path())
        .args(["--drop-incomplete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("error parsing line"));

    let data = fs::read(dir.path().join("finaldata.p")).unwrap();
    assert!(decode(&data, OutputFormat::Bincode).unwrap().is_empty());
}

#[test]
fn diagnostics_name_the_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("seq.log"), block(2, 512, "451.123456")).unwrap();
    fs::write(dir.path().join("seq.static.log"), block(2, 512, "N/A")).unwrap();

    perflog(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("seq.static.log:5: error parsing line"))
        .stdout(predicate::str::contains("seq.log:5:").not());
}

#[test]
fn show_prints_stored_records() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("seq.log"), block(2, 512, "451.123456")).unwrap();

    perflog(dir.path()).assert().success();
    perflog(dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("StdET"))
        .stdout(predicate::str::contains("seq\t2\t512\t451.123456\t0.35"));
}

#[test]
fn json_output_to_custom_path() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir(&logs).unwrap();
    fs::write(logs.join("seq.log"), block(1, 2048, "10.5")).unwrap();

    perflog(dir.path())
        .args(["--dir", "logs", "--output", "out.json", "--format", "json"])
        .args(["--max-image-size", "4096"])
        .assert()
        .success();

    let data = fs::read(dir.path().join("out.json")).unwrap();
    let records = decode(&data, OutputFormat::Json).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metrics.tc, 10.5);
    assert!(!dir.path().join("finaldata.p").exists());
}

#[test]
fn missing_directory_fails() {
    let dir = tempdir().unwrap();
    perflog(dir.path())
        .args(["--dir", "nope"])
        .assert()
        .failure();
}
