use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs, process::Command};

fn buildctx() -> Command {
    let mut command = Command::new(env!("CARGO"));
    command
        .arg("run")
        .arg("--quiet")
        .arg("-p")
        .arg("buildctx-cli")
        .arg("--");
    command
}

fn project_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.sh"), "echo hi\n").unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib").join("util.sh"), "true\n").unwrap();
    dir
}

#[test]
fn cli_no_args() {
    buildctx()
        .assert()
        .failure()
        .stderr(predicate::str::contains("USAGE:"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn cli_help() {
    buildctx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SUBCOMMANDS:"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn cli_list() {
    let tree = project_tree();
    buildctx()
        .arg("list")
        .arg("--root")
        .arg(tree.path())
        .assert()
        .success()
        .stdout(predicate::eq(
            "         8 /main.sh\n         5 /lib/util.sh\n        79 /Dockerfile\n",
        ))
        .stderr(predicate::str::is_empty());
}

#[test]
fn cli_list_json_mount_no_recurse() {
    let tree = project_tree();
    buildctx()
        .arg("list")
        .arg("--json")
        .arg("--no-recurse")
        .arg("-m")
        .arg("/src")
        .arg("-r")
        .arg(tree.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"path\": \"/src/main.sh\""))
        .stdout(predicate::str::contains("\"path\": \"/Dockerfile\""))
        .stdout(predicate::str::contains("util.sh").not())
        .stderr(predicate::str::is_empty());
}

#[test]
fn cli_pack_to_file() {
    let tree = project_tree();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("context.tar.gz");
    let dockerfile = out_dir.path().join("Dockerfile");
    fs::write(&dockerfile, "FROM alpine\n").unwrap();

    buildctx()
        .arg("pack")
        .arg("--root")
        .arg(tree.path())
        .arg("--dockerfile")
        .arg(&dockerfile)
        .arg("--level")
        .arg("9")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());

    let entries = buildctx::list_entries(fs::File::open(&output).unwrap()).unwrap();
    let paths: Vec<&str> = entries.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(paths, vec!["/main.sh", "/lib/util.sh", "/Dockerfile"]);
    assert_eq!(entries[2].size, 12);
}

#[test]
fn cli_pack_to_stdout() {
    let tree = project_tree();
    let output = buildctx()
        .arg("pack")
        .arg("--root")
        .arg(tree.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(&output.stdout[..2], &[0x1f, 0x8b]);
    let entries = buildctx::list_entries(&output.stdout[..]).unwrap();
    assert_eq!(entries.len(), 3);
}

#[test]
fn cli_missing_root() {
    let tree = project_tree();
    buildctx()
        .arg("-l")
        .arg("error")
        .arg("pack")
        .arg("--root")
        .arg(tree.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("path not found"))
        .stdout(predicate::str::is_empty());
}
