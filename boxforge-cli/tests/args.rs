use predicates::prelude::*;

mod common;

#[test]
fn test_unknown_argument_fails() {
    let ctx = common::boxforge();

    ctx.new_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn test_unknown_flag_fails() {
    let ctx = common::boxforge();

    ctx.new_cmd().args(["build", "--bogus"]).assert().failure();
}

#[test]
fn test_help_lists_subcommands() {
    let ctx = common::boxforge();

    ctx.new_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("buildimages"));
}

#[test]
fn test_interactive_invalid_selection_exits() {
    let ctx = common::boxforge();

    ctx.new_cmd()
        .write_stdin("7\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid selection"));
}

#[test]
fn test_interactive_add_template() {
    let ctx = common::boxforge();

    ctx.new_cmd()
        .write_stdin("1\nweb\n11\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Template created"));

    assert!(ctx.workspace.templates_dir().join("web/config.json").is_file());
    assert!(ctx.workspace.templates_dir().join("web/Root").is_dir());
}
