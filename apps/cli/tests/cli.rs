use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn modload(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_modload"));
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_prints_entry_exports() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "mods/main.json", r#"{ "deps": ["lib/greeting"], "value": "app" }"#);
    write(temp.path(), "mods/lib/greeting.json", r#"{ "value": "hello" }"#);

    modload(temp.path())
        .args(["--root", "mods", "--log-level", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""id": "main""#))
        .stdout(predicate::str::contains(r#""value": "hello""#));
}

#[test]
fn test_config_file_and_path_override() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "modules/app.json", r#"{ "deps": ["jquery"], "value": 1 }"#);
    write(temp.path(), "modules/vendor/jquery-3.json", r#"{ "value": "$" }"#);
    write(
        temp.path(),
        "modload.toml",
        "[bootstrap]\nentry = \"app\"\n\n[transport]\nroot = \"modules\"\n\n[log]\nlevel = \"off\"\n",
    );

    modload(temp.path())
        .args(["--path", "jquery=vendor/jquery-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""value": "$""#));
}

#[test]
fn test_missing_dependency_fails_with_reason() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "main.json", r#"{ "deps": ["ghost"] }"#);

    modload(temp.path())
        .args(["--log-level", "off"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_traversal_is_rejected() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "mods/main.json", r#"{ "deps": ["../secret"] }"#);
    write(temp.path(), "secret.json", r#"{ "value": "leak" }"#);

    modload(temp.path())
        .args(["--root", "mods", "--log-level", "off"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path traversal"));
}

#[test]
fn test_explicit_config_must_exist() {
    let temp = TempDir::new().unwrap();

    modload(temp.path()).args(["--config", "absent.toml"]).assert().failure().stderr(
        predicate::str::contains("Configuration is malformed"),
    );
}
