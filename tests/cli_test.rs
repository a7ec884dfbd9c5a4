use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn pipkeeper(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pipkeeper").unwrap();
    cmd.env_remove("PIPKEEPER_HOME")
        .env_remove("PIPKEEPER_PYTHON")
        .env("NO_COLOR", "1")
        .arg("--root")
        .arg(root);
    cmd
}

/// Interpreter stand-in answering the pip and venv invocations pipkeeper makes.
///
/// Installs are appended to `installs.txt` next to the script. Setting
/// `FAKE_PIP_CONFLICT` makes `pip check` report a broken requirement;
/// `FAKE_PIP_CHECK_ERROR` makes it fail with only an error on stderr.
#[cfg(unix)]
fn fake_python(temp: &TempDir) -> String {
    use std::os::unix::fs::PermissionsExt;

    let dir = temp.path().join("tools");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("python");
    let script = r#"#!/bin/sh
here="$(dirname "$0")"
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  mkdir -p "$3/bin"
  touch "$3/bin/activate"
  exit 0
fi
case "$3" in
  list)
    echo "Package  Version Latest Type"
    echo "-------- ------- ------ -----"
    echo "requests 2.28.0  2.31.0 wheel"
    echo "rich     13.0.0  13.7.0 wheel"
    ;;
  check)
    if [ -n "$FAKE_PIP_CHECK_ERROR" ]; then
      echo "ERROR: pip check could not run" >&2
      exit 1
    fi
    if [ -n "$FAKE_PIP_CONFLICT" ]; then
      echo "sphinx 7.0.0 has requirement docutils<0.21, but you have docutils 0.21.1."
      exit 1
    fi
    echo "No broken requirements found."
    ;;
  show)
    echo "Name: $4"
    echo "Version: 1.0.0"
    ;;
  install)
    if [ "$5" = "pip" ]; then
      echo "Requirement already satisfied: pip in /usr/lib/python3"
    else
      echo "$5" >> "$here/installs.txt"
      echo "Successfully installed $5"
    fi
    ;;
esac
exit 0
"#;
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upgrade"))
        .stdout(predicate::str::contains("outdated"))
        .stdout(predicate::str::contains("env"))
        .stdout(predicate::str::contains("alias"));
}

#[test]
fn test_env_list_empty_workspace() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No virtual environments found."));
}

#[test]
fn test_env_menu_exits_on_choice_nine() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .arg("env")
        .write_stdin("0\n9\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Virtual Environment Manager"))
        .stdout(predicate::str::contains("9. Exit"))
        .stderr(predicate::str::contains("Invalid choice '0'"));
}

#[test]
fn test_env_create_rejects_path_names() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .args(["env", "create", "../outside"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("path separator"));
}

#[test]
fn test_alias_unknown_shell() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .args(["alias", "--shell", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown shell 'tcsh'"));
}

#[test]
fn test_alias_for_existing_environment() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("venv/environments/web/bin");
    fs::create_dir_all(&bin).unwrap();
    fs::write(bin.join("activate"), "").unwrap();

    pipkeeper(temp.path())
        .args(["alias", "web", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("activate_web.sh"));

    let shortcut = fs::read_to_string(temp.path().join("aliases/activate_web.sh")).unwrap();
    assert!(shortcut.starts_with("#!/usr/bin/env bash\n"));
    assert!(shortcut.contains("venv/environments/web/bin/activate"));
}

#[test]
fn test_missing_interpreter_is_reported() {
    let temp = TempDir::new().unwrap();
    pipkeeper(temp.path())
        .args(["--python", "pipkeeper-no-such-python", "outdated"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pipkeeper-no-such-python"));
}

#[cfg(unix)]
#[test]
fn test_outdated_lists_packages() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);
    pipkeeper(temp.path())
        .args(["--python", &python, "outdated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("requests"))
        .stdout(predicate::str::contains("Found 2 outdated packages."));
}

#[cfg(unix)]
#[test]
fn test_check_fails_on_conflicts() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);

    pipkeeper(temp.path())
        .args(["--python", &python, "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dependency issues detected!"));

    pipkeeper(temp.path())
        .env("FAKE_PIP_CONFLICT", "1")
        .args(["--python", &python, "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("sphinx 7.0.0 has requirement"))
        .stderr(predicate::str::contains("Dependency check failed (1 conflict(s))."));

    // Checking never writes a config file
    assert!(!temp.path().join("package_config.json").exists());
}

#[cfg(unix)]
#[test]
fn test_check_warns_about_malformed_config() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);
    let config = temp.path().join("package_config.json");
    fs::write(&config, r#"{"blacklist": ["sphinx"],}"#).unwrap();

    pipkeeper(temp.path())
        .env("FAKE_PIP_CONFLICT", "1")
        .args(["--python", &python, "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading config file"))
        .stderr(predicate::str::contains("Blacklisted packages are not ignored."));

    assert_eq!(
        fs::read_to_string(&config).unwrap(),
        r#"{"blacklist": ["sphinx"],}"#
    );
}

#[cfg(unix)]
#[test]
fn test_check_reports_pip_failure_without_conflicts() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);

    pipkeeper(temp.path())
        .env("FAKE_PIP_CHECK_ERROR", "1")
        .args(["--python", &python, "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No dependency").not())
        .stderr(predicate::str::contains(
            "Dependency check failed: ERROR: pip check could not run",
        ));
}

#[cfg(unix)]
#[test]
fn test_upgrade_cancelled_without_answer() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);

    pipkeeper(temp.path())
        .args(["--python", &python, "upgrade"])
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains("Upgrade cancelled by user."));

    assert!(!temp.path().join("tools/installs.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_upgrade_with_yes_creates_config_and_log() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);

    pipkeeper(temp.path())
        .args(["--yes", "--python", &python, "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== UPGRADE SUMMARY ==="))
        .stdout(predicate::str::contains("Successfully upgraded: 2/2 packages"));

    let config = fs::read_to_string(temp.path().join("package_config.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(config["blacklist"], serde_json::json!([]));

    let installs = fs::read_to_string(temp.path().join("tools/installs.txt")).unwrap();
    assert_eq!(installs, "requests\nrich\n");

    let logs: Vec<_> = fs::read_dir(temp.path().join("logs")).unwrap().collect();
    assert_eq!(logs.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_upgrade_honours_blacklist_and_pins() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);
    fs::write(
        temp.path().join("package_config.json"),
        r#"{"blacklist": ["Rich"], "specific_versions": {"requests": "2.30.0"}}"#,
    )
    .unwrap();

    pipkeeper(temp.path())
        .args(["--yes", "--python", &python, "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully upgraded: 1/1 packages"));

    let installs = fs::read_to_string(temp.path().join("tools/installs.txt")).unwrap();
    assert_eq!(installs, "requests==2.30.0\n");
}

#[cfg(unix)]
#[test]
fn test_env_create_writes_shortcut() {
    let temp = TempDir::new().unwrap();
    let python = fake_python(&temp);

    pipkeeper(temp.path())
        .args(["--python", &python, "env", "create", "web"])
        .assert()
        .success();

    assert!(temp.path().join("venv/environments/web/bin/activate").exists());
    assert!(temp.path().join("venv/requirements").is_dir());
    assert!(temp.path().join("aliases/activate_web.sh").exists());

    pipkeeper(temp.path())
        .args(["env", "activate", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("source "));

    pipkeeper(temp.path())
        .args(["env", "delete", "web"])
        .assert()
        .success();
    assert!(!temp.path().join("aliases/activate_web.sh").exists());
}
