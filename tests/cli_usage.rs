use std::io::Write;
use std::process::{Command, Stdio};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_onchange")
}

fn run_with_stdin(args: &[&str], stdin: &str) -> std::process::Output {
    let mut child = Command::new(bin())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_help_exits_zero_and_names_both_modes() {
    let output = Command::new(bin()).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("+<path>"),
        "help should describe the stream form; got:\n{}",
        stdout
    );
}

#[test]
fn test_version_exits_zero() {
    let output = Command::new(bin()).arg("--version").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("onchange"));
}

#[test]
fn test_missing_action_is_a_usage_error() {
    let output = run_with_stdin(&[], "");

    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_bare_plus_is_a_usage_error() {
    let output = run_with_stdin(&["+"], "");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stream mode"), "got stderr:\n{}", stderr);
}

#[test]
fn test_arguments_after_stream_path_are_a_usage_error() {
    let output = run_with_stdin(&["+/tmp/onchange-test-events", "extra"], "");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_empty_file_list_is_a_usage_error() {
    let output = run_with_stdin(&["true"], "");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no files"), "got stderr:\n{}", stderr);
}

#[test]
fn test_blank_lines_alone_are_an_empty_list() {
    let output = run_with_stdin(&["true"], "\n\n\n");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unwatchable_file_fails_after_the_retry_budget() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("never-created.txt");

    let output = run_with_stdin(&["true"], &format!("{}\n", missing.display()));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("never-created.txt"),
        "error should name the file; got stderr:\n{}",
        stderr
    );
}
