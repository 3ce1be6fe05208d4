// The resmon binary: signal-driven shutdown and exit status

#![cfg(target_os = "linux")]

mod common;

use common::{assert_arity, children_of, is_running, read_rows};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_resmon");

fn resmon(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.args(args)
        .current_dir(dir)
        .env_remove("RESMON_CONFIG")
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

fn wait_until(timeout: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("resmon did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn shutdown_on(signal: libc::c_int) {
    let dir = tempfile::tempdir().unwrap();
    let sys = dir.path().join("sys.csv");
    let cmd = dir.path().join("cmd.csv");
    let mut child = resmon(
        dir.path(),
        &[
            "-q",
            "-f",
            "-d",
            "0.1",
            "-o",
            sys.to_str().unwrap(),
            "--command-output",
            cmd.to_str().unwrap(),
            "--",
            "sleep",
            "30",
        ],
    )
    .spawn()
    .unwrap();
    let pid = child.id();

    // Header, priming row and at least one tick in both outputs.
    assert!(
        wait_until(Duration::from_secs(10), || line_count(&sys) >= 3
            && line_count(&cmd) >= 3),
        "resmon produced no rows"
    );
    let sleepers = children_of(pid);
    assert_eq!(sleepers.len(), 1, "resmon should own exactly one sleep");

    // SAFETY: plain signal delivery to a child we spawned.
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert!(status.success(), "exit status {status:?}");
    assert!(!is_running(sleepers[0]), "owned sleep survived shutdown");
    for path in [&sys, &cmd] {
        let rows = assert_arity(path);
        assert!(rows.len() >= 2, "{} has {} rows", path.display(), rows.len());
    }
}

#[test]
fn sigterm_closes_outputs_and_stops_the_command() {
    shutdown_on(libc::SIGTERM);
}

#[test]
fn sigint_closes_outputs_and_stops_the_command() {
    shutdown_on(libc::SIGINT);
}

#[test]
fn unknown_interface_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let sys = dir.path().join("sys.csv");
    let mut child = resmon(
        dir.path(),
        &["-q", "-o", sys.to_str().unwrap(), "-n", "doesnotexist0"],
    )
    .spawn()
    .unwrap();
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.code(), Some(1));
    // The system monitor was opened first and closed again before any row.
    assert_eq!(read_rows(&sys).len(), 1);
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files, ["sys.csv"]);
}

#[test]
fn invalid_interval_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = resmon(dir.path(), &["-q", "-d", "1e-12"]).spawn().unwrap();
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
}
