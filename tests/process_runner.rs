#![cfg(unix)]

mod common;
use crate::common::{init_tracing, scratch_dir, with_timeout};

use std::time::Duration;

use buildpipe::exec::{
    CommandSpec, ProcessBackend, ProcessEvent, ProcessEventKind, ProcessRunner,
    RealProcessBackend, StartError, Stream, TaskId,
};
use tokio::sync::mpsc;

fn sh(script: &str, dir: &std::path::Path) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()], dir)
}

async fn collect(mut rx: mpsc::Receiver<ProcessEvent>) -> Vec<ProcessEventKind> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event.kind);
        if terminal {
            break;
        }
    }
    events
}

fn lines(events: &[ProcessEventKind], wanted: Stream) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ProcessEventKind::Line { stream, text } if *stream == wanted => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn streams_lines_and_flushes_partial_tail() {
    init_tracing();
    let (_tmp, dir) = scratch_dir();
    let (tx, rx) = mpsc::channel(64);

    let handle = ProcessRunner::start(
        TaskId(1),
        &sh("printf 'one\\ntwo\\nthree'; printf 'oops\\n' >&2; exit 3", &dir),
        tx,
    );
    assert!(handle.is_some());

    let events = with_timeout(collect(rx)).await;

    assert!(matches!(events.first(), Some(ProcessEventKind::Started { pid: Some(_) })));
    assert_eq!(lines(&events, Stream::Stdout), vec!["one", "two", "three"]);
    assert_eq!(lines(&events, Stream::Stderr), vec!["oops"]);
    assert_eq!(events.last(), Some(&ProcessEventKind::Exited { code: Some(3) }));
}

#[tokio::test]
async fn runs_in_the_requested_directory() {
    let (_tmp, dir) = scratch_dir();
    std::fs::write(dir.join("marker.txt"), "here").unwrap();
    let (tx, rx) = mpsc::channel(64);

    let _handle = ProcessRunner::start(TaskId(1), &sh("cat marker.txt", &dir), tx);
    let events = with_timeout(collect(rx)).await;

    assert_eq!(lines(&events, Stream::Stdout), vec!["here"]);
}

#[tokio::test]
async fn missing_binary_fails_with_not_found() {
    let (_tmp, dir) = scratch_dir();
    let (tx, rx) = mpsc::channel(8);
    let spec = CommandSpec::new("buildpipe-definitely-not-a-binary", vec![], &dir);

    let handle = ProcessRunner::start(TaskId(7), &spec, tx);
    assert!(handle.is_none());

    let events = with_timeout(collect(rx)).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        ProcessEventKind::Failed { error } => {
            assert!(error.is_not_found());
            assert!(matches!(error, StartError::NotFound { program } if program == "buildpipe-definitely-not-a-binary"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_working_directory_fails_to_start() {
    let (_tmp, dir) = scratch_dir();
    let (tx, rx) = mpsc::channel(8);

    let handle = ProcessRunner::start(TaskId(1), &sh("true", &dir.join("gone")), tx);
    assert!(handle.is_none());

    let events = with_timeout(collect(rx)).await;
    assert!(matches!(
        events[..],
        [ProcessEventKind::Failed {
            error: StartError::Other { .. }
        }]
    ));
}

#[tokio::test]
async fn kill_terminates_process_group_and_is_idempotent() {
    init_tracing();
    let (_tmp, dir) = scratch_dir();
    let (tx, mut rx) = mpsc::channel(64);

    // The child shell spawns a grandchild that would outlive a plain kill.
    let mut handle = ProcessRunner::start(
        TaskId(2),
        &sh("sleep 30 & echo $!; echo ready; sleep 30; wait", &dir),
        tx,
    )
    .expect("sh should start");

    // Wait until the script is actually running, noting the grandchild pid.
    let grandchild: u32 = with_timeout(async {
        let mut pid = None;
        while let Some(event) = rx.recv().await {
            if let ProcessEventKind::Line { text, .. } = &event.kind {
                if text == "ready" {
                    break;
                }
                pid = text.parse().ok();
            }
        }
        pid.expect("grandchild pid echoed")
    })
    .await;

    assert!(handle.kill());
    assert!(!handle.kill(), "second kill is a no-op");

    let events = with_timeout(collect(rx)).await;
    assert_eq!(events.last(), Some(&ProcessEventKind::Exited { code: None }));
    with_timeout(async {
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(!handle.kill(), "kill after exit is a no-op");

    #[cfg(target_os = "linux")]
    {
        with_timeout(async {
            while !is_gone_or_zombie(grandchild) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = grandchild;
    }
}

/// `/proc/<pid>` is missing, or the process is waiting to be reaped.
#[cfg(target_os = "linux")]
fn is_gone_or_zombie(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => true,
    }
}

#[tokio::test]
async fn probe_reports_exit_status() {
    let (_tmp, dir) = scratch_dir();

    assert!(ProcessRunner::probe(&sh("exit 0", &dir)).await);
    assert!(!ProcessRunner::probe(&sh("exit 1", &dir)).await);
    assert!(!ProcessRunner::probe(&CommandSpec::new("buildpipe-definitely-not-a-binary", vec![], &dir)).await);
}

#[tokio::test]
async fn real_backend_tracks_and_kills_by_task() {
    let (_tmp, dir) = scratch_dir();
    let backend = RealProcessBackend::new();
    let (tx, rx) = mpsc::channel(64);

    backend.spawn(TaskId(9), sh("sleep 30", &dir), tx);
    assert_eq!(backend.live_count(), 1);

    backend.kill(TaskId(9));
    backend.kill(TaskId(9));
    backend.kill(TaskId(10));

    let events = with_timeout(collect(rx)).await;
    assert_eq!(events.last(), Some(&ProcessEventKind::Exited { code: None }));
}
