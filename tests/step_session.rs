//! Step protocol tests against a scripted stand-in for the engine.
//!
//! The "engine" is `sh` and the "program" is a shell script, so the flags
//! list is emptied.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use unyo::{DecodeError, EngineConfig, SnapshotFormat, StepError, StepSession, VisualGraph};

fn mock_engine() -> EngineConfig {
    EngineConfig {
        binary: PathBuf::from("sh"),
        flags: Vec::new(),
        extra_args: Vec::new(),
        keepalive_ms: 5,
        ..EngineConfig::default()
    }
}

fn script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("program.sh");
    std::fs::write(&path, body).unwrap();
    path
}

fn echo_lines(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|l| format!("echo '{}'\n", l))
        .collect()
}

const STEP_1: &str = r#"{"nodes":[{"id":1,"label":"a"}],"edges":[]}"#;
const STEP_2: &str = r#"{"nodes":[{"id":1,"label":"a"},{"id":2,"label":"b"}],"edges":[{"source":1,"target":2}]}"#;
const STEP_3: &str = r#"{"nodes":[{"id":2,"label":"c"}],"edges":[]}"#;

#[test]
fn test_three_steps_then_exit() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1, STEP_2, STEP_3]));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert!(session.has_next());
    let first = session.next_graph().unwrap();
    assert_eq!(first.nodes().len(), 1);
    let second = session.next_graph().unwrap();
    assert_eq!(second.edges().len(), 1);
    let third = session.next_graph().unwrap();
    assert_eq!(third.nodes()[0].label, "c");
    assert_eq!(session.steps(), 3);

    match session.next_graph() {
        Err(StepError::ProcessExited { steps }) => assert_eq!(steps, 3),
        other => panic!("expected ProcessExited, got {:?}", other.map(|_| ())),
    }
    assert!(!session.has_next());
    assert!(session.is_closed());
}

#[test]
fn test_has_next_drains_buffered_lines_after_exit() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1, STEP_2, STEP_3]));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    // Let the script finish before anything is consumed
    thread::sleep(Duration::from_millis(200));

    let mut seen = 0;
    while session.has_next() {
        session.next_graph().unwrap();
        seen += 1;
    }
    assert_eq!(seen, 3);
    assert!(!session.has_next());
}

#[test]
fn test_iterator_yields_each_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1, STEP_2]));
    let session = StepSession::open(&program, &mock_engine()).unwrap();

    let graphs: Vec<_> = session.filter_map(Result::ok).collect();
    assert_eq!(graphs.len(), 2);
    assert_eq!(graphs[1].nodes().len(), 2);
}

#[test]
fn test_blank_lines_are_not_steps() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "echo ''\n{}echo '   '\n{}",
        echo_lines(&[STEP_1]),
        echo_lines(&[STEP_2])
    );
    let program = script(&dir, &body);
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert_eq!(session.next_graph().unwrap().nodes().len(), 1);
    assert_eq!(session.next_graph().unwrap().nodes().len(), 2);
}

#[test]
fn test_stderr_is_kept_out_of_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!("echo 'warning: unused rule' >&2\n{}", echo_lines(&[STEP_1]));
    let program = script(&dir, &body);
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert_eq!(session.next_graph().unwrap().nodes()[0].label, "a");
}

#[test]
fn test_malformed_line_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1, "Segmentation fault", STEP_2]));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    session.next_graph().unwrap();
    match session.next_graph() {
        Err(StepError::Protocol { step, .. }) => assert_eq!(step, 2),
        other => panic!("expected Protocol, got {:?}", other.map(|_| ())),
    }

    // No silent skipping to the next good line
    assert!(!session.has_next());
    assert!(matches!(session.next_graph(), Err(StepError::Closed)));
}

#[test]
fn test_dangling_edge_is_a_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad = r#"{"nodes":[{"id":1,"label":"a"}],"edges":[{"source":1,"target":9}]}"#;
    let program = script(&dir, &echo_lines(&[bad]));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert!(matches!(
        session.next_graph(),
        Err(StepError::Protocol { step: 1, .. })
    ));
}

#[test]
fn test_exit_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, "exit 1\n");
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert!(matches!(
        session.next_graph(),
        Err(StepError::ProcessExited { steps: 0 })
    ));
}

#[test]
fn test_missing_binary_fails_to_launch() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1]));
    let engine = EngineConfig {
        binary: PathBuf::from("/nonexistent/unyo-engine"),
        ..mock_engine()
    };

    assert!(matches!(
        StepSession::open(&program, &engine),
        Err(StepError::ProcessLaunch { .. })
    ));
}

#[test]
fn test_missing_program_fails_to_launch() {
    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("missing.lmn");

    assert!(matches!(
        StepSession::open(&program, &mock_engine()),
        Err(StepError::ProcessLaunch { .. })
    ));
}

#[test]
fn test_closer_unblocks_pending_next() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &format!("{}exec sleep 30\n", echo_lines(&[STEP_1])));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();
    session.next_graph().unwrap();

    let closer = session.closer();
    let killer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        closer.close();
    });

    assert!(matches!(
        session.next_graph(),
        Err(StepError::ProcessExited { steps: 1 })
    ));
    killer.join().unwrap();
}

#[test]
fn test_close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, "exec sleep 30\n");
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();
    assert!(session.has_next());

    session.close();
    session.close();

    assert!(!session.has_next());
    assert!(matches!(session.next_graph(), Err(StepError::Closed)));
}

#[test]
fn test_first_step_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, &echo_lines(&[STEP_1]));
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    let graph = session.next_graph().unwrap();
    assert_eq!(graph.nodes().len(), 1);
    assert_eq!(graph.nodes()[0].label, "a");
    assert!(graph.edges().is_empty());

    let mut visual = VisualGraph::with_seed(40.0, 0);
    visual.rewrite(&graph);
    assert_eq!(visual.len(), 1);
    assert_eq!(visual.node(1).unwrap().label, "a");
}

#[test]
fn test_invalid_utf8_is_a_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(&dir, "printf '\\377\\376 garbage\\n'\n");
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    match session.next_graph() {
        Err(StepError::Protocol {
            step: 1,
            source: DecodeError::Utf8(_),
        }) => {}
        other => panic!("expected Protocol(Utf8), got {:?}", other.map(|_| ())),
    }
    assert!(!session.has_next());
}

#[test]
fn test_engine_waiting_on_stdin_keeps_stepping() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "read a\n{}read b\n{}",
        echo_lines(&[STEP_1]),
        echo_lines(&[r#"{"nodes":[],"edges":[]}"#])
    );
    let program = script(&dir, &body);
    let mut session = StepSession::open(&program, &mock_engine()).unwrap();

    assert_eq!(session.next_graph().unwrap().nodes().len(), 1);
    assert!(session.next_graph().unwrap().is_empty());
    assert_eq!(session.steps(), 2);
}

#[test]
fn test_atom_dump_steps() {
    let dir = tempfile::tempdir().unwrap();
    let dump = r#"{"atoms":[{"id":1,"name":"a","links":[{"attr":0,"data":2}]},{"id":2,"name":"b","links":[{"attr":0,"data":1}]}],"membranes":[]}"#;
    let program = script(&dir, &echo_lines(&[dump]));
    let engine = EngineConfig {
        format: SnapshotFormat::Atoms,
        ..mock_engine()
    };
    let mut session = StepSession::open(&program, &engine).unwrap();

    let graph = session.next_graph().unwrap();
    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.node(2).unwrap().display_label(), "b/1");
}
