use std::{fs, path::PathBuf};

use tempfile::tempdir;

use keel_cli::{Args, CliError, run, session::SessionOutput};
use keel_core::position::PositionSource;

/// Collects all .toml session files from a directory
fn collect_session_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

fn sessions_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sessions")
}

fn args(input: &PathBuf, output: &PathBuf) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        output: output.to_string_lossy().to_string(),
        config: None,
        log_level: "off".to_string(),
    }
}

fn replay(name: &str) -> SessionOutput {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output_path = temp_dir.path().join("positions.toml");
    run(&args(&sessions_dir().join(name), &output_path)).expect("session should replay");

    let written = fs::read_to_string(&output_path).expect("output should be written");
    toml::from_str(&written).expect("output should be valid TOML")
}

#[test]
fn e2e_smoke_test_bundled_sessions() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let sessions = collect_session_files(sessions_dir());

    assert!(!sessions.is_empty(), "No sessions found in sessions/");

    let mut failed = Vec::new();

    for session_path in &sessions {
        let output_filename = format!(
            "{}.positions.toml",
            session_path.file_stem().unwrap().to_string_lossy()
        );
        let output_path = temp_dir.path().join(output_filename);

        if let Err(e) = run(&args(session_path, &output_path)) {
            failed.push((session_path.clone(), e));
        }
    }

    if !failed.is_empty() {
        eprintln!("\nSessions that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} session(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn e2e_drag_undo_redo_session() {
    let output = replay("drag_undo.toml");

    assert!(output.can_undo);
    assert!(!output.can_redo);
    assert_eq!(output.history_len, 2);

    let a = &output.nodes[0];
    assert_eq!(a.id, "a");
    assert_eq!((a.x, a.y), (500.0, 500.0));
    assert_eq!(a.source, PositionSource::Restored);
    // Redo restores the whole snapshot, b included.
    assert_eq!(output.nodes[1].source, PositionSource::Restored);
}

#[test]
fn e2e_incremental_edit_session() {
    let output = replay("incremental_edit.toml");

    let ids: Vec<String> = output.nodes.iter().map(|node| node.id.to_string()).collect();
    assert_eq!(ids, vec!["queue", "worker"]);

    let queue = &output.nodes[0];
    assert_eq!((queue.x, queue.y), (400.0, 40.0));
    assert_eq!(queue.source, PositionSource::UserDragged);
    assert_eq!(output.nodes[1].source, PositionSource::LayoutComputed);
}

#[test]
fn e2e_load_document_session() {
    let output = replay("load_document.toml");

    let client = &output.nodes[0];
    assert_eq!((client.x, client.y), (40.0, 40.0));
    assert_eq!(client.source, PositionSource::Loaded);
    let cache = &output.nodes[2];
    assert_eq!(cache.source, PositionSource::LayoutComputed);
    assert!(output.can_undo);
}

#[test]
fn e2e_malformed_session_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = temp_dir.path().join("broken.toml");
    let output = temp_dir.path().join("positions.toml");
    fs::write(&input, "[[step]]\naction = \"graph\"\nnodes = [{ id = \"a\" }]\n").unwrap();

    let err = run(&args(&input, &output)).unwrap_err();
    assert!(matches!(err, CliError::Session { .. }), "got {err:?}");
    assert!(!output.exists());
}

#[test]
fn e2e_dangling_edge_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = temp_dir.path().join("dangling.toml");
    let output = temp_dir.path().join("positions.toml");
    fs::write(
        &input,
        "[[step]]\naction = \"graph\"\nnodes = [{ id = \"a\", type = \"t\" }]\nedges = [{ source = \"a\", target = \"b\" }]\n",
    )
    .unwrap();

    let err = run(&args(&input, &output)).unwrap_err();
    assert!(matches!(err, CliError::Step { step: 1, .. }), "got {err:?}");
}

#[test]
fn e2e_missing_config_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output = temp_dir.path().join("positions.toml");
    let mut args = args(&sessions_dir().join("drag_undo.toml"), &output);
    args.config = Some(temp_dir.path().join("nope.toml").to_string_lossy().to_string());

    let err = run(&args).unwrap_err();
    assert!(matches!(err, CliError::Config(_)), "got {err:?}");
}
