use std::path::Path;

use crate::capture::{CaptureOutcome, ExceptionCapture};
use crate::config;
use crate::host::scenario::Scenario;
use crate::host::CommittedContext;
use crate::Result;

/// Replay the exception event described by a scenario file and return what
/// reached the sink.
pub fn run(scenario_path: &Path, project_root: Option<&Path>) -> Result<(CaptureOutcome, Vec<CommittedContext>)> {
    let text = std::fs::read_to_string(scenario_path)?;
    let replay = Scenario::from_json(&text)?.build()?;
    let settings = config::resolve(project_root);
    tracing::info!(
        "Replaying {} (frame depth {}, {} extra exclusion(s))",
        scenario_path.display(),
        settings.frame_depth,
        settings.excluded_prefixes.len()
    );

    let capture = ExceptionCapture::new(&settings, replay.capabilities);
    let outcome = capture.on_exception_thrown(&replay.host, &replay.event);
    Ok((outcome, replay.host.committed()))
}

/// `excapture replay <scenario.json>`: print committed contexts as JSON.
pub fn replay(scenario_path: &Path) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let (outcome, committed) = run(scenario_path, Some(&cwd))?;
    match &outcome {
        CaptureOutcome::Filtered => eprintln!("Event filtered: throwing type is excluded."),
        CaptureOutcome::Completed { committed } => eprintln!("Committed {} frame(s).", committed),
        CaptureOutcome::Abandoned { committed, reason } => {
            eprintln!("Capture stopped after {} frame(s): {}", committed, reason)
        }
    }
    println!("{}", serde_json::to_string_pretty(&committed)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_scenario_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(
            &path,
            r#"{
                "types": [
                    {"name": "com/acme/Billing", "sourceFile": "Billing.java"},
                    {"name": "com/acme/PaymentDeclined"}
                ],
                "methods": [{
                    "id": "charge", "owner": "com/acme/Billing", "name": "charge",
                    "descriptor": "(I)V", "static": true,
                    "lineTable": [[0, 30], [4, 31]],
                    "locals": [{"slot": 0, "name": "cents", "signature": "I"}]
                }],
                "objects": [{"id": "e", "type": "com/acme/PaymentDeclined"}],
                "threads": [{"id": 9, "frames": [{"method": "charge", "location": 5, "slots": {"0": {"int": 1250}}}]}],
                "event": {"thread": 9, "method": "charge", "location": 5, "exception": "e"}
            }"#,
        )
        .unwrap();

        let (outcome, committed) = run(&path, Some(dir.path())).unwrap();
        assert_eq!(outcome.committed(), 1);
        assert_eq!(committed[0].source_file, "Billing.java");
        assert_eq!(committed[0].line, 31);
        assert_eq!(committed[0].arguments[0].name, "cents");
    }

    #[test]
    fn test_project_settings_apply() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".excapture")).unwrap();
        std::fs::write(
            dir.path().join(".excapture/settings.json"),
            r#"{"filter.excludedPrefixes": ["Lcom/acme/"]}"#,
        )
        .unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(
            &path,
            r#"{
                "types": [{"name": "com/acme/Billing"}],
                "methods": [{"id": "m", "owner": "com/acme/Billing", "name": "run", "descriptor": "()V", "static": true}],
                "objects": [{"id": "e", "type": "com/acme/Billing"}],
                "threads": [{"id": 1, "frames": [{"method": "m", "location": 0}]}],
                "event": {"thread": 1, "method": "m", "location": 0, "exception": "e"}
            }"#,
        )
        .unwrap();

        let (outcome, committed) = run(&path, Some(dir.path())).unwrap();
        assert!(matches!(outcome, CaptureOutcome::Filtered));
        assert!(committed.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = run(&dir.path().join("absent.json"), None);
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
