mod support;

use assert_matches::assert_matches;
use patchwise::{
    apply_change_set, ApplyError, ChangeSet, EventLevel, EventLog, FileChange, Session,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use support::{surface_with_active, DispatcherSpy, SequentialSurface};

const ORIGINALS: [(&str, &str); 3] = [
    ("a.py", "a = 1\n"),
    ("b.py", "b = 1\n"),
    ("c.py", "c = 1\n"),
];

fn three_file_change_set() -> ChangeSet {
    ChangeSet::new(
        ORIGINALS
            .iter()
            .map(|(path, original)| FileChange::new(*path, *original, original.replace('1', "2")))
            .collect(),
    )
    .expect("distinct paths")
}

fn contents(surface: &SequentialSurface) -> Vec<String> {
    ORIGINALS
        .iter()
        .map(|(path, _)| surface.content(path).unwrap_or_default())
        .collect()
}

#[test]
fn three_file_apply_is_all_or_nothing() {
    let change_set = three_file_change_set();
    let all_new: Vec<String> = ["a = 2\n", "b = 2\n", "c = 2\n"]
        .iter()
        .map(|content| content.to_string())
        .collect();
    let all_old: Vec<String> = ORIGINALS
        .iter()
        .map(|(_, content)| content.to_string())
        .collect();

    for failing in [None, Some("a.py"), Some("b.py"), Some("c.py")] {
        let surface = SequentialSurface::new(&ORIGINALS);
        surface.fail_on(failing);

        let result = apply_change_set(&change_set, &surface, &mut |_| {});
        let observed = contents(&surface);

        match failing {
            None => {
                assert!(result.is_ok());
                assert_eq!(observed, all_new);
            }
            Some(path) => {
                assert_matches!(result, Err(ApplyError::Surface { .. }), "failing on {path}");
                assert_eq!(observed, all_old, "failing on {path}");
            }
        }
    }
}

#[test]
fn multi_file_change_set_is_sent_as_one_batch() {
    let surface = SequentialSurface::new(&ORIGINALS);

    apply_change_set(&three_file_change_set(), &surface, &mut |_| {}).expect("apply succeeds");

    assert_eq!(*surface.batch_calls.lock().expect("lock"), 1);
    assert_eq!(*surface.single_calls.lock().expect("lock"), 0);
}

#[test]
fn failed_apply_keeps_the_proposal_for_retry() {
    let surface = surface_with_active("model.py", "x = 1\n");
    let mut session = Session::default();
    let mut dispatcher = DispatcherSpy::default();
    session.submit("add y", &surface, &mut dispatcher, &mut |_| {});
    session.on_backend_reply(
        1,
        &json!({"type": "replace_file", "content": "x = 1\ny = 2\n"}),
        &surface,
        &mut |_| {},
    );

    surface.fail_writes_for("model.py");
    let mut log = EventLog::new();
    assert_matches!(
        session.apply_latest(&surface, &mut log.sink()),
        Err(ApplyError::Surface { .. })
    );
    assert_eq!(log.count(EventLevel::Error), 1);
    assert!(session.change_set(1).is_some());

    surface.clear_failures();
    let report = session.apply_latest(&surface, &mut |_| {}).expect("retry succeeds");
    assert_eq!(report.paths, vec!["model.py"]);
    assert_eq!(surface.content("model.py").as_deref(), Some("x = 1\ny = 2\n"));
}

#[test]
fn applying_a_turn_without_changes_is_an_error() {
    let surface = surface_with_active("model.py", "x = 1\n");
    let mut session = Session::default();
    let mut dispatcher = DispatcherSpy::default();
    session.submit("explain", &surface, &mut dispatcher, &mut |_| {});

    assert_eq!(
        session.apply_turn(0, &surface, &mut |_| {}),
        Err(ApplyError::NoChangeSet { turn: 0 })
    );
}
