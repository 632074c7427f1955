use capture_core::{update, CaptureState, Msg, Phase};

#[test]
fn stray_worker_reports_on_idle_state_are_noops() {
    let state = CaptureState::new();
    for msg in [
        Msg::EntryClaimed { index: 0 },
        Msg::EntryCompleted { index: 0, size_bytes: 10 },
        Msg::DownloadsSettled,
        Msg::StopRequested,
        Msg::StopSettled,
        Msg::ArchiveWritten {
            path: "x.zip".to_string(),
        },
    ] {
        let (next, effects) = update(state.clone(), msg);
        assert_eq!(state, next);
        assert!(effects.is_empty());
    }
    assert_eq!(state.view().phase, Phase::Idle);
}
