use capture_core::{
    normalize_url_for_dedupe, update, CaptureOptions, CaptureState, FileEntry, Msg, ResourceKind,
    MAX_MAX_FILES, MAX_TIMEOUT_SECONDS, MIN_MAX_FILES, MIN_TIMEOUT_SECONDS,
};
use proptest::prelude::*;

fn arb_field_value() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|v| v.to_string()),
        any::<u32>().prop_map(|v| format!("\"{v}\"")),
        Just("null".to_string()),
        Just("true".to_string()),
        Just("\"abc\"".to_string()),
        (-1.0e6f64..1.0e6f64).prop_map(|v| format!("{v:.3}")),
    ]
}

#[derive(Debug, Clone)]
enum WorkerMsg {
    Claim(usize),
    Complete(usize),
    Fail(usize),
    Stop,
}

fn arb_worker_msg(n: usize) -> impl Strategy<Value = WorkerMsg> {
    prop_oneof![
        (0..n).prop_map(WorkerMsg::Claim),
        (0..n).prop_map(WorkerMsg::Complete),
        (0..n).prop_map(WorkerMsg::Fail),
        Just(WorkerMsg::Stop),
    ]
}

proptest! {
    #[test]
    fn numeric_options_are_always_in_range(
        timeout in arb_field_value(),
        max_files in arb_field_value(),
        include_timeout in any::<bool>(),
        include_max in any::<bool>(),
    ) {
        let mut fields = Vec::new();
        if include_timeout {
            fields.push(format!("\"timeoutSeconds\": {timeout}"));
        }
        if include_max {
            fields.push(format!("\"maxFiles\": {max_files}"));
        }
        let raw = format!("{{{}}}", fields.join(","));
        let options = CaptureOptions::from_json(&raw).options;

        prop_assert!((MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&options.timeout_seconds));
        prop_assert!((MIN_MAX_FILES..=MAX_MAX_FILES).contains(&options.max_files));
        prop_assert!(options.create_zip);
    }

    #[test]
    fn arbitrary_text_never_escapes_the_bounds(raw in ".{0,64}") {
        let options = CaptureOptions::from_json(&raw).options;
        prop_assert!((MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&options.timeout_seconds));
        prop_assert!((MIN_MAX_FILES..=MAX_MAX_FILES).contains(&options.max_files));
    }

    #[test]
    fn completed_files_is_monotonic_and_bounded(
        n in 1usize..8,
        script in prop::collection::vec(arb_worker_msg(8), 0..64),
    ) {
        let entries = (0..n)
            .map(|i| FileEntry::pending(format!("https://e.com/{i}.js"), format!("js/{i}.js"), ResourceKind::Script))
            .collect();
        let (state, _) = update(CaptureState::new(), Msg::CaptureStarted { url: "https://e.com/".into() });
        let (mut state, _) = update(state, Msg::ResourcesDiscovered(entries));

        let mut last = 0;
        for step in script {
            let msg = match step {
                WorkerMsg::Claim(i) => Msg::EntryClaimed { index: i },
                WorkerMsg::Complete(i) => Msg::EntryCompleted { index: i, size_bytes: 1 },
                WorkerMsg::Fail(i) => Msg::EntryFailed { index: i, error: "x".into() },
                WorkerMsg::Stop => Msg::StopRequested,
            };
            state = update(state, msg).0;
            let view = state.view();
            prop_assert!(view.completed_files >= last);
            prop_assert!(view.completed_files <= view.total_files);
            prop_assert_eq!(view.total_files, n);
            last = view.completed_files;
        }
    }

    #[test]
    fn dedupe_key_ignores_fragments(path in "[a-z]{1,8}", frag in "[a-z]{0,8}") {
        let plain = format!("https://Example.com:443/{path}");
        let with_fragment = format!("https://example.com/{path}#{frag}");
        prop_assert_eq!(normalize_url_for_dedupe(&plain), normalize_url_for_dedupe(&with_fragment));
    }
}
