use crate::{CaptureState, Effect, FileStatus, Msg, Phase};

const UNFINISHED_DOWNLOAD: &str = "download did not finish";

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not fit the current phase are ignored and produce no
/// effects, so late worker reports cannot move a finished session.
pub fn update(mut state: CaptureState, msg: Msg) -> (CaptureState, Vec<Effect>) {
    let effects = match msg {
        Msg::CaptureStarted { url } => {
            if state.phase().is_active() {
                return (state, Vec::new());
            }
            state.begin(url);
            vec![Effect::PublishProgress]
        }
        Msg::ResourcesDiscovered(entries) => {
            if state.phase() != Phase::Analyzing || state.stop_requested() {
                return (state, Vec::new());
            }
            state.set_entries(entries);
            state.set_phase(Phase::Downloading);
            vec![Effect::PublishProgress]
        }
        Msg::EntryClaimed { index } => publish_if(state.claim(index)),
        Msg::EntryCompleted { index, size_bytes } => publish_if(state.finish(index, Ok(size_bytes))),
        Msg::EntryFailed { index, error } => publish_if(state.finish(index, Err(error))),
        Msg::DownloadsSettled => {
            if state.phase() != Phase::Downloading || state.stop_requested() {
                return (state, Vec::new());
            }
            fail_unfinished(&mut state);
            state.set_phase(Phase::Saving);
            vec![Effect::PublishProgress]
        }
        Msg::ArchiveWritten { path } => {
            if state.phase() != Phase::Saving || state.stop_requested() {
                return (state, Vec::new());
            }
            state.set_archive_path(path);
            state.set_phase(Phase::Completed);
            vec![Effect::PublishProgress]
        }
        Msg::StopRequested => {
            if !state.phase().is_active() || state.stop_requested() {
                return (state, Vec::new());
            }
            state.request_stop();
            vec![Effect::SignalStop]
        }
        Msg::StopSettled => {
            if !state.phase().is_active() || !state.stop_requested() {
                return (state, Vec::new());
            }
            state.set_phase(Phase::Stopped);
            vec![Effect::PublishProgress]
        }
        Msg::Failed { message } => {
            if !state.phase().is_active() {
                return (state, Vec::new());
            }
            state.set_error(message);
            state.set_phase(Phase::Error);
            vec![Effect::PublishProgress]
        }
    };

    (state, effects)
}

fn publish_if(changed: bool) -> Vec<Effect> {
    if changed {
        vec![Effect::PublishProgress]
    } else {
        Vec::new()
    }
}

/// Entries still in flight when the pool drained (a worker died) are closed
/// as failed so the file list only holds terminal statuses while saving.
fn fail_unfinished(state: &mut CaptureState) {
    let unfinished: Vec<(usize, FileStatus)> = state
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.status.is_terminal())
        .map(|(i, e)| (i, e.status))
        .collect();
    for (index, status) in unfinished {
        if status == FileStatus::Pending {
            state.claim_for_close(index);
        }
        state.finish(index, Err(UNFINISHED_DOWNLOAD.to_string()));
    }
}
