use std::sync::Mutex;

use capture_core::{Phase, ProgressInfo};
use capture_engine::ProgressObserver;
use capture_logging::{capture_debug, capture_info};

/// Logs phase transitions and per-status file counts.
#[derive(Default)]
pub struct LoggingObserver {
    last: Mutex<Option<(Phase, usize)>>,
}

impl ProgressObserver for LoggingObserver {
    fn on_progress(&self, progress: &ProgressInfo) {
        let counts = progress.status_counts();
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let phase_changed = last.is_none_or(|(phase, _)| phase != progress.phase);
        let finished_changed = last.is_none_or(|(_, done)| done != progress.completed_files);
        *last = Some((progress.phase, progress.completed_files));
        drop(last);

        if phase_changed {
            capture_info!(
                "phase {:?}: {} files (pending {}, downloading {}, completed {}, failed {})",
                progress.phase,
                progress.total_files,
                counts.pending,
                counts.downloading,
                counts.completed,
                counts.failed
            );
        } else if finished_changed {
            capture_info!(
                "{}/{} files done ({} failed)",
                progress.completed_files,
                progress.total_files,
                counts.failed
            );
        } else if let Some(current) = &progress.current_file {
            capture_debug!("downloading {}", current);
        }
    }
}
