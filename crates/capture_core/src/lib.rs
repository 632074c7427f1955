//! Capture core: data model, option handling and the pure session state machine.
mod effect;
mod msg;
mod options;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use options::{
    CaptureOptions, OptionWarning, ParsedOptions, DEFAULT_MAX_FILES, DEFAULT_TIMEOUT_SECONDS,
    MAX_MAX_FILES, MAX_TIMEOUT_SECONDS, MIN_MAX_FILES, MIN_TIMEOUT_SECONDS,
};
pub use state::{
    normalize_url_for_dedupe, CaptureState, FileEntry, FileStatus, Phase, ResourceKind,
};
pub use update::update;
pub use view_model::{ProgressInfo, StatusCounts};
