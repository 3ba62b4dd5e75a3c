//! Upload → preprocess → split → train pipeline
//!
//! [`Session`] owns the working set of one client. Each stage reads what its
//! predecessor committed and fails fast when that is absent.

mod session;
mod summary;

pub use session::{Partitions, Session, PREVIEW_ROWS};
pub use summary::{PreprocessSummary, SessionStatus, SplitSummary, TrainSummary, UploadSummary};
