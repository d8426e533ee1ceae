pub mod cancel;
pub mod runner;
pub mod session;

pub use cancel::{CancelToken, UploadTicket};
pub use runner::{Committed, UploadPipeline};
pub use session::{UploadReport, UploadSession, UploadStatus};
