//! Client-side core for the workflow uploader: the HTTP client, the
//! identity seam, and the two controllers the front ends drive.

pub mod api;
pub mod error;
pub mod identity;
pub mod notify;
pub mod session;
pub mod submission;
pub mod timer;
pub mod validation;

pub use api::{ApiClient, ApiClientOptions};
pub use error::RequestError;
pub use identity::{ApiIdentityBackend, IdentityBackend, IdentityError, SessionChange};
pub use notify::{Notification, NotificationKind, Notifier, NotifierEvent};
pub use session::{SessionController, SessionSnapshot, SessionStatus};
pub use submission::{
    SelectOutcome, SubmissionController, SubmissionObserver, SubmissionPhase, SubmissionSnapshot,
    SubmitBlocked, SubmitOutcome, UploadCandidate, WorkflowUploader,
};
pub use validation::ValidationError;
