pub mod normalizer;
pub mod poller;
pub mod task;
pub mod waste;

pub use normalizer::{ResponseNormalizer, DEFAULT_CONFIDENCE};
pub use poller::{PollConfig, PollHandle, StatusClient, TaskPoller, Timer};
pub use task::{
    ClassificationResponse, RemoteStatus, StatusResponse, Submission, SubmissionResponse,
    TaskResult, TaskState, TaskStatus,
};
pub use waste::{
    format_confidence, ClassificationResult, ConfidenceBand, InvariantViolation,
    NormalizationOutcome, WasteCategory,
};
