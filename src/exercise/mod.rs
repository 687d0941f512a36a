pub mod classifier;
pub mod form;
pub mod mode;
pub mod rep;
pub mod signal;

pub use classifier::ExerciseClassifier;
pub use form::{FormChecker, FormIssue};
pub use mode::{ExerciseMode, ModeRole, ModeTable};
pub use rep::{RepDebouncer, RepDetector, RepEvent, RepPhase, RepRejection};
