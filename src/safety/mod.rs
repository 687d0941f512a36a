pub mod advisor;
pub mod intensity;

pub use advisor::{Advisory, AdvisoryCategory, AdvisoryContext, AdvisoryLog, SafetyAdvisor, Urgency};
pub use intensity::{IntensitySummary, IntensityTracker};
