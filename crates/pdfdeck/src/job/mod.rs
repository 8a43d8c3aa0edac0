pub mod model;
pub mod registry;

pub use model::{ConversionMode, Job, JobId, JobStatus, JobView};
pub use registry::{JobRegistry, StatusCounts};
