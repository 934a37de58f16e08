pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod report;
pub mod slicer;

pub use batch::{
    BatchHandle, BatchOutcome, BatchRequest, BatchRunner, BatchState, BatchStats, ProgressSink,
};
pub use config::{Config, FailurePolicy, SampleFormat};
pub use error::{Result, SlicerError};
pub use report::{SliceItem, SliceMapping, TaskItem};
pub use slicer::{SilenceSlicer, SliceAlgorithm, SliceParameters, SliceSpan};
