//! Core pipeline for multi-rubric submission scoring.
//!
//! One submission flows through a preprocessor (which may run a local
//! deterministic sentence splitter on the model's request), fans out to four
//! concurrent rubric reviewers, joins, and is merged by the arbiter into a
//! single gated score. All structured output from the completion service is
//! untrusted and routed through [`decode::safe_decode`]; any stage that
//! cannot get a usable answer degrades to a documented default instead of
//! failing the pipeline.

pub mod arbiter;
pub mod config;
pub mod decode;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod providers;
pub mod review;
pub mod split;
pub mod stream;

pub use config::PipelineConfig;
pub use model::{FinalVerdict, PreprocessedRecord, ReviewVerdict, ReviewerId};
pub use pipeline::Pipeline;
pub use stream::{StreamBus, StreamEvent};
