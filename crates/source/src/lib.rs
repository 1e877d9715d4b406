pub mod http;
pub mod provider;

pub use http::{HttpSource, SourceCfg};
pub use provider::{MockSource, RangeSamples, SampleSource, SourceError, SourceFuture};
