pub mod consumer;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod input;
pub mod markup;
pub mod outbound;
pub mod pipeline;
pub mod record;
pub mod session;

pub use consumer::{ChatSurface, ConsumerConfig, ConsumerExit, ConsumerLoop, ConsumerReport};
pub use error::{
    AuthenticationError, ExtractionError, ProbeError, SendError, SessionError, SurfaceError,
};
pub use ingest::{IngestExit, IngestReport, Ingestor};
pub use input::{ClearPolicy, KeyInput};
pub use markup::normalize;
pub use pipeline::{Pipeline, PipelineConfig};
pub use record::{ChatRecord, Fingerprint, FingerprintMode, RawFragment};
pub use session::{FragmentProbe, OutgoingSender, SessionLease, SessionRelease};
