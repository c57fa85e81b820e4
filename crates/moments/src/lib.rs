pub mod cache;
pub mod flow;
pub mod media;
pub mod queries;

pub use cache::QueryCache;
pub use flow::{FlowError, FlowState, MomentForm, RegistrationFlow};
pub use media::{MAX_VIDEO_DURATION_SECONDS, MediaError, MediaFile};
