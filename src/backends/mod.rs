pub mod traits;
pub mod ytdlp;

pub use traits::{
    BackendProgress, ExtractionBackend, Postprocess, RetrievalBackend, RetrievalRequest,
};
pub use ytdlp::YtDlpBackend;
