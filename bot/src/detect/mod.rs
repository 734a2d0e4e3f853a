//! Video link detection and mirror rewriting.
//!
//! Detection is pure: no I/O, no shared state. A single [`LinkExtractor`]
//! can be reused for every feed item in a run.

pub mod extractor;
pub mod types;

pub use extractor::{is_valid_video_id, video_id_from_url, LinkExtractor, ALTERNATIVE_MIRRORS};
pub use types::LinkRecord;
