pub mod config;
pub mod feature;
pub mod job;
pub mod record;

pub use config::AppConfig;
pub use feature::{Feature, FeatureCollection, Geometry};
pub use job::JobState;
pub use record::{Attachment, FieldValue, Record, Thumbnail, Thumbnails};
