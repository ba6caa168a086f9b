// Library interface for WeightRS modules
// This allows integration tests to access the core functionality

pub mod badges;
pub mod body;
pub mod comparison;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod import;
pub mod insights;
pub mod logging;
pub mod metabolic;
pub mod models;
pub mod numeric;
pub mod patterns;
pub mod persistence;
pub mod projection;
pub mod reports;
pub mod series;
pub mod stats;
pub mod store;
pub mod tracker;

// Re-export commonly used types for convenience
pub use dates::{Clock, FixedClock, SystemClock};
pub use error::{Result, TrackerError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::{Settings, WeightRecord};
pub use projection::{Projection, ProjectionCalculator};
pub use stats::{AnalysisContext, AnalyticsConfig, AnalyticsSnapshot, StatsCalculator};
pub use store::{OverwritePolicy, RecordStore};
pub use tracker::Tracker;
