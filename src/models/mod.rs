//! Data models for the chart digest pipeline
//!
//! Price bars flow in from the data source, pick up indicator columns,
//! get trimmed to a display window, and leave as rendered chart artifacts
//! collected into a digest.

pub mod chart;
pub mod indicator;
pub mod digest;

// Re-export commonly used types for convenience
pub use chart::{PricePoint, PriceChange, ChartSummary, ChartArtifact};
pub use indicator::{MovingAverage, IndicatorSeries, DisplayWindow};
pub use digest::Digest;
