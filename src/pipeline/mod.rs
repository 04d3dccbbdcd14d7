//! Pipeline module - loading, cleaning, feature engineering and the analyses

pub mod analysis;
pub mod cleaner;
pub mod correlation;
pub mod customers;
pub mod error;
pub mod features;
pub mod forecast;
pub mod forest;
pub mod loader;
pub mod market;
pub mod missing;
pub mod overview;
pub mod payments;
pub mod quality;
pub mod quantile;
pub mod records;
pub mod rfm;
pub mod seasonal;
pub mod states;
pub mod stats;

pub use analysis::*;
pub use cleaner::{clean_catalog, CleanOptions, CleanedData, CleaningLog};
pub use error::*;
pub use loader::*;
pub use quality::{assess_quality, QualityReport};
pub use rfm::{FrequencyAxis, Segment};
