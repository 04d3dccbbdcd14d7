//! Report module - dashboard pages, exports and the run summary

pub mod export;
pub mod pages;
pub mod summary;

pub use export::*;
pub use pages::{parse_pages, render_page, Page};
pub use summary::*;
