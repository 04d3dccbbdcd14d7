//! ecomlens: Olist e-commerce business intelligence
//!
//! A library for loading and cleaning the Brazilian Olist marketplace
//! export, segmenting customers, measuring seasonality, forecasting demand,
//! ranking expansion markets and analysing payments.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
