pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod grid;
pub mod interpolation;
pub mod logging;
pub mod pipeline;
pub mod readers;
pub mod triangulation;
pub mod utils;
pub mod writers;
