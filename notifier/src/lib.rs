pub mod adapters;
pub mod campaign;
pub mod commands;
pub mod configuration;
pub mod csv_loader;
pub mod diagnostics;
pub mod domain;
pub mod grouping;
pub mod retry;
pub mod startup;
pub mod templates;
pub mod utils;
