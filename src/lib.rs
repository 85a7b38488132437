//! sputterview: browse sputtering-tool datalogs and recipe-run tables and
//! chart process parameters per job, recipe, and layer.

pub mod config;
pub mod plot;
pub mod store;
pub mod web;
