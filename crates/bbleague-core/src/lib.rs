// Library root: league model, scoring, result parsing and the aggregators
// that turn a season snapshot into tables.

pub mod casualties;
pub mod model;
pub mod parser;
pub mod repository;
pub mod scoring;
pub mod service;
pub mod standings;
pub mod submission;
