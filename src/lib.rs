pub mod applier;
pub mod client;
pub mod config;
pub mod crd;
pub mod error;
pub mod poll;
pub mod predicate;
pub mod query;
pub mod suites;
