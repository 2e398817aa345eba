pub mod cleanup;
pub mod cli;
pub mod config;
pub mod controller;
pub mod document;
pub mod engine;
pub mod error;
pub mod executor;
pub mod packager;
pub mod primitives;
pub mod report;
pub mod session;
pub mod single_flight;
pub mod tools;
pub mod util;
