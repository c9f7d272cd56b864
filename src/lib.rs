// Library exports for the binary and tests
pub mod cli;
pub mod config;
pub mod install;
pub mod setup;
