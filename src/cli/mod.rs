pub mod analyze;
pub mod chart;
pub mod clear;
pub mod export;
pub mod fetch;
pub mod funds;
pub mod init;
pub mod prompt;
pub mod setup;
pub mod ui;
