pub mod config;
pub mod cron;
pub mod events;
pub mod pricing;
pub mod status_files;
