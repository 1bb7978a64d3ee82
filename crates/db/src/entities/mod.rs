pub mod activity;
pub mod agent_run;
pub mod decision;
pub mod event_outbox;
pub mod memory_file;
pub mod project;
pub mod task;
pub mod usage_record;
