pub mod assets;
pub mod log_msg;
pub mod msg_store;
pub mod response;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
