pub mod client;
pub mod config;
pub mod lobby;
pub mod state;

pub const VERSION: &str = env!("MUSTER_VERSION");
