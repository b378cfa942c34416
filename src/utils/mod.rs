pub mod dirs;
pub mod http;
pub mod progress;
