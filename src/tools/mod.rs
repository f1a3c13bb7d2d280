//! Project helper commands that do not drive the runtime

pub mod init;
pub mod ngrok;
pub mod setup;
pub mod template;
