//! Control socket for local clients

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Request, Response, MAX_FRAME_LEN};
pub use server::{read_frame, write_frame, HealthSource, Server, ServerContext};
