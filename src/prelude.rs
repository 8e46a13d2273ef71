//! Shared constants, re-exported the way the teacher's `prelude.rs` gathers
//! status/buffer constants for glob import across modules. Adapted to this
//! design's timing/size knobs (§5's IDLE/LINGER timers, §4.9's accept-len
//! cap) rather than the teacher's unrelated upload/session constants.

pub use crate::error::{Error, Result};

pub const MAX_REQUEST_LINE_LEN: usize = 8192;
pub const MAX_HEADER_BYTES: usize = 65536;
pub const READ_CHUNK: usize = 4096;

pub const IDLE_READ_TIMELIMIT_SECS: u64 = 15;
pub const IDLE_SEND_TIMELIMIT_SECS: u64 = 300;
pub const LINGER_TIME_MILLIS: u64 = 500;
pub const CGI_HARD_KILL_DELAY_SECS: u64 = 5;
