use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod chat;
pub mod events;
pub mod game;
pub mod health;
pub mod room;
pub mod validation;
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Current time formatted as RFC 3339, used to stamp chat messages.
pub fn now_rfc3339() -> String {
    format_system_time(SystemTime::now())
}
