// Network adapter modules split by participant sockets vs HTTP routes.

pub mod client;
pub mod internal;

pub use client::{spawn_session_serializer, ws_handler};
pub use internal::{create_session_handler, list_sessions_handler};
