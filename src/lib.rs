//! Terminal chat client for a single `/api/chat` endpoint.
//!
//! [`format`] turns reply text into structured blocks, [`session`] owns the
//! transcript and the single-flight guard, and [`ui`] plus [`app`] put both
//! on screen.

pub mod app;
pub mod commands;
pub mod config;
pub mod events;
pub mod format;
pub mod logging;
pub mod session;
pub mod transport;
pub mod ui;
