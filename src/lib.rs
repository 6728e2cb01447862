//! Straylight: natural-language flight booking parser.
//!
//! Turns "fly from Delhi to Mumbai after 5 days" into a structured booking
//! payload. Entity extraction is delegated to a local LLM; everything the
//! model says is treated as untrusted and validated here.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod booking;
pub mod config;
pub mod logging;
pub mod providers;
pub mod server;
