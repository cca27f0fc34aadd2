//! vcrwrap - record/replay HTTP exchanges in tests, one cassette per test
//!
//! Cassettes are named after the test that uses them
//! (`<module>.<Owner>.<method>.yaml`) and matched with a JSON-aware query
//! comparison by default.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod external_call;
pub mod interaction;
pub mod logging;
pub mod matching;
pub mod naming;
pub mod recorder;

pub use config::{RecordMode, Settings, VcrConfig, VcrOptions};
pub use error::{Result, VcrError};
pub use external_call::{ExternalCall, Session};
pub use interaction::{Interaction, Request, Response};
pub use naming::{CassetteName, Owner, TestTarget};
pub use recorder::{CassetteGuard, Vcr};
