//! Cassettes: persisted recordings of HTTP exchanges

mod format;
mod player;

pub use format::{read as read_file, write as write_file, CassetteFile, FORMAT_VERSION};
pub use player::{Cassette, CassetteHandle};
