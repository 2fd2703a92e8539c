//! Raw MPEG audio streams

mod header;
mod read;

pub use header::MpegHeader;
pub(crate) use read::{open, read_id3_metadata};
