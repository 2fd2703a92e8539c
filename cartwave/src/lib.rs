//! Parse, write, and record the audio containers used in broadcast automation.
//!
//! The crate centers on [`CartFile`], a reusable handle over one audio file.
//! Opening a file detects its container (RIFF/WAVE with cart/bext/mext/levl
//! chunks, AIFF, FLAC, Ogg Vorbis, raw MPEG, and the legacy ATX and TMC
//! envelopes), reads the stream geometry, and projects any embedded metadata
//! onto a [`CartData`] record.
//!
//! # Examples
//!
//! ## Reading a file
//!
//! ```rust,no_run
//! # fn main() -> cartwave::error::Result<()> {
//! use cartwave::data::CartData;
//! use cartwave::file::CartFile;
//!
//! let mut data = CartData::new();
//! let mut file = CartFile::new("cut001.wav");
//! file.open(Some(&mut data))?;
//!
//! println!(
//! 	"{:?}, {} Hz, {} ms: {}",
//! 	file.file_type(),
//! 	file.samples_per_sec(),
//! 	file.ext_time_length(),
//! 	data.title
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Recording a file
//!
//! ```rust,no_run
//! # fn main() -> cartwave::error::Result<()> {
//! use cartwave::data::CartData;
//! use cartwave::file::{CartFile, RecordFormat};
//!
//! let mut data = CartData::new();
//! data.title = "Legal ID".to_string();
//!
//! let mut file = CartFile::new("cut002.wav");
//! file.enable_cart_chunk(true);
//! file.enable_levl_chunk(true);
//! file.create(
//! 	&data,
//! 	RecordFormat::Pcm {
//! 		channels: 2,
//! 		samples_per_sec: 44_100,
//! 		bits_per_sample: 16,
//! 	},
//! 	0,
//! )?;
//!
//! let samples = vec![0_u8; 4608];
//! file.write(&samples)?;
//! file.close(None)?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod chunks;
pub mod config;
pub mod data;
pub mod error;
pub mod file;
pub mod mpeg;
pub mod probe;

pub(crate) mod aiff;
pub(crate) mod atx;
pub(crate) mod chunk;
pub(crate) mod energy;
pub(crate) mod flac;
pub(crate) mod m4a;
pub(crate) mod macros;
pub(crate) mod ogg;
pub(crate) mod tmc;
pub(crate) mod wave;
mod util;

pub use config::ParseOptions;
pub use data::{CartData, CartType, MARKER_UNSET, UsageCode};
pub use error::{CartwaveError, Result};
pub use file::{CartFile, RecordFormat};
pub use m4a::Mp4Decoder;
pub use ogg::{OggPacket, VorbisEncoder};
pub use probe::FileType;
