//! The peak envelope (`levl`) chunk

use crate::error::Result;
use crate::macros::decode_err;
use crate::util::text::fixed_string;

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;

// Header size counted from the chunk's fourcc, so the peak block starts at
// content offset BLOCK_DATA_OFFSET - 8
const BLOCK_DATA_OFFSET: u32 = 132;
const HEADER_SIZE: usize = (BLOCK_DATA_OFFSET - 8) as usize;

pub(crate) const LEVL_BLOCK_SIZE: u32 = 1152;
const PEAK_OF_PEAKS_NONE: u32 = 0xFFFF_FFFF;

/// A parsed `levl` chunk: one 16-bit peak per channel per 1152-sample frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevlChunk {
	pub version: u32,
	pub format: u32,
	pub points_per_value: u32,
	pub block_size: u32,
	pub channels: u32,
	pub frames: u32,
	pub peak_of_peaks_offset: u32,
	pub timestamp: Option<NaiveDateTime>,
	/// Channel-interleaved peaks, `channels * frames` entries
	pub peaks: Vec<u16>,
}

impl LevlChunk {
	pub(crate) fn new(channels: u32, peaks: Vec<u16>, timestamp: Option<NaiveDateTime>) -> Self {
		let frames = if channels == 0 {
			0
		} else {
			peaks.len() as u32 / channels
		};
		Self {
			version: 0,
			format: 2,
			points_per_value: 1,
			block_size: LEVL_BLOCK_SIZE,
			channels,
			frames,
			peak_of_peaks_offset: PEAK_OF_PEAKS_NONE,
			timestamp,
			peaks,
		}
	}

	/// The highest peak in the table, `0` when no peak-of-peaks is recorded
	pub fn peak_value(&self) -> u16 {
		if self.peak_of_peaks_offset == PEAK_OF_PEAKS_NONE {
			return 0;
		}
		self.peaks
			.get(self.peak_of_peaks_offset as usize)
			.copied()
			.unwrap_or(0)
	}

	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < HEADER_SIZE {
			return Err(decode_err!("levl chunk too short"));
		}

		let block_size = LittleEndian::read_u32(&content[12..16]);
		let channels = LittleEndian::read_u32(&content[16..20]);
		let frames = LittleEndian::read_u32(&content[20..24]);
		let peak_of_peaks_offset = LittleEndian::read_u32(&content[24..28]);
		let timestamp = NaiveDateTime::parse_from_str(
			fixed_string(&content[32..55])
				.trim_end_matches(":000")
				.trim(),
			"%Y:%m:%d:%H:%M:%S",
		)
		.ok();

		// Only the standard frame geometry carries a usable peak table
		let mut peaks = Vec::new();
		if block_size == LEVL_BLOCK_SIZE {
			let data_start = LittleEndian::read_u32(&content[28..32]).saturating_sub(8) as usize;
			let wanted = channels as usize * frames as usize;
			if data_start > content.len() || (content.len() - data_start) / 2 < wanted {
				return Err(decode_err!("levl peak table truncated"));
			}
			peaks.reserve(wanted);
			for i in 0..wanted {
				peaks.push(LittleEndian::read_u16(
					&content[data_start + 2 * i..data_start + 2 * i + 2],
				));
			}
		}

		Ok(LevlChunk {
			version: LittleEndian::read_u32(&content[0..4]),
			format: LittleEndian::read_u32(&content[4..8]),
			points_per_value: LittleEndian::read_u32(&content[8..12]),
			block_size,
			channels,
			frames,
			peak_of_peaks_offset,
			timestamp,
			peaks,
		})
	}

	pub(crate) fn render(&self) -> Vec<u8> {
		let mut content = vec![0_u8; HEADER_SIZE + 2 * self.peaks.len()];
		LittleEndian::write_u32(&mut content[0..4], self.version);
		LittleEndian::write_u32(&mut content[4..8], self.format);
		LittleEndian::write_u32(&mut content[8..12], self.points_per_value);
		LittleEndian::write_u32(&mut content[12..16], self.block_size);
		LittleEndian::write_u32(&mut content[16..20], self.channels);
		LittleEndian::write_u32(&mut content[20..24], self.frames);
		LittleEndian::write_u32(&mut content[24..28], self.peak_of_peaks_offset);
		LittleEndian::write_u32(&mut content[28..32], BLOCK_DATA_OFFSET);
		if let Some(timestamp) = self.timestamp {
			let stamp = timestamp.format("%Y:%m:%d:%H:%M:%S:000").to_string();
			content[32..32 + stamp.len()].copy_from_slice(stamp.as_bytes());
		}
		for (i, peak) in self.peaks.iter().enumerate() {
			LittleEndian::write_u16(
				&mut content[HEADER_SIZE + 2 * i..HEADER_SIZE + 2 * i + 2],
				*peak,
			);
		}
		content
	}
}
