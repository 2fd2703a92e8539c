//! MPEG audio frame header parsing

use crate::chunks::fmt::{
	ACM_MPEG_COPYRIGHT, ACM_MPEG_DUALCHANNEL, ACM_MPEG_ID_MPEG1, ACM_MPEG_JOINTSTEREO,
	ACM_MPEG_ORIGINALHOME, ACM_MPEG_PRIVATEBIT, ACM_MPEG_SINGLECHANNEL, ACM_MPEG_STEREO,
};
use crate::error::Result;
use crate::macros::{decode_err, try_vec};

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};

// Bitrates in kbps, indexed [version][layer][bitrate index]. -1 marks a
// reserved combination; 0 is free format.
#[rustfmt::skip]
const BITRATES: [[[i32; 16]; 4]; 4] = [
	// MPEG 2.5
	[
		[-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1],
		[0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, -1],
		[0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, -1],
		[0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, -1],
	],
	// Reserved version
	[
		[-1; 16],
		[-1; 16],
		[-1; 16],
		[-1; 16],
	],
	// MPEG 2
	[
		[-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1],
		[0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, -1],
		[0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, -1],
		[0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, -1],
	],
	// MPEG 1
	[
		[-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1],
		[0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, -1],
		[0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, -1],
		[0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, -1],
	],
];

// Sample rates indexed [version][sample rate index], -1 reserved
const SAMPLE_RATES: [[i32; 4]; 4] = [
	[11_025, 12_000, 8000, -1],
	[-1, -1, -1, -1],
	[22_050, 24_000, 16_000, -1],
	[44_100, 48_000, 32_000, -1],
];

const CHANNELS: [u16; 4] = [2, 2, 2, 1];

const HEAD_MODES: [u16; 4] = [
	ACM_MPEG_STEREO,
	ACM_MPEG_JOINTSTEREO,
	ACM_MPEG_DUALCHANNEL,
	ACM_MPEG_SINGLECHANNEL,
];

// Header layer index to layer number
const LAYER_NUMBERS: [u16; 4] = [0, 3, 2, 1];

const SAMPLES_PER_FRAME: [[u32; 4]; 4] = [
	[0, 576, 1152, 384],
	[0, 0, 0, 384],
	[0, 576, 1152, 384],
	[0, 1152, 1152, 384],
];

// Offset of the Xing/Info tag within a frame's body, indexed [version][mode]
const SIDE_DATA_OFFSETS: [[usize; 4]; 4] = [
	[17, 17, 17, 9],
	[0, 0, 0, 0],
	[17, 17, 17, 9],
	[32, 32, 32, 17],
];

/// A decoded MPEG audio frame header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MpegHeader {
	/// Layer number (1, 2, or 3)
	pub layer: u16,
	/// Bit rate in bits per second, `0` for free format
	pub bitrate: u32,
	pub samples_per_sec: u32,
	pub channels: u16,
	/// ACM mode word for the `fmt ` chunk
	pub mode: u16,
	/// ACM flag word for the `fmt ` chunk
	pub flags: u16,
	/// Exact size of this frame in bytes, including the header
	pub frame_size: u32,
	pub samples_per_frame: u32,
	side_data_offset: usize,
}

impl MpegHeader {
	/// Decodes a 4-byte frame header
	pub fn parse(header: [u8; 4]) -> Result<Self> {
		if header[0] != 0xFF || header[1] & 0xE0 != 0xE0 {
			return Err(decode_err!(Mpeg, "Invalid frame sync"));
		}

		let version_index = usize::from((header[1] & 0x18) >> 3);
		if version_index == 1 {
			return Err(decode_err!(Mpeg, "Reserved MPEG version"));
		}

		let layer_index = usize::from((header[1] & 0x06) >> 1);
		if layer_index == 0 {
			return Err(decode_err!(Mpeg, "Reserved MPEG layer"));
		}

		let bitrate_index = usize::from((header[2] & 0xF0) >> 4);
		let bitrate = BITRATES[version_index][layer_index][bitrate_index];
		if bitrate < 0 {
			return Err(decode_err!(Mpeg, "Reserved bitrate"));
		}
		let bitrate = 1000 * bitrate as u32;

		let samplerate_index = usize::from((header[2] & 0x0C) >> 2);
		let samples_per_sec = SAMPLE_RATES[version_index][samplerate_index];
		if samples_per_sec < 0 {
			return Err(decode_err!(Mpeg, "Reserved sample rate"));
		}
		let samples_per_sec = samples_per_sec as u32;

		let padding = u32::from((header[2] & 0x02) >> 1);
		let mode_index = usize::from((header[3] & 0xC0) >> 6);

		let mut flags = 0;
		if header[2] & 0x01 != 0 {
			flags |= ACM_MPEG_PRIVATEBIT;
		}
		if header[3] & 0x08 != 0 {
			flags |= ACM_MPEG_COPYRIGHT;
		}
		if header[3] & 0x04 != 0 {
			flags |= ACM_MPEG_ORIGINALHOME;
		}
		if version_index == 3 {
			flags |= ACM_MPEG_ID_MPEG1;
		}

		let kbps = bitrate / 1000;
		let frame_size = if layer_index == 3 {
			(12_000 * kbps / samples_per_sec + padding) * 4
		} else {
			144_000 * kbps / samples_per_sec + padding
		};

		Ok(MpegHeader {
			layer: LAYER_NUMBERS[layer_index],
			bitrate,
			samples_per_sec,
			channels: CHANNELS[mode_index],
			mode: HEAD_MODES[mode_index],
			flags,
			frame_size,
			samples_per_frame: SAMPLES_PER_FRAME[version_index][layer_index],
			side_data_offset: SIDE_DATA_OFFSETS[version_index][mode_index],
		})
	}

	/// The legacy frame size used when deriving sample counts from a payload
	/// byte count
	pub fn legacy_frame_size(&self) -> u32 {
		if self.samples_per_sec == 0 {
			return 0;
		}
		144 * self.bitrate / self.samples_per_sec
	}

	/// Reads and decodes the frame at `offset`, returning the header and the
	/// total frame count from a Xing/Info VBR tag when one is present
	pub(crate) fn read<R>(reader: &mut R, offset: u64) -> Result<(Self, Option<u32>)>
	where
		R: Read + Seek,
	{
		reader.seek(SeekFrom::Start(offset))?;

		let mut header = [0; 4];
		reader.read_exact(&mut header)?;
		let parsed = Self::parse(header)?;

		if parsed.frame_size <= 4 {
			return Ok((parsed, None));
		}

		let mut body = try_vec![0; parsed.frame_size as usize - 4];
		if reader.read(&mut body)? != body.len() {
			return Err(decode_err!(Mpeg, "Truncated first frame"));
		}

		let side = parsed.side_data_offset;
		let mut total_frames = None;
		if body.len() >= side + 12
			&& (&body[side..side + 4] == b"Xing" || &body[side..side + 4] == b"Info")
			&& body[side + 7] & 0x01 == 0x01
		{
			total_frames = Some(BigEndian::read_u32(&body[side + 8..side + 12]));
		}

		Ok((parsed, total_frames))
	}
}
