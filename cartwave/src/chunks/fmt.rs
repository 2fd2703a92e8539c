//! The `fmt ` and `fact` chunks

use crate::error::Result;
use crate::macros::{decode_err, encode_err};

use byteorder::{ByteOrder, LittleEndian};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_MPEG: u16 = 0x0050;
pub const WAVE_FORMAT_MPEGLAYER3: u16 = 0x0055;

// Handle-internal tags for the non-RIFF formats, never written to disk
pub const WAVE_FORMAT_VORBIS: u16 = 0xFF01;
pub const WAVE_FORMAT_FLAC: u16 = 0xFF02;
pub const WAVE_FORMAT_M4A: u16 = 0xFF03;

// ACM MPEG mode words
pub const ACM_MPEG_STEREO: u16 = 0x0001;
pub const ACM_MPEG_JOINTSTEREO: u16 = 0x0002;
pub const ACM_MPEG_DUALCHANNEL: u16 = 0x0004;
pub const ACM_MPEG_SINGLECHANNEL: u16 = 0x0008;

// ACM MPEG flag bits
pub const ACM_MPEG_PRIVATEBIT: u16 = 0x0001;
pub const ACM_MPEG_COPYRIGHT: u16 = 0x0002;
pub const ACM_MPEG_ORIGINALHOME: u16 = 0x0004;
pub const ACM_MPEG_PROTECTIONBIT: u16 = 0x0008;
pub const ACM_MPEG_ID_MPEG1: u16 = 0x0010;

/// A parsed `fmt ` chunk
///
/// The MPEG extension words (`head_*`) are only meaningful when `format_tag`
/// is [`WAVE_FORMAT_MPEG`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatChunk {
	pub format_tag: u16,
	pub channels: u16,
	pub samples_per_sec: u32,
	pub avg_bytes_per_sec: u32,
	pub block_align: u16,
	pub bits_per_sample: u16,
	pub head_layer: u16,
	pub head_bit_rate: u32,
	pub head_mode: u16,
	pub head_mode_ext: u16,
	pub head_emphasis: u16,
	pub head_flags: u16,
}

impl FormatChunk {
	/// The full-scale sample value for the chunk's bit depth, used as the
	/// cart chunk's level reference
	///
	/// MPEG streams carry no bit depth and keep the 16-bit reference.
	pub(crate) fn level_reference(&self) -> u32 {
		match self.bits_per_sample {
			8 => 0x80,
			24 => 0x0080_0000,
			32 => 0x8000_0000,
			_ => 0x8000,
		}
	}

	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < 14 {
			return Err(decode_err!(Wave, "fmt chunk too short"));
		}

		let mut fmt = FormatChunk {
			format_tag: LittleEndian::read_u16(&content[0..2]),
			channels: LittleEndian::read_u16(&content[2..4]),
			samples_per_sec: LittleEndian::read_u32(&content[4..8]),
			avg_bytes_per_sec: LittleEndian::read_u32(&content[8..12]),
			block_align: LittleEndian::read_u16(&content[12..14]),
			..FormatChunk::default()
		};

		if fmt.format_tag == WAVE_FORMAT_PCM || fmt.format_tag == WAVE_FORMAT_IEEE_FLOAT {
			if content.len() < 16 {
				return Err(decode_err!(Wave, "PCM fmt chunk too short"));
			}
			fmt.bits_per_sample = LittleEndian::read_u16(&content[14..16]);
		}

		if fmt.format_tag == WAVE_FORMAT_MPEG {
			if content.len() < 32 {
				return Err(decode_err!(Wave, "MPEG fmt chunk too short"));
			}
			fmt.head_layer = LittleEndian::read_u16(&content[18..20]);
			fmt.head_bit_rate = LittleEndian::read_u32(&content[20..24]);
			fmt.head_mode = LittleEndian::read_u16(&content[24..26]);
			fmt.head_mode_ext = LittleEndian::read_u16(&content[26..28]);
			fmt.head_emphasis = LittleEndian::read_u16(&content[28..30]);
			fmt.head_flags = LittleEndian::read_u16(&content[30..32]);
		}

		Ok(fmt)
	}

	/// Builds a PCM `fmt ` chunk, fixing the derived fields
	pub(crate) fn for_pcm(channels: u16, samples_per_sec: u32, bits_per_sample: u16) -> Result<Self> {
		if channels != 1 && channels != 2 {
			return Err(encode_err!(Wave, "Unsupported channel count"));
		}
		if samples_per_sec == 0 {
			return Err(encode_err!(Wave, "Sample rate must be nonzero"));
		}

		let block_align = match bits_per_sample {
			8 => channels,
			16 => 2 * channels,
			24 => 3 * channels,
			32 => 4 * channels,
			_ => return Err(encode_err!(Wave, "Unsupported bit depth")),
		};

		Ok(FormatChunk {
			format_tag: WAVE_FORMAT_PCM,
			channels,
			samples_per_sec,
			avg_bytes_per_sec: u32::from(block_align) * samples_per_sec,
			block_align,
			bits_per_sample,
			..FormatChunk::default()
		})
	}

	/// Builds an MPEG `fmt ` chunk, fixing the derived fields
	///
	/// `padding_used` comes from the mext chunk state and changes the average
	/// byte rate computation for the rates where MPEG frames divide evenly.
	pub(crate) fn for_mpeg(
		channels: u16,
		samples_per_sec: u32,
		head_layer: u16,
		head_bit_rate: u32,
		head_mode: u16,
		head_flags: u16,
		padding_used: bool,
	) -> Result<Self> {
		if channels != 1 && channels != 2 {
			return Err(encode_err!(Wave, "Unsupported channel count"));
		}
		if samples_per_sec == 0 {
			return Err(encode_err!(Wave, "Sample rate must be nonzero"));
		}
		if head_layer == 0 {
			return Err(encode_err!(Wave, "MPEG layer not set"));
		}
		if head_bit_rate == 0 {
			return Err(encode_err!(Wave, "MPEG bit rate not set"));
		}
		if head_mode == 0 {
			return Err(encode_err!(Wave, "MPEG mode not set"));
		}

		let block_align = (144 * head_bit_rate / samples_per_sec) as u16;

		// For the rates where 1152-sample frames pack without padding, the
		// exact byte rate comes from the frame geometry instead of bitrate/8
		let avg_bytes_per_sec = if !padding_used && matches!(samples_per_sec, 11025 | 22050 | 44100)
		{
			samples_per_sec * u32::from(block_align) / 1152
		} else {
			head_bit_rate / 8
		};

		Ok(FormatChunk {
			format_tag: WAVE_FORMAT_MPEG,
			channels,
			samples_per_sec,
			avg_bytes_per_sec,
			block_align,
			bits_per_sample: 0,
			head_layer,
			head_bit_rate,
			head_mode,
			head_mode_ext: 0,
			head_emphasis: 0,
			head_flags: head_flags | ACM_MPEG_ID_MPEG1,
		})
	}

	/// Renders the chunk content, 18 bytes for PCM and 40 for MPEG
	pub(crate) fn render(&self) -> Vec<u8> {
		let cb_size: u16 = if self.format_tag == WAVE_FORMAT_MPEG {
			40
		} else {
			0
		};

		let mut content = vec![0; if self.format_tag == WAVE_FORMAT_MPEG { 40 } else { 18 }];
		LittleEndian::write_u16(&mut content[0..2], self.format_tag);
		LittleEndian::write_u16(&mut content[2..4], self.channels);
		LittleEndian::write_u32(&mut content[4..8], self.samples_per_sec);
		LittleEndian::write_u32(&mut content[8..12], self.avg_bytes_per_sec);
		LittleEndian::write_u16(&mut content[12..14], self.block_align);
		LittleEndian::write_u16(&mut content[14..16], self.bits_per_sample);
		LittleEndian::write_u16(&mut content[16..18], cb_size);

		if self.format_tag == WAVE_FORMAT_MPEG {
			LittleEndian::write_u16(&mut content[18..20], self.head_layer);
			LittleEndian::write_u32(&mut content[20..24], self.head_bit_rate);
			LittleEndian::write_u16(&mut content[24..26], self.head_mode);
			LittleEndian::write_u16(&mut content[26..28], self.head_mode_ext);
			LittleEndian::write_u16(&mut content[28..30], self.head_emphasis);
			LittleEndian::write_u16(&mut content[30..32], self.head_flags);
		}

		content
	}
}

/// A parsed `fact` chunk, the stream's sample count
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FactChunk {
	pub sample_length: u32,
}

impl FactChunk {
	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < 4 {
			return Err(decode_err!(Wave, "fact chunk too short"));
		}

		Ok(FactChunk {
			sample_length: LittleEndian::read_u32(&content[0..4]),
		})
	}

	pub(crate) fn render(self) -> [u8; 4] {
		self.sample_length.to_le_bytes()
	}
}
