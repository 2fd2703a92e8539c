//! FORM/AIFF reader

use crate::chunk::{CHUNK_AREA_START, Chunks};
use crate::chunks::fmt::WAVE_FORMAT_PCM;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::decode_err;

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};

/// Opens an AIFF file: `COMM` gives the audio parameters, `SSND` the payload
///
/// The `SSND` body carries an 8-byte offset/block-size preamble before the
/// first sample, excluded from the payload geometry.
pub(crate) fn open<R>(reader: &mut R, file_len: u64) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	let mut info = StreamInfo {
		format_tag: WAVE_FORMAT_PCM,
		..StreamInfo::default()
	};

	reader.seek(SeekFrom::Start(CHUNK_AREA_START))?;
	let mut chunks = Chunks::<BigEndian>::new(file_len.saturating_sub(CHUNK_AREA_START));
	let mut ssnd = false;

	while chunks.next(reader)? {
		match &chunks.fourcc {
			b"COMM" => {
				let content = chunks.content(reader)?;
				if content.len() < 18 {
					return Err(decode_err!(Aiff, "COMM chunk too short"));
				}
				info.format_chunk = true;
				info.channels = BigEndian::read_u16(&content[0..2]);
				info.sample_length = u64::from(BigEndian::read_u32(&content[2..6]));
				info.bits_per_sample = BigEndian::read_u16(&content[6..8]);
				// The sample rate is an 80-bit extended float; for every rate
				// that occurs in practice the top two mantissa bytes hold the
				// integer value directly
				info.samples_per_sec =
					256 * u32::from(content[10]) + u32::from(content[11]);
				chunks.correct_position(reader)?;
			},
			b"SSND" => {
				if chunks.size < 8 {
					return Err(decode_err!(Aiff, "SSND chunk too short"));
				}
				info.data_length = u64::from(chunks.size) - 8;
				info.data_start = reader.stream_position()? + 8;
				ssnd = true;
				chunks.skip(reader)?;
			},
			_ => chunks.skip(reader)?,
		}
	}

	if !ssnd {
		return Err(decode_err!(Aiff, "File does not contain an SSND chunk"));
	}

	if info.samples_per_sec > 0 {
		info.ext_time_length =
			(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
	}

	reader.seek(SeekFrom::Start(info.data_start))?;
	Ok(info)
}
