//! FLAC reader
//!
//! Only the STREAMINFO and VORBIS_COMMENT metadata blocks matter here; the
//! handle never decodes FLAC audio.

use crate::data::CartData;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::{decode_err, try_vec};
use crate::probe::id3v2_tag_size;

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

const BLOCK_STREAMINFO: u8 = 0;
const BLOCK_VORBIS_COMMENT: u8 = 4;

pub(crate) fn open<R>(reader: &mut R, data: &mut CartData, read_metadata: bool) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;

	// The marker may sit behind an ID3v2 tag
	let mut header = [0; 10];
	reader.read_exact(&mut header)?;
	if &header[..3] == b"ID3" {
		reader.seek(SeekFrom::Start(id3v2_tag_size(&header) + 10))?;
	} else {
		reader.seek(SeekFrom::Start(0))?;
	}

	let mut marker = [0; 4];
	reader.read_exact(&mut marker)?;
	if &marker != b"fLaC" {
		return Err(decode_err!(Flac, "Missing stream marker"));
	}

	let mut info = None;
	loop {
		let block_header = reader.read_u32::<BigEndian>()?;
		let last_block = block_header >> 31 == 1;
		let block_type = ((block_header >> 24) & 0x7F) as u8;
		let length = block_header & 0x00FF_FFFF;

		match block_type {
			BLOCK_STREAMINFO => {
				let mut content = try_vec![0; length as usize];
				reader.read_exact(&mut content)?;
				info = Some(stream_info(&content)?);
			},
			BLOCK_VORBIS_COMMENT if read_metadata => {
				let mut content = try_vec![0; length as usize];
				reader.read_exact(&mut content)?;
				apply_comments(&content, data);
			},
			_ => {
				reader.seek(SeekFrom::Current(i64::from(length)))?;
			},
		}

		if last_block {
			break;
		}
	}

	let Some(mut info) = info else {
		return Err(decode_err!(Flac, "File has no STREAMINFO block"));
	};

	if info.samples_per_sec > 0 {
		info.ext_time_length =
			(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
	}

	reader.seek(SeekFrom::Start(0))?;
	Ok(info)
}

fn stream_info(content: &[u8]) -> Result<StreamInfo> {
	if content.len() < 18 {
		return Err(decode_err!(Flac, "STREAMINFO block too short"));
	}

	// Bytes 10..18: 20-bit sample rate, 3-bit channels-1, 5-bit bits-1,
	// 36-bit total sample count
	let packed = BigEndian::read_u64(&content[10..18]);
	let samples_per_sec = (packed >> 44) as u32;
	let channels = ((packed >> 41) & 0x07) as u16 + 1;
	let bits_per_sample = ((packed >> 36) & 0x1F) as u16 + 1;
	let sample_length = packed & 0x000F_FFFF_FFFF;

	if samples_per_sec == 0 {
		return Err(decode_err!(Flac, "Invalid sample rate"));
	}

	let block_align = channels * bits_per_sample.div_ceil(8);
	Ok(StreamInfo {
		format_tag: crate::chunks::fmt::WAVE_FORMAT_FLAC,
		format_chunk: true,
		channels,
		samples_per_sec,
		avg_bytes_per_sec: u32::from(block_align) * samples_per_sec,
		block_align,
		bits_per_sample,
		sample_length,
		data_start: 0,
		data_length: sample_length * u64::from(block_align),
		..StreamInfo::default()
	})
}

fn apply_comments(content: &[u8], data: &mut CartData) {
	let mut artist = None;
	let mut performer = None;

	let mut pos = 0_usize;
	let Some(vendor_len) = read_length(content, &mut pos) else {
		return;
	};
	pos += vendor_len;

	let Some(count) = read_length(content, &mut pos) else {
		return;
	};

	for _ in 0..count {
		let Some(len) = read_length(content, &mut pos) else {
			return;
		};
		if pos + len > content.len() {
			return;
		}
		let comment = String::from_utf8_lossy(&content[pos..pos + len]);
		pos += len;

		let Some((key, value)) = comment.split_once('=') else {
			continue;
		};
		let value = value.to_string();
		match key.to_ascii_uppercase().as_str() {
			"TITLE" => {
				data.title = value;
				data.metadata_found = true;
			},
			"ALBUM" => {
				data.album = value;
				data.metadata_found = true;
			},
			"ORGANIZATION" => {
				data.label = value;
				data.metadata_found = true;
			},
			"ISRC" => {
				data.isrc = value;
				data.metadata_found = true;
			},
			"ARTIST" => artist = Some(value),
			"PERFORMER" => performer = Some(value),
			_ => {},
		}
	}

	// With both fields present, PERFORMER names the artist and ARTIST is
	// demoted to the composer; alone, either one names the artist
	match (artist, performer) {
		(Some(artist), Some(performer)) => {
			data.artist = performer;
			data.composer = artist;
			data.metadata_found = true;
		},
		(Some(artist), None) => {
			data.artist = artist;
			data.metadata_found = true;
		},
		(None, Some(performer)) => {
			data.artist = performer;
			data.metadata_found = true;
		},
		(None, None) => {},
	}
}

fn read_length(content: &[u8], pos: &mut usize) -> Option<usize> {
	let bytes = content.get(*pos..*pos + 4)?;
	*pos += 4;
	Some(LittleEndian::read_u32(bytes) as usize)
}
