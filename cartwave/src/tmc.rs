//! TM Century GoldDisc files
//!
//! A 4-byte little-endian payload length, the MPEG payload itself, then a
//! plain-text tag block. Tags come as a `#NAME` line followed by a value
//! line.

use crate::data::CartData;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::mpeg;
use crate::probe::Detection;
use crate::util::time::parse_time_length;

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

const PAYLOAD_START: u64 = 4;

pub(crate) fn open<R>(reader: &mut R, data: &mut CartData) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;
	let payload_length = u64::from(reader.read_u32::<LittleEndian>()?);

	let detection = Detection {
		file_type: crate::probe::FileType::Tmc,
		mpeg_frame_offset: PAYLOAD_START,
		id3v2_tag: false,
	};
	let mut info = mpeg::open(reader, &detection, payload_length + PAYLOAD_START)?;
	info.data_length = payload_length;
	if info.mpeg_frame_size > 0 {
		info.sample_length = 1152 * (payload_length / u64::from(info.mpeg_frame_size));
	}
	if info.samples_per_sec > 0 {
		info.ext_time_length =
			(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
	}

	read_metadata(reader, payload_length, data, info.ext_time_length)?;

	reader.seek(SeekFrom::Start(PAYLOAD_START))?;
	Ok(info)
}

// Walks the text block behind the payload. Lines may end in CR, LF, or CRLF.
fn read_metadata<R>(
	reader: &mut R,
	payload_length: u64,
	data: &mut CartData,
	ext_time_length: i64,
) -> Result<()>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(payload_length + PAYLOAD_START))?;

	let mut lines = Vec::new();
	{
		let mut buffered = BufReader::new(reader.by_ref());
		let mut raw = Vec::new();
		loop {
			raw.clear();
			if buffered.read_until(b'\r', &mut raw)? == 0 {
				break;
			}
			for line in String::from_utf8_lossy(&raw).split(['\r', '\n']) {
				let line = line.trim();
				if !line.is_empty() {
					lines.push(line.to_string());
				}
			}
		}
	}

	let mut tag: Option<String> = None;
	for line in lines {
		if let Some(name) = line.strip_prefix('#') {
			tag = Some(name.to_ascii_uppercase());
			continue;
		}
		let Some(name) = tag.take() else {
			continue;
		};
		apply_tag(&name, &line, data, ext_time_length);
	}

	Ok(())
}

fn apply_tag(name: &str, value: &str, data: &mut CartData, ext_time_length: i64) {
	match name {
		"TITLE" => {
			data.title = value.to_string();
			data.metadata_found = true;
		},
		"ARTIST" => {
			data.artist = value.to_string();
			data.metadata_found = true;
		},
		"COMPOSER" => {
			data.composer = value.to_string();
			data.metadata_found = true;
		},
		"PUBLISHER" => {
			data.publisher = value.to_string();
			data.metadata_found = true;
		},
		"LICENSE" => {
			data.licensing_organization = value.to_string();
			data.metadata_found = true;
		},
		"LABEL" => {
			data.label = value.to_string();
			data.metadata_found = true;
		},
		"ALBUM" => {
			data.album = value.to_string();
			data.metadata_found = true;
		},
		"YEAR" => {
			if let Ok(year) = value.trim().parse::<i32>() {
				data.release_year = year;
				data.metadata_found = true;
			}
		},
		"INTRO" => {
			if let Some(msecs) = parse_time_length(value) {
				data.talk_start_pos = 0;
				data.talk_end_pos = msecs;
				data.metadata_found = true;
			}
		},
		"AUX" => {
			if let Some(msecs) = parse_time_length(value) {
				data.segue_start_pos = msecs;
				data.segue_end_pos = ext_time_length;
				data.metadata_found = true;
			}
		},
		"TMCIREF" => {
			data.song_id = value.to_string();
			data.metadata_found = true;
		},
		"BPM" => {
			if let Ok(beats) = value.trim().parse::<i32>() {
				data.beats_per_minute = beats;
				data.metadata_found = true;
			}
		},
		"ISRC" => {
			data.isrc = value.replace(' ', "");
			data.metadata_found = true;
		},
		"PLINE" => {
			data.copyright_notice = value.to_string();
			data.metadata_found = true;
		},
		_ => {},
	}
}
