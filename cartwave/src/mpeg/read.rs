//! Raw MPEG stream reader

use super::header::MpegHeader;
use crate::chunks::fmt::WAVE_FORMAT_MPEG;
use crate::data::CartData;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::probe::Detection;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use id3::TagLike;

/// Opens a raw MPEG stream: decodes the first frame behind any leading ID3v2
/// tag and derives the payload geometry net of the surrounding tags
pub(crate) fn open<R>(reader: &mut R, detection: &Detection, file_len: u64) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	let (header, total_frames) = MpegHeader::read(reader, detection.mpeg_frame_offset)?;

	let data_start = detection.mpeg_frame_offset;
	let mut data_length = file_len.saturating_sub(data_start);
	if has_id3v1_trailer(reader, file_len)? {
		data_length = data_length.saturating_sub(128);
	}

	let mut info = StreamInfo {
		format_tag: WAVE_FORMAT_MPEG,
		format_chunk: true,
		channels: header.channels,
		samples_per_sec: header.samples_per_sec,
		avg_bytes_per_sec: header.bitrate / 8,
		bits_per_sample: 0,
		head_layer: header.layer,
		head_bit_rate: header.bitrate,
		head_mode: header.mode,
		head_flags: header.flags,
		mpeg_frame_size: header.legacy_frame_size(),
		data_start,
		data_length,
		..StreamInfo::default()
	};

	match total_frames {
		Some(total_frames) => {
			info.sample_length = u64::from(total_frames) * u64::from(header.samples_per_frame);
		},
		// No VBR tag, assume constant bitrate
		None if info.mpeg_frame_size > 0 => {
			info.sample_length = 1152 * (data_length / u64::from(info.mpeg_frame_size));
		},
		None => {},
	}
	if header.samples_per_sec > 0 {
		info.ext_time_length =
			(1000 * info.sample_length / u64::from(header.samples_per_sec)) as i64;
	}

	reader.seek(SeekFrom::Start(data_start))?;
	Ok(info)
}

fn has_id3v1_trailer<R>(reader: &mut R, file_len: u64) -> Result<bool>
where
	R: Read + Seek,
{
	if file_len < 128 {
		return Ok(false);
	}
	reader.seek(SeekFrom::Start(file_len - 128))?;
	let mut tag = [0; 3];
	reader.read_exact(&mut tag)?;
	Ok(&tag == b"TAG")
}

fn frame_text(tag: &id3::Tag, id: &str) -> Option<String> {
	let frame = tag.get(id)?;
	match frame.content() {
		id3::Content::Text(text) => Some(text.clone()),
		_ => None,
	}
}

/// Reads descriptive ID3 metadata onto a record
///
/// Failure to parse the tag block is tolerated; plenty of legacy encoders
/// wrote tags nothing modern can read.
pub(crate) fn read_id3_metadata(path: &Path, data: &mut CartData) {
	let tag = match id3::Tag::read_from_path(path) {
		Ok(tag) => tag,
		Err(err) => {
			log::debug!("Unable to read ID3 tags: {err}");
			return;
		},
	};

	if let Some(title) = tag.title() {
		data.title = title.to_string();
		data.metadata_found = true;
	}
	if let Some(artist) = tag.artist() {
		data.artist = artist.to_string();
		data.metadata_found = true;
	}
	if let Some(album) = tag.album() {
		data.album = album.to_string();
		data.metadata_found = true;
	}
	if let Some(label) = frame_text(&tag, "TPUB") {
		data.label = label;
		data.metadata_found = true;
	}
	if let Some(composer) = frame_text(&tag, "TCOM") {
		data.composer = composer;
		data.metadata_found = true;
	}
	if let Some(conductor) = frame_text(&tag, "TPE3") {
		data.conductor = conductor;
		data.metadata_found = true;
	}
	if let Some(isrc) = frame_text(&tag, "TSRC") {
		data.isrc = isrc;
		data.metadata_found = true;
	}
	if let Some(copyright) = frame_text(&tag, "TCOP") {
		data.copyright_notice = copyright;
		data.metadata_found = true;
	}
	if let Some(year) = tag.year() {
		if year > 0 {
			data.release_year = year;
			data.metadata_found = true;
		}
	}
	if let Some(bpm) = frame_text(&tag, "TBPM") {
		// Fractional BPM values keep only the integer part
		if let Ok(beats) = bpm.split('.').next().unwrap_or_default().trim().parse::<i32>() {
			if beats > 0 {
				data.beats_per_minute = beats;
				data.metadata_found = true;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::open;
	use crate::probe::{Detection, FileType, detect};

	use std::io::Cursor;

	fn cbr_stream(frames: usize) -> Vec<u8> {
		// MPEG 1 Layer III, 160 kbps, 44.1 kHz
		let frame_size = 144_000 * 160 / 44_100;
		let mut stream = Vec::new();
		for _ in 0..frames {
			stream.extend_from_slice(&[0xFF, 0xFB, 0xA0, 0x40]);
			stream.resize(stream.len() + frame_size - 4, 0);
		}
		stream
	}

	#[test_log::test]
	fn cbr_geometry() {
		let stream = cbr_stream(10);
		let file_len = stream.len() as u64;
		let mut cursor = Cursor::new(stream);

		let detection = detect(&mut cursor).unwrap().unwrap();
		assert_eq!(detection.file_type, FileType::Mpeg);

		let info = open(&mut cursor, &detection, file_len).unwrap();
		assert_eq!(info.head_layer, 3);
		assert_eq!(info.head_bit_rate, 160_000);
		assert_eq!(info.data_start, 0);
		assert_eq!(info.data_length, file_len);
		// 144 * 160000 / 44100 = 522
		assert_eq!(info.mpeg_frame_size, 522);
		assert_eq!(info.sample_length, 1152 * (file_len / 522));
	}

	#[test]
	fn id3v1_trailer_excluded() {
		let mut stream = cbr_stream(10);
		let payload_len = stream.len() as u64;
		stream.extend_from_slice(b"TAG");
		stream.resize(stream.len() + 125, 0);

		let file_len = stream.len() as u64;
		let mut cursor = Cursor::new(stream);
		let detection = Detection {
			file_type: FileType::Mpeg,
			mpeg_frame_offset: 0,
			id3v2_tag: false,
		};

		let info = open(&mut cursor, &detection, file_len).unwrap();
		assert_eq!(info.data_length, payload_len);
	}
}
