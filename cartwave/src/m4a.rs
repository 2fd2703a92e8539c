//! MPEG-4 audio support
//!
//! The container itself is walked natively for the stream parameters and the
//! iTunes-style metadata. Turning the payload back into PCM takes an external
//! [`Mp4Decoder`]; without one the handle refuses M4A files entirely.

use crate::data::CartData;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::{decode_err, try_vec};

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

/// An externally supplied MPEG-4 audio decoder
pub trait Mp4Decoder {
	/// Decodes the file at `path` into interleaved 16-bit little-endian PCM
	fn decode(&mut self, path: &Path) -> Result<Vec<u8>>;
}

pub(crate) fn is_m4a<R>(reader: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;
	let mut header = [0; 8];
	if reader.read(&mut header)? != 8 {
		return Ok(false);
	}
	Ok(&header[4..8] == b"ftyp")
}

pub(crate) fn open<R>(reader: &mut R, data: &mut CartData, read_metadata: bool) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	let Some(moov) = read_top_level_atom(reader, b"moov")? else {
		return Err(decode_err!(M4a, "File has no moov atom"));
	};

	let mut info = None;
	for (fourcc, content) in Atoms::new(&moov) {
		match &fourcc {
			b"trak" if info.is_none() => info = sound_track_info(content),
			b"udta" if read_metadata => {
				if let Some(ilst) = child(content, b"meta")
					.filter(|meta| meta.len() >= 4)
					.and_then(|meta| child(&meta[4..], b"ilst"))
				{
					apply_item_list(ilst, data);
				}
			},
			_ => {},
		}
	}

	let Some(info) = info else {
		return Err(decode_err!(M4a, "File has no sound track"));
	};

	reader.seek(SeekFrom::Start(0))?;
	Ok(info)
}

fn read_top_level_atom<R>(reader: &mut R, fourcc: &[u8; 4]) -> Result<Option<Vec<u8>>>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;

	let mut header = [0; 8];
	loop {
		if reader.read(&mut header)? != 8 {
			return Ok(None);
		}

		let mut size = u64::from(BigEndian::read_u32(&header[..4]));
		let mut header_size = 8_u64;
		if size == 1 {
			let mut extended = [0; 8];
			reader.read_exact(&mut extended)?;
			size = BigEndian::read_u64(&extended);
			header_size = 16;
		}
		if size < header_size {
			return Ok(None);
		}

		if &header[4..8] == fourcc {
			let mut content = try_vec![0; (size - header_size) as usize];
			reader.read_exact(&mut content)?;
			return Ok(Some(content));
		}

		reader.seek(SeekFrom::Current((size - header_size) as i64))?;
	}
}

// Walks the child atoms of an already-buffered container atom
struct Atoms<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Atoms<'a> {
	fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}
}

impl<'a> Iterator for Atoms<'a> {
	type Item = ([u8; 4], &'a [u8]);

	fn next(&mut self) -> Option<Self::Item> {
		let header = self.buf.get(self.pos..self.pos + 8)?;
		let size = BigEndian::read_u32(&header[..4]) as usize;
		if size < 8 || self.pos + size > self.buf.len() {
			return None;
		}

		let fourcc = header[4..8].try_into().ok()?;
		let content = &self.buf[self.pos + 8..self.pos + size];
		self.pos += size;
		Some((fourcc, content))
	}
}

fn child<'a>(buf: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
	Atoms::new(buf).find(|(name, _)| name == fourcc).map(|(_, content)| content)
}

// Extracts the stream parameters from a trak atom, or `None` when it is not
// a sound track
fn sound_track_info(trak: &[u8]) -> Option<StreamInfo> {
	let mdia = child(trak, b"mdia")?;

	let hdlr = child(mdia, b"hdlr")?;
	if hdlr.get(8..12)? != b"soun" {
		return None;
	}

	let mdhd = child(mdia, b"mdhd")?;
	let (timescale, duration) = match mdhd.first()? {
		1 => (
			BigEndian::read_u32(mdhd.get(20..24)?),
			BigEndian::read_u64(mdhd.get(24..32)?),
		),
		_ => (
			BigEndian::read_u32(mdhd.get(12..16)?),
			u64::from(BigEndian::read_u32(mdhd.get(16..20)?)),
		),
	};
	if timescale == 0 {
		return None;
	}

	let stsd = child(child(mdia, b"minf")?, b"stbl").and_then(|stbl| child(stbl, b"stsd"))?;
	// 4 bytes version/flags, 4 bytes entry count, then the sample entries
	let mp4a = child(stsd.get(8..)?, b"mp4a")?;
	let channels = BigEndian::read_u16(mp4a.get(16..18)?);
	// 16.16 fixed point
	let samples_per_sec = BigEndian::read_u32(mp4a.get(22..26)?) >> 16;

	let samples_per_sec = if samples_per_sec > 0 {
		samples_per_sec
	} else {
		timescale
	};

	// The media timescale is the sample rate for sound tracks, making the
	// duration a sample count
	let sample_length = duration * u64::from(samples_per_sec) / u64::from(timescale);

	let block_align = 2 * channels;
	Some(StreamInfo {
		format_tag: crate::chunks::fmt::WAVE_FORMAT_M4A,
		format_chunk: true,
		channels,
		samples_per_sec,
		avg_bytes_per_sec: u32::from(block_align) * samples_per_sec,
		block_align,
		bits_per_sample: 16,
		sample_length,
		data_start: 0,
		data_length: sample_length * u64::from(block_align),
		ext_time_length: (1000 * duration / u64::from(timescale)) as i64,
		..StreamInfo::default()
	})
}

fn apply_item_list(ilst: &[u8], data: &mut CartData) {
	for (fourcc, item) in Atoms::new(ilst) {
		let Some(value) = item_text(item) else {
			continue;
		};
		match &fourcc {
			b"\xA9nam" => {
				data.title = value;
				data.metadata_found = true;
			},
			b"\xA9ART" => {
				data.artist = value;
				data.metadata_found = true;
			},
			b"\xA9wrt" => {
				data.composer = value;
				data.metadata_found = true;
			},
			b"\xA9alb" => {
				data.album = value;
				data.metadata_found = true;
			},
			_ => {},
		}
	}
}

fn item_text(item: &[u8]) -> Option<String> {
	// A data atom: 4 bytes type, 4 bytes locale, then the value
	let content = child(item, b"data")?;
	Some(String::from_utf8_lossy(content.get(8..)?).into_owned())
}

#[cfg(test)]
mod tests {
	use super::{is_m4a, open};
	use crate::data::CartData;

	use std::io::Cursor;

	fn atom(fourcc: &[u8; 4], content: &[u8]) -> Vec<u8> {
		let mut buf = ((content.len() + 8) as u32).to_be_bytes().to_vec();
		buf.extend_from_slice(fourcc);
		buf.extend_from_slice(content);
		buf
	}

	fn m4a_image() -> Vec<u8> {
		let mut mdhd = vec![0_u8; 24];
		mdhd[12..16].copy_from_slice(&44_100_u32.to_be_bytes());
		mdhd[16..20].copy_from_slice(&88_200_u32.to_be_bytes());

		let mut hdlr = vec![0_u8; 24];
		hdlr[8..12].copy_from_slice(b"soun");

		let mut mp4a = vec![0_u8; 28];
		mp4a[16..18].copy_from_slice(&2_u16.to_be_bytes());
		mp4a[22..26].copy_from_slice(&(44_100_u32 << 16).to_be_bytes());

		let mut stsd = vec![0_u8; 8];
		stsd[7] = 1;
		stsd.extend_from_slice(&atom(b"mp4a", &mp4a));

		let stbl = atom(b"stsd", &stsd);
		let minf = atom(b"stbl", &stbl);
		let mdia = [
			atom(b"mdhd", &mdhd),
			atom(b"hdlr", &hdlr),
			atom(b"minf", &minf),
		]
		.concat();
		let trak = atom(b"mdia", &mdia);

		let title = atom(b"\xA9nam", &{
			let mut data = vec![0_u8; 8];
			data.extend_from_slice(b"Legal ID");
			atom(b"data", &data)
		});
		let ilst = atom(b"ilst", &title);
		let mut meta = vec![0_u8; 4];
		meta.extend_from_slice(&ilst);
		let udta = atom(b"udta", &atom(b"meta", &meta));

		let moov = [atom(b"trak", &trak), udta].concat();

		let mut image = atom(b"ftyp", b"M4A \x00\x00\x00\x00isom");
		image.extend_from_slice(&atom(b"moov", &moov));
		image
	}

	#[test_log::test]
	fn track_and_item_list() {
		let image = m4a_image();
		let mut cursor = Cursor::new(image);
		assert!(is_m4a(&mut cursor).unwrap());

		let mut data = CartData::new();
		let info = open(&mut cursor, &mut data, true).unwrap();

		assert_eq!(info.channels, 2);
		assert_eq!(info.samples_per_sec, 44_100);
		assert_eq!(info.sample_length, 88_200);
		assert_eq!(info.bits_per_sample, 16);
		assert_eq!(info.data_length, 88_200 * 4);
		assert_eq!(info.ext_time_length, 2000);
		assert_eq!(data.title, "Legal ID");
	}

	#[test]
	fn moov_required() {
		let image = atom(b"ftyp", b"M4A \x00\x00\x00\x00isom");
		let mut data = CartData::new();
		assert!(open(&mut Cursor::new(image), &mut data, true).is_err());
	}
}
