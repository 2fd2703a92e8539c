//! Ogg Vorbis support
//!
//! Reading needs nothing beyond the container: the identification packet
//! carries the stream parameters and the last page's granule position gives
//! the sample count. Writing requires an external [`VorbisEncoder`], since
//! psychoacoustic encoding is far outside this crate's scope.

use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::decode_err;

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt};
use ogg_pager::{
	CONTAINS_FIRST_PAGE_OF_BITSTREAM, CONTAINS_LAST_PAGE_OF_BITSTREAM, Packets, Page, paginate,
};

const VORBIS_IDENT_HEAD: &[u8] = &[1, b'v', b'o', b'r', b'b', b'i', b's'];

/// An encoded Vorbis packet and the granule position of its last sample
pub struct OggPacket {
	pub data: Vec<u8>,
	pub granule_position: u64,
}

/// An externally supplied Vorbis encoder
///
/// The handle drives the encoder with interleaved 16-bit little-endian PCM
/// and takes care of paging the packets it returns.
pub trait VorbisEncoder {
	/// Initializes the encoder and returns the three Vorbis header packets
	fn start(&mut self, channels: u16, samples_per_sec: u32, quality: f32) -> Result<Vec<Vec<u8>>>;

	/// Encodes a block of interleaved 16-bit little-endian PCM
	fn encode(&mut self, pcm: &[u8]) -> Result<Vec<OggPacket>>;

	/// Flushes any buffered audio and ends the stream
	fn finish(&mut self) -> Result<Vec<OggPacket>>;
}

pub(crate) fn open<R>(reader: &mut R) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;

	let packets = Packets::read_count(reader, 3)?;
	let ident = packets
		.get(0)
		.ok_or_else(|| decode_err!(Ogg, "Expected identification packet"))?;
	if ident.len() < 30 || &ident[..7] != VORBIS_IDENT_HEAD {
		return Err(decode_err!(Ogg, "Invalid identification packet"));
	}

	let content = &mut &ident[7..];
	let _version = content.read_u32::<LittleEndian>()?;
	let channels = u16::from(content.read_u8()?);
	let samples_per_sec = content.read_u32::<LittleEndian>()?;
	if channels == 0 || samples_per_sec == 0 {
		return Err(decode_err!(Ogg, "Invalid stream parameters"));
	}

	// The granule position of the stream's final page is the total sample
	// count
	let mut sample_length = 0_u64;
	while let Ok(page) = Page::read(reader) {
		let abgp = page.header().abgp;
		if abgp != u64::MAX {
			sample_length = abgp;
		}
	}

	let block_align = 2 * channels;
	let mut info = StreamInfo {
		format_tag: crate::chunks::fmt::WAVE_FORMAT_VORBIS,
		format_chunk: true,
		channels,
		samples_per_sec,
		avg_bytes_per_sec: u32::from(block_align) * samples_per_sec,
		block_align,
		bits_per_sample: 16,
		sample_length,
		data_start: 0,
		data_length: sample_length * u64::from(block_align),
		..StreamInfo::default()
	};
	info.ext_time_length = (1000 * sample_length / u64::from(samples_per_sec)) as i64;

	reader.seek(SeekFrom::Start(0))?;
	Ok(info)
}

/// Reads the normalization level from a file's `.energy` sidecar
///
/// The sidecar's first line is a linear gain factor; a missing or malformed
/// sidecar means unity gain.
pub(crate) fn normalize_level(path: &Path) -> f64 {
	let mut sidecar = path.as_os_str().to_os_string();
	sidecar.push(".energy");

	let Ok(content) = fs::read_to_string(&sidecar) else {
		return 1.0;
	};
	content
		.lines()
		.next()
		.and_then(|line| line.trim().parse::<f64>().ok())
		.unwrap_or(1.0)
}

/// Pages encoder output into a physical bitstream
pub(crate) struct OggWriter {
	encoder: Box<dyn VorbisEncoder>,
	serial: u32,
	next_sequence: u32,
	granule_position: u64,
}

impl OggWriter {
	/// Initializes the encoder and writes the header pages
	pub(crate) fn start<W>(
		out: &mut W,
		mut encoder: Box<dyn VorbisEncoder>,
		channels: u16,
		samples_per_sec: u32,
		quality: f32,
		serial: Option<u32>,
	) -> Result<Self>
	where
		W: Write,
	{
		let serial = serial.unwrap_or_else(generate_serial);
		let headers = encoder.start(channels, samples_per_sec, quality)?;

		let mut writer = Self {
			encoder,
			serial,
			next_sequence: 0,
			granule_position: 0,
		};
		writer.write_pages(out, &headers, 0, CONTAINS_FIRST_PAGE_OF_BITSTREAM)?;
		Ok(writer)
	}

	pub(crate) fn write<W>(&mut self, out: &mut W, pcm: &[u8]) -> Result<()>
	where
		W: Write,
	{
		let packets = self.encoder.encode(pcm)?;
		self.write_packets(out, packets, 0)
	}

	pub(crate) fn finish<W>(&mut self, out: &mut W) -> Result<()>
	where
		W: Write,
	{
		let packets = self.encoder.finish()?;
		self.write_packets(out, packets, CONTAINS_LAST_PAGE_OF_BITSTREAM)
	}

	fn write_packets<W>(&mut self, out: &mut W, packets: Vec<OggPacket>, flags: u8) -> Result<()>
	where
		W: Write,
	{
		if packets.is_empty() {
			return Ok(());
		}

		if let Some(last) = packets.last() {
			self.granule_position = last.granule_position;
		}

		let content: Vec<&[u8]> = packets.iter().map(|p| p.data.as_slice()).collect();
		self.write_pages(out, &content, self.granule_position, flags)
	}

	fn write_pages<W, C>(
		&mut self,
		out: &mut W,
		content: &[C],
		abgp: u64,
		flags: u8,
	) -> Result<()>
	where
		W: Write,
		C: AsRef<[u8]>,
	{
		let pages = paginate(content.iter().map(|c| c.as_ref()), self.serial, abgp, flags)?;
		for mut page in pages {
			// `paginate` numbers each group from zero; renumber into the
			// stream-wide sequence
			page.header_mut().sequence_number = self.next_sequence;
			self.next_sequence += 1;
			page.gen_crc();
			out.write_all(&page.as_bytes())?;
		}
		Ok(())
	}
}

fn generate_serial() -> u32 {
	match SystemTime::now().duration_since(UNIX_EPOCH) {
		Ok(elapsed) => elapsed.subsec_nanos() ^ elapsed.as_secs() as u32,
		Err(_) => 0x0C0A_FEFE,
	}
}
