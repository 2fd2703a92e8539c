//! RIFF/WAVE reader

use crate::chunk::find_chunk;
use crate::chunks::{air1, av10, rdxl};
use crate::chunks::bext::BextChunk;
use crate::chunks::cart::CartChunk;
use crate::chunks::fmt::{
	FactChunk, FormatChunk, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_MPEG, WAVE_FORMAT_PCM,
};
use crate::chunks::levl::LevlChunk;
use crate::chunks::list;
use crate::chunks::mext::MextChunk;
use crate::chunks::scot::ScotChunk;
use crate::config::ParseOptions;
use crate::data::CartData;
use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::{decode_err, try_vec};
use crate::mpeg::MpegHeader;
use crate::probe::FileType;

use std::io::{Read, Seek, SeekFrom};

use byteorder::LittleEndian;

/// Everything the reader recovered from a RIFF/WAVE file
pub(crate) struct WaveContents {
	pub info: StreamInfo,
	/// `Wave`, or `Ambos` for the fmt-less legacy hybrid
	pub file_type: FileType,
	pub cart: Option<CartChunk>,
	pub bext: Option<BextChunk>,
	pub mext: Option<MextChunk>,
	pub levl: Option<LevlChunk>,
	pub rdxl: Option<String>,
}

pub(crate) fn open<R>(
	reader: &mut R,
	file_len: u64,
	data: &mut CartData,
	options: ParseOptions,
) -> Result<WaveContents>
where
	R: Read + Seek,
{
	let fmt = match read_chunk(reader, b"fmt ", file_len)? {
		Some(content) => Some(FormatChunk::parse(&content)?),
		None => None,
	};
	// A RIFF/WAVE stream without a fmt chunk is the legacy AM-BOS hybrid,
	// implicitly MPEG
	let file_type = if fmt.is_some() {
		FileType::Wave
	} else {
		FileType::Ambos
	};

	let Some(data_location) = find_chunk::<LittleEndian, _>(reader, b"data", file_len)? else {
		return Err(decode_err!(Wave, "File does not contain a data chunk"));
	};

	let mut info = match &fmt {
		Some(fmt) => StreamInfo {
			format_tag: fmt.format_tag,
			format_chunk: true,
			channels: fmt.channels,
			samples_per_sec: fmt.samples_per_sec,
			avg_bytes_per_sec: fmt.avg_bytes_per_sec,
			block_align: fmt.block_align,
			bits_per_sample: fmt.bits_per_sample,
			head_layer: fmt.head_layer,
			head_bit_rate: fmt.head_bit_rate,
			head_mode: fmt.head_mode,
			head_flags: fmt.head_flags,
			..StreamInfo::default()
		},
		None => StreamInfo {
			format_tag: WAVE_FORMAT_MPEG,
			..StreamInfo::default()
		},
	};
	info.data_start = data_location.content_pos;
	info.data_length = u64::from(data_location.size);

	let fact = match read_chunk(reader, b"fact", file_len)? {
		Some(content) => Some(FactChunk::parse(&content)?),
		None => None,
	};

	match fact {
		Some(fact) if fact.sample_length != 0 => {
			info.sample_length = u64::from(fact.sample_length);
			if info.format_chunk && info.samples_per_sec > 0 {
				info.ext_time_length =
					(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
			}
		},
		_ => derive_sample_length(reader, file_len, &mut info)?,
	}

	let mut contents = WaveContents {
		info,
		file_type,
		cart: None,
		bext: None,
		mext: None,
		levl: None,
		rdxl: None,
	};

	if options.read_metadata {
		read_metadata(reader, file_len, data, &mut contents)?;
	}

	if options.read_peaks {
		if let Some(content) = read_chunk(reader, b"levl", file_len)? {
			match LevlChunk::parse(&content) {
				Ok(levl) => contents.levl = Some(levl),
				Err(err) => log::warn!("Ignoring invalid levl chunk: {err}"),
			}
		}
	}

	reader.seek(SeekFrom::Start(contents.info.data_start))?;
	Ok(contents)
}

// The fallbacks for a missing or zeroed fact chunk, in order: MPEG streams
// estimate from the frame geometry, PCM derives from the payload size, and
// the fmt-less hybrid decodes the first MPEG frame out of the payload itself
fn derive_sample_length<R>(reader: &mut R, file_len: u64, info: &mut StreamInfo) -> Result<()>
where
	R: Read + Seek,
{
	if info.format_chunk {
		if info.format_tag != WAVE_FORMAT_PCM && info.format_tag != WAVE_FORMAT_IEEE_FLOAT {
			if info.samples_per_sec > 0 && info.head_bit_rate > 0 {
				let frame_size = u64::from(144 * info.head_bit_rate / info.samples_per_sec);
				if frame_size > 0 {
					info.sample_length = 1152 * (info.data_length / frame_size);
					info.ext_time_length =
						(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
				}
			}
		} else if info.block_align > 0 && info.samples_per_sec > 0 {
			info.sample_length = info.data_length / u64::from(info.block_align);
			info.ext_time_length = (1000 * info.data_length
				/ (u64::from(info.block_align) * u64::from(info.samples_per_sec)))
				as i64;
		}
		return Ok(());
	}

	let (header, _) = MpegHeader::read(reader, info.data_start)?;
	info.format_chunk = true;
	info.channels = header.channels;
	info.samples_per_sec = header.samples_per_sec;
	info.avg_bytes_per_sec = header.bitrate / 8;
	info.head_layer = header.layer;
	info.head_bit_rate = header.bitrate;
	info.head_mode = header.mode;
	info.head_flags = header.flags;
	info.mpeg_frame_size = header.legacy_frame_size();
	info.data_length = file_len.saturating_sub(info.data_start);
	if info.mpeg_frame_size > 0 {
		info.sample_length = 1152 * (info.data_length / u64::from(info.mpeg_frame_size));
	}
	if info.samples_per_sec > 0 {
		info.ext_time_length =
			(1000 * info.sample_length / u64::from(info.samples_per_sec)) as i64;
	}
	Ok(())
}

// Metadata chunks are all optional and all independent; later chunks win
// where they overlap
fn read_metadata<R>(
	reader: &mut R,
	file_len: u64,
	data: &mut CartData,
	contents: &mut WaveContents,
) -> Result<()>
where
	R: Read + Seek,
{
	let info = &contents.info;

	if let Some(content) = read_chunk(reader, b"cart", file_len)? {
		match CartChunk::parse(&content, true) {
			Ok(cart) => {
				cart.apply(data, info.samples_per_sec);
				contents.cart = Some(cart);
			},
			Err(err) => log::warn!("Ignoring invalid cart chunk: {err}"),
		}
	}
	if let Some(content) = read_chunk(reader, b"bext", file_len)? {
		match BextChunk::parse(&content) {
			Ok(bext) => {
				bext.apply(data);
				contents.bext = Some(bext);
			},
			Err(err) => log::warn!("Ignoring invalid bext chunk: {err}"),
		}
	}
	if let Some(content) = read_chunk(reader, b"mext", file_len)? {
		match MextChunk::parse(&content) {
			Ok(mext) => contents.mext = Some(mext),
			Err(err) => log::warn!("Ignoring invalid mext chunk: {err}"),
		}
	}
	if let Some(content) = read_chunk(reader, b"list", file_len)? {
		list::apply(&content, data, info.ext_time_length);
	}
	if let Some(content) = read_chunk(reader, b"scot", file_len)? {
		match ScotChunk::parse(&content) {
			Ok(scot) => scot.apply(data, info.ext_time_length),
			Err(err) => log::warn!("Ignoring invalid scot chunk: {err}"),
		}
	}
	if let Some(content) = read_chunk(reader, b"AV10", file_len)? {
		av10::apply(&content, data);
	}
	if let Some(content) = read_chunk(reader, b"AIR1", file_len)? {
		air1::apply(&content, data);
	}
	if let Some(content) = read_chunk(reader, b"rdxl", file_len)? {
		contents.rdxl = Some(rdxl::parse(content)?);
	}

	Ok(())
}

fn read_chunk<R>(reader: &mut R, fourcc: &[u8; 4], file_len: u64) -> Result<Option<Vec<u8>>>
where
	R: Read + Seek,
{
	let Some(location) = find_chunk::<LittleEndian, _>(reader, fourcc, file_len)? else {
		return Ok(None);
	};

	let mut content = try_vec![0; location.size as usize];
	reader.read_exact(&mut content)?;
	Ok(Some(content))
}

#[cfg(test)]
mod tests {
	use super::open;
	use crate::chunks::fmt::{FormatChunk, WAVE_FORMAT_MPEG};
	use crate::config::ParseOptions;
	use crate::data::CartData;
	use crate::probe::FileType;

	use std::io::Cursor;

	fn chunk(fourcc: &[u8; 4], content: &[u8]) -> Vec<u8> {
		let mut buf = fourcc.to_vec();
		buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
		buf.extend_from_slice(content);
		if content.len() % 2 != 0 {
			buf.push(0);
		}
		buf
	}

	fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
		let mut image = b"RIFF\0\0\0\0WAVE".to_vec();
		for c in chunks {
			image.extend_from_slice(c);
		}
		let size = (image.len() - 8) as u32;
		image[4..8].copy_from_slice(&size.to_le_bytes());
		image
	}

	#[test_log::test]
	fn pcm_without_fact() {
		let fmt = FormatChunk::for_pcm(2, 44_100, 16).unwrap();
		let payload = vec![0_u8; 44_100 * 4];
		let image = riff(&[chunk(b"fmt ", &fmt.render()), chunk(b"data", &payload)]);
		let file_len = image.len() as u64;

		let mut data = CartData::new();
		let contents = open(
			&mut Cursor::new(image),
			file_len,
			&mut data,
			ParseOptions::new(),
		)
		.unwrap();

		assert_eq!(contents.file_type, FileType::Wave);
		assert_eq!(contents.info.sample_length, 44_100);
		assert_eq!(contents.info.ext_time_length, 1000);
		assert_eq!(contents.info.data_length, 44_100 * 4);
	}

	#[test_log::test]
	fn fact_overrides_geometry() {
		let fmt = FormatChunk::for_mpeg(2, 44_100, 2, 256_000, 1, 0, false).unwrap();
		let image = riff(&[
			chunk(b"fmt ", &fmt.render()),
			chunk(b"fact", &88_200_u32.to_le_bytes()),
			chunk(b"data", &[0; 1670]),
		]);
		let file_len = image.len() as u64;

		let mut data = CartData::new();
		let contents = open(
			&mut Cursor::new(image),
			file_len,
			&mut data,
			ParseOptions::new(),
		)
		.unwrap();

		assert_eq!(contents.info.sample_length, 88_200);
		assert_eq!(contents.info.ext_time_length, 2000);
	}

	#[test_log::test]
	fn fmtless_hybrid_is_ambos() {
		// MPEG 1 Layer II, 256 kbps, 44.1 kHz
		let frame_size = 144_000 * 256 / 44_100;
		let mut payload = Vec::new();
		for _ in 0..4 {
			payload.extend_from_slice(&[0xFF, 0xFD, 0xC0, 0x40]);
			payload.resize(payload.len() + frame_size - 4, 0);
		}

		let image = riff(&[chunk(b"data", &payload)]);
		let file_len = image.len() as u64;

		let mut data = CartData::new();
		let contents = open(
			&mut Cursor::new(image),
			file_len,
			&mut data,
			ParseOptions::new(),
		)
		.unwrap();

		assert_eq!(contents.file_type, FileType::Ambos);
		assert_eq!(contents.info.format_tag, WAVE_FORMAT_MPEG);
		assert_eq!(contents.info.head_layer, 2);
		assert_eq!(contents.info.channels, 2);
		assert!(contents.info.format_chunk);
	}

	#[test]
	fn data_chunk_required() {
		let fmt = FormatChunk::for_pcm(2, 44_100, 16).unwrap();
		let image = riff(&[chunk(b"fmt ", &fmt.render())]);
		let file_len = image.len() as u64;

		let mut data = CartData::new();
		assert!(
			open(
				&mut Cursor::new(image),
				file_len,
				&mut data,
				ParseOptions::new()
			)
			.is_err()
		);
	}
}
