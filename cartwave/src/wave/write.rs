//! RIFF/WAVE writer
//!
//! `create` lays down the header chunks and leaves the file positioned for
//! payload appends; `close` backfills every size field once the payload is
//! complete.

use crate::chunk::{find_chunk, update_chunk};
use crate::chunks::fmt::{FormatChunk, WAVE_FORMAT_MPEG, WAVE_FORMAT_PCM};
use crate::chunks::levl::LevlChunk;
use crate::chunks::rdxl;
use crate::chunks::bext::BextChunk;
use crate::chunks::cart::CartChunk;
use crate::chunks::mext::MextChunk;
use crate::error::Result;
use crate::macros::decode_err;

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

/// The chunks written ahead of the payload
pub(crate) struct WaveOutline<'a> {
	pub fmt: &'a FormatChunk,
	pub cart: Option<&'a CartChunk>,
	pub bext: Option<&'a BextChunk>,
	pub mext: Option<&'a MextChunk>,
	pub rdxl: Option<&'a str>,
}

/// Writes the RIFF preamble and header chunks, returning the payload start
///
/// All size fields are left as placeholders for [`close`].
pub(crate) fn create<W>(file: &mut W, outline: &WaveOutline<'_>) -> Result<u64>
where
	W: Write + Seek,
{
	file.write_all(b"RIFF\0\0\0\0WAVE")?;
	write_chunk(file, b"fmt ", &outline.fmt.render())?;

	if outline.fmt.format_tag == WAVE_FORMAT_MPEG {
		// Placeholder fact chunk, patched on close
		file.write_all(b"fact\x04\0\0\0\0\0\0\0")?;
	}

	if let Some(cart) = outline.cart {
		write_chunk(file, b"cart", &cart.render())?;
	}
	if let Some(bext) = outline.bext {
		write_chunk(file, b"bext", &bext.render())?;
	}
	if let Some(mext) = outline.mext {
		write_chunk(file, b"mext", &mext.render())?;
	}
	if let Some(contents) = outline.rdxl {
		write_chunk(file, b"rdxl", &rdxl::render(contents))?;
	}

	file.write_all(b"data\0\0\0\0")?;
	Ok(file.stream_position()?)
}

/// What [`close`] needs to finalize a recording
pub(crate) struct WaveFinal<'a> {
	pub fmt: &'a FormatChunk,
	pub data_length: u64,
	/// Explicit sample count; recomputed from the geometry when `None`
	pub samples: Option<u32>,
	pub levl: Option<&'a LevlChunk>,
	pub cart: Option<&'a CartChunk>,
	pub bext: Option<&'a BextChunk>,
	pub mext: Option<&'a MextChunk>,
}

/// Backfills the RIFF, data, and fact sizes, rewrites the metadata chunks,
/// appends the peak table, and truncates to the logical end
pub(crate) fn close<F>(file: &mut F, fin: &WaveFinal<'_>) -> Result<()>
where
	F: Read + Write + Seek + Truncate,
{
	// Peak tables only make sense for PCM and MPEG Layer II payloads
	let mut levl_written = false;
	if let Some(levl) = fin.levl {
		if fin.fmt.format_tag == WAVE_FORMAT_PCM
			|| (fin.fmt.format_tag == WAVE_FORMAT_MPEG && fin.fmt.head_layer == 2)
		{
			file.seek(SeekFrom::End(0))?;
			write_chunk(file, b"levl", &levl.render())?;
			let end = file.stream_position()?;
			file.truncate(end)?;
			levl_written = true;
		}
	}

	// Overall RIFF size
	let file_len = file.seek(SeekFrom::End(0))?;
	file.seek(SeekFrom::Start(4))?;
	file.write_u32::<LittleEndian>((file_len - 8) as u32)?;

	// Payload size
	let Some(data_location) = find_chunk::<LittleEndian, _>(file, b"data", file_len)? else {
		return Err(decode_err!(Wave, "File does not contain a data chunk"));
	};
	file.seek(SeekFrom::Start(data_location.content_pos - 4))?;
	file.write_u32::<LittleEndian>(fin.data_length as u32)?;

	// Sample count
	if find_chunk::<LittleEndian, _>(file, b"fact", file_len)?.is_some() {
		let samples = match fin.samples {
			Some(samples) => samples,
			None => recomputed_sample_count(fin),
		};
		update_chunk(file, file_len, b"fact", &samples.to_le_bytes())?;
	}

	if let Some(cart) = fin.cart {
		update_chunk(file, file_len, b"cart", &cart.render())?;
	}
	if let Some(bext) = fin.bext {
		update_chunk(file, file_len, b"bext", &bext.render())?;
	}
	if let Some(mext) = fin.mext {
		update_chunk(file, file_len, b"mext", &mext.render())?;
	}

	if !levl_written {
		file.truncate(data_location.content_pos + fin.data_length)?;
	}

	Ok(())
}

fn recomputed_sample_count(fin: &WaveFinal<'_>) -> u32 {
	match fin.fmt.format_tag {
		WAVE_FORMAT_PCM if fin.fmt.block_align > 0 => {
			(fin.data_length / u64::from(fin.fmt.block_align)) as u32
		},
		WAVE_FORMAT_MPEG if fin.fmt.samples_per_sec > 0 && fin.fmt.head_bit_rate > 0 => {
			let frame_size = u64::from(144 * fin.fmt.head_bit_rate / fin.fmt.samples_per_sec);
			if frame_size == 0 {
				return 0;
			}
			(1152 * (fin.data_length / frame_size)) as u32
		},
		_ => 0,
	}
}

fn write_chunk<W>(file: &mut W, fourcc: &[u8; 4], content: &[u8]) -> Result<()>
where
	W: Write,
{
	file.write_all(fourcc)?;
	file.write_u32::<LittleEndian>(content.len() as u32)?;
	file.write_all(content)?;
	if content.len() % 2 != 0 {
		file.write_u8(0)?;
	}
	Ok(())
}

/// Shortening a writable stream to an exact length
///
/// `File` truncates on disk; the in-memory buffers used in tests shrink
/// their backing vector.
pub(crate) trait Truncate {
	fn truncate(&mut self, len: u64) -> Result<()>;
}

impl Truncate for std::fs::File {
	fn truncate(&mut self, len: u64) -> Result<()> {
		self.set_len(len)?;
		Ok(())
	}
}

impl Truncate for std::io::Cursor<Vec<u8>> {
	fn truncate(&mut self, len: u64) -> Result<()> {
		self.get_mut().truncate(len as usize);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::{WaveFinal, WaveOutline, close, create};
	use crate::chunk::find_chunk;
	use crate::chunks::cart::CartChunk;
	use crate::chunks::fmt::FormatChunk;
	use crate::chunks::levl::LevlChunk;
	use crate::data::CartData;

	use std::io::{Cursor, Seek, SeekFrom, Write};

	use byteorder::LittleEndian;

	#[test_log::test]
	fn create_then_close_patches_sizes() {
		let fmt = FormatChunk::for_pcm(2, 44_100, 16).unwrap();
		let mut file = Cursor::new(Vec::new());

		let data_start = create(
			&mut file,
			&WaveOutline {
				fmt: &fmt,
				cart: None,
				bext: None,
				mext: None,
				rdxl: None,
			},
		)
		.unwrap();

		let payload = vec![0_u8; 4096];
		file.seek(SeekFrom::Start(data_start)).unwrap();
		file.write_all(&payload).unwrap();

		close(
			&mut file,
			&WaveFinal {
				fmt: &fmt,
				data_length: payload.len() as u64,
				samples: None,
				levl: None,
				cart: None,
				bext: None,
				mext: None,
			},
		)
		.unwrap();

		let image = file.get_ref();
		let riff_size = u32::from_le_bytes(image[4..8].try_into().unwrap());
		assert_eq!(riff_size as usize, image.len() - 8);

		let data_size =
			u32::from_le_bytes(image[data_start as usize - 4..data_start as usize].try_into().unwrap());
		assert_eq!(data_size as usize, payload.len());
		assert_eq!(image.len() as u64, data_start + payload.len() as u64);
	}

	#[test_log::test]
	fn mpeg_fact_recomputed() {
		let fmt = FormatChunk::for_mpeg(2, 44_100, 2, 256_000, 1, 0, false).unwrap();
		let mut file = Cursor::new(Vec::new());

		let data_start = create(
			&mut file,
			&WaveOutline {
				fmt: &fmt,
				cart: None,
				bext: None,
				mext: None,
				rdxl: None,
			},
		)
		.unwrap();

		// Four 835-byte frames
		let payload = vec![0_u8; 835 * 4];
		file.seek(SeekFrom::Start(data_start)).unwrap();
		file.write_all(&payload).unwrap();

		close(
			&mut file,
			&WaveFinal {
				fmt: &fmt,
				data_length: payload.len() as u64,
				samples: None,
				levl: None,
				cart: None,
				bext: None,
				mext: None,
			},
		)
		.unwrap();

		let len = file.get_ref().len() as u64;
		let fact = find_chunk::<LittleEndian, _>(&mut file, b"fact", len)
			.unwrap()
			.unwrap();
		let pos = fact.content_pos as usize;
		let samples = u32::from_le_bytes(file.get_ref()[pos..pos + 4].try_into().unwrap());
		assert_eq!(samples, 1152 * 4);
	}

	#[test_log::test]
	fn levl_appended_and_cart_rewritten() {
		let fmt = FormatChunk::for_pcm(2, 44_100, 16).unwrap();
		let mut data = CartData::new();
		data.title = "Top Hour".to_string();
		let cart = CartChunk::from_data(&data, fmt.level_reference(), 44_100, 0);

		let mut file = Cursor::new(Vec::new());
		let data_start = create(
			&mut file,
			&WaveOutline {
				fmt: &fmt,
				cart: Some(&cart),
				bext: None,
				mext: None,
				rdxl: None,
			},
		)
		.unwrap();

		let payload = vec![0_u8; 1152 * 4];
		file.seek(SeekFrom::Start(data_start)).unwrap();
		file.write_all(&payload).unwrap();

		let mut data = CartData::new();
		data.title = "Top of the Hour".to_string();
		let cart = CartChunk::from_data(&data, fmt.level_reference(), 44_100, 0);
		let levl = LevlChunk::new(2, vec![100, 200], None);

		close(
			&mut file,
			&WaveFinal {
				fmt: &fmt,
				data_length: payload.len() as u64,
				samples: None,
				levl: Some(&levl),
				cart: Some(&cart),
				bext: None,
				mext: None,
			},
		)
		.unwrap();

		let len = file.get_ref().len() as u64;
		let levl_location = find_chunk::<LittleEndian, _>(&mut file, b"levl", len)
			.unwrap()
			.unwrap();
		assert!(levl_location.content_pos > data_start);

		let cart_location = find_chunk::<LittleEndian, _>(&mut file, b"cart", len)
			.unwrap()
			.unwrap();
		let pos = cart_location.content_pos as usize;
		let reread = CartChunk::parse(&file.get_ref()[pos..pos + 2048], true).unwrap();
		assert_eq!(reread.title, "Top of the Hour");
	}
}
