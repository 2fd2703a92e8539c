//! RIFF-style chunk walking

use crate::error::Result;
use crate::macros::{err, try_vec};

use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

const CHUNK_HEADER_SIZE: u64 = 8;

// The chunk area of a RIFF/FORM container starts past the 12-byte outer header
pub(crate) const CHUNK_AREA_START: u64 = 12;

pub(crate) struct Chunks<B>
where
	B: ByteOrder,
{
	pub fourcc: [u8; 4],
	pub size: u32,
	remaining_size: u64,
	_phantom: PhantomData<B>,
}

impl<B: ByteOrder> Chunks<B> {
	#[must_use]
	pub const fn new(remaining_size: u64) -> Self {
		Self {
			fourcc: [0; 4],
			size: 0,
			remaining_size,
			_phantom: PhantomData,
		}
	}

	pub fn next<R>(&mut self, data: &mut R) -> Result<bool>
	where
		R: Read,
	{
		if self.remaining_size < CHUNK_HEADER_SIZE {
			return Ok(false);
		}

		data.read_exact(&mut self.fourcc)?;

		// Certain encoders emit chunk names off by one byte ("Sonic Studio
		// soundBlade" among others). When the first byte cannot start a chunk
		// name, shift left and pull one more byte.
		if !self.fourcc[0].is_ascii_alphanumeric() {
			self.fourcc.rotate_left(1);
			let mut tail = [0; 1];
			data.read_exact(&mut tail)?;
			self.fourcc[3] = tail[0];
			self.remaining_size = self.remaining_size.saturating_sub(1);
		}

		self.size = data.read_u32::<B>()?;
		self.remaining_size = self.remaining_size.saturating_sub(CHUNK_HEADER_SIZE);

		Ok(true)
	}

	pub fn content<R>(&mut self, data: &mut R) -> Result<Vec<u8>>
	where
		R: Read,
	{
		self.read(data, u64::from(self.size))
	}

	fn read<R>(&mut self, data: &mut R, size: u64) -> Result<Vec<u8>>
	where
		R: Read,
	{
		if size > self.remaining_size {
			err!(SizeMismatch);
		}

		let mut content = try_vec![0; size as usize];
		data.read_exact(&mut content)?;

		self.remaining_size = self.remaining_size.saturating_sub(size);
		Ok(content)
	}

	pub fn skip<R>(&mut self, data: &mut R) -> Result<()>
	where
		R: Read + Seek,
	{
		data.seek(SeekFrom::Current(i64::from(self.size)))?;
		self.correct_position(data)?;

		self.remaining_size = self.remaining_size.saturating_sub(u64::from(self.size));

		Ok(())
	}

	pub fn correct_position<R>(&mut self, data: &mut R) -> Result<()>
	where
		R: Read + Seek,
	{
		// Chunks are expected to start on even boundaries, and are padded
		// with a 0 if necessary. This is NOT the null terminator of the value,
		// and it is NOT included in the chunk's size
		if self.size % 2 != 0 {
			data.seek(SeekFrom::Current(1))?;
			self.remaining_size = self.remaining_size.saturating_sub(1);
		}

		Ok(())
	}
}

/// Where a chunk's content lives within a file
#[derive(Copy, Clone, Debug)]
pub(crate) struct ChunkLocation {
	// Offset of the first content byte (past the 8-byte chunk header)
	pub content_pos: u64,
	pub size: u32,
}

// Walks the chunk area looking for `fourcc` (case-insensitive, matching the
// source formats' loose historical usage). On a hit the reader is left at the
// start of the chunk's content.
pub(crate) fn find_chunk<B, R>(
	data: &mut R,
	fourcc: &[u8; 4],
	file_len: u64,
) -> Result<Option<ChunkLocation>>
where
	B: ByteOrder,
	R: Read + Seek,
{
	data.seek(SeekFrom::Start(CHUNK_AREA_START))?;

	let mut chunks = Chunks::<B>::new(file_len.saturating_sub(CHUNK_AREA_START));
	while chunks.next(data)? {
		if chunks.fourcc.eq_ignore_ascii_case(fourcc) {
			return Ok(Some(ChunkLocation {
				content_pos: data.stream_position()?,
				size: chunks.size,
			}));
		}

		chunks.skip(data)?;
	}

	Ok(None)
}

// Rewrites a chunk in place when its stored size matches the new encoding.
// A missing chunk is appended at the end of the file; a size mismatch is left
// alone, since shifting the payload is not worth it for metadata updates.
pub(crate) fn update_chunk<R>(
	file: &mut R,
	file_len: u64,
	fourcc: &[u8; 4],
	content: &[u8],
) -> Result<()>
where
	R: Read + Write + Seek,
{
	match find_chunk::<LittleEndian, _>(file, fourcc, file_len)? {
		Some(location) if u64::from(location.size) == content.len() as u64 => {
			file.seek(SeekFrom::Start(location.content_pos))?;
			file.write_all(content)?;
		},
		Some(location) => {
			log::warn!(
				"Chunk {} changed size ({} -> {}), skipping update",
				String::from_utf8_lossy(fourcc),
				location.size,
				content.len()
			);
		},
		None => {
			file.seek(SeekFrom::End(0))?;
			file.write_all(fourcc)?;
			file.write_u32::<LittleEndian>(content.len() as u32)?;
			file.write_all(content)?;
			if content.len() % 2 != 0 {
				file.write_u8(0)?;
			}
		},
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::{Chunks, find_chunk, update_chunk};

	use std::io::{Cursor, Seek, SeekFrom};

	use byteorder::LittleEndian;

	fn wave_image() -> Vec<u8> {
		let mut image = Vec::new();
		image.extend_from_slice(b"RIFF");
		image.extend_from_slice(&0_u32.to_le_bytes());
		image.extend_from_slice(b"WAVE");
		image.extend_from_slice(b"fmt ");
		image.extend_from_slice(&4_u32.to_le_bytes());
		image.extend_from_slice(&[1, 2, 3, 4]);
		image.extend_from_slice(b"data");
		image.extend_from_slice(&2_u32.to_le_bytes());
		image.extend_from_slice(&[9, 9]);
		image
	}

	#[test]
	fn walk_and_find() {
		let image = wave_image();
		let len = image.len() as u64;
		let mut cursor = Cursor::new(image);

		let location = find_chunk::<LittleEndian, _>(&mut cursor, b"data", len)
			.unwrap()
			.unwrap();
		assert_eq!(location.size, 2);
		assert_eq!(location.content_pos, len - 2);

		assert!(
			find_chunk::<LittleEndian, _>(&mut cursor, b"cart", len)
				.unwrap()
				.is_none()
		);
	}

	#[test]
	fn fencepost_shift() {
		// A stray byte in front of the second chunk's name
		let mut image = Vec::new();
		image.extend_from_slice(b"RIFF");
		image.extend_from_slice(&0_u32.to_le_bytes());
		image.extend_from_slice(b"WAVE");
		image.extend_from_slice(&[0x0A]);
		image.extend_from_slice(b"data");
		image.extend_from_slice(&2_u32.to_le_bytes());
		image.extend_from_slice(&[7, 7]);

		let len = image.len() as u64;
		let mut cursor = Cursor::new(image);
		cursor.seek(SeekFrom::Start(12)).unwrap();

		let mut chunks = Chunks::<LittleEndian>::new(len - 12);
		assert!(chunks.next(&mut cursor).unwrap());
		assert_eq!(&chunks.fourcc, b"data");
		assert_eq!(chunks.size, 2);
	}

	#[test]
	fn update_in_place_and_append() {
		let image = wave_image();
		let len = image.len() as u64;
		let mut cursor = Cursor::new(image);

		// Same size: rewritten in place
		update_chunk(&mut cursor, len, b"fmt ", &[9, 8, 7, 6]).unwrap();
		let location = find_chunk::<LittleEndian, _>(&mut cursor, b"fmt ", len)
			.unwrap()
			.unwrap();
		assert_eq!(location.size, 4);
		assert_eq!(
			&cursor.get_ref()[location.content_pos as usize..location.content_pos as usize + 4],
			&[9, 8, 7, 6]
		);

		// Missing: appended
		update_chunk(&mut cursor, len, b"cart", &[1, 1]).unwrap();
		let new_len = cursor.get_ref().len() as u64;
		let location = find_chunk::<LittleEndian, _>(&mut cursor, b"cart", new_len)
			.unwrap()
			.unwrap();
		assert_eq!(location.size, 2);
	}
}
