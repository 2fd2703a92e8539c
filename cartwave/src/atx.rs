//! AudioScience ATX capture files
//!
//! An ATX file is a raw MPEG stream behind a short proprietary header. The
//! header carries nothing we need, so opening one amounts to finding the
//! first frame sync byte and handing off to the MPEG reader.

use crate::error::Result;
use crate::file::StreamInfo;
use crate::macros::decode_err;
use crate::mpeg;
use crate::probe::Detection;

use std::io::{Read, Seek, SeekFrom};

const MAX_ATX_HEADER_SIZE: usize = 256;

/// Finds the first frame sync byte within the header search window
pub(crate) fn frame_offset<R>(reader: &mut R) -> Result<Option<u64>>
where
	R: Read + Seek,
{
	reader.seek(SeekFrom::Start(0))?;

	let mut window = [0; MAX_ATX_HEADER_SIZE - 1];
	let read = reader.read(&mut window)?;
	Ok(window[..read].iter().position(|&b| b == 0xFF).map(|i| i as u64))
}

pub(crate) fn open<R>(reader: &mut R, file_len: u64) -> Result<StreamInfo>
where
	R: Read + Seek,
{
	let Some(offset) = frame_offset(reader)? else {
		return Err(decode_err!(Atx, "No MPEG frame behind the ATX header"));
	};

	let detection = Detection {
		file_type: crate::probe::FileType::Atx,
		mpeg_frame_offset: offset,
		id3v2_tag: false,
	};
	mpeg::open(reader, &detection, file_len)
}
