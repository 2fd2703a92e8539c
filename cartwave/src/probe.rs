//! Container signature detection

use crate::error::Result;

use std::io::{Read, Seek, SeekFrom};

/// The recognized container types
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum FileType {
	/// RIFF/WAVE
	Wave,
	/// AIFF (FORM)
	Aiff,
	/// FLAC
	Flac,
	/// ATX: MPEG payload behind a variable-length text preamble
	Atx,
	/// TMC: length-prefixed MPEG payload with a trailing tag block
	Tmc,
	/// Ogg Vorbis
	Ogg,
	/// Raw MPEG audio, optionally wrapped in ID3 tags
	Mpeg,
	/// MPEG-4 audio, readable only through an [`Mp4Decoder`](crate::Mp4Decoder)
	M4a,
	/// A legacy hybrid RIFF/WAVE stream with no `fmt ` chunk, implicitly MPEG
	///
	/// Never returned by detection; the WAVE reader reclassifies the handle.
	Ambos,
}

/// Detection output, carrying the state the readers need to locate the payload
#[derive(Copy, Clone, Debug)]
pub(crate) struct Detection {
	pub file_type: FileType,
	// Offset of the first MPEG frame (size of any leading ID3v2 tag, or
	// wherever the sync scan landed). Only meaningful for `Mpeg`.
	pub mpeg_frame_offset: u64,
	// Whether a leading ID3v2 tag was seen
	pub id3v2_tag: bool,
}

impl Detection {
	fn of(file_type: FileType) -> Self {
		Self {
			file_type,
			mpeg_frame_offset: 0,
			id3v2_tag: false,
		}
	}
}

// Decodes the 4-byte syncsafe length field of an ID3v2 tag header, returning
// the total tag size including the 10 header bytes
pub(crate) fn id3v2_tag_size(header: &[u8; 10]) -> u64 {
	u64::from(header[9] & 0x7F)
		| u64::from(header[8] & 0x7F) << 7
		| u64::from(header[7] & 0x7F) << 14
		| u64::from(header[6] & 0x7F) << 21
}

/// Classifies a byte stream into one of the supported container types
///
/// Signatures are checked in a fixed order, since a bare MPEG frame sync can
/// appear inside most other envelopes. MPEG-4 is not handled here; it needs
/// the handle's decoder capability and is tried by the caller after everything
/// else has failed.
pub(crate) fn detect<R>(data: &mut R) -> Result<Option<Detection>>
where
	R: Read + Seek,
{
	if is_wave(data)? {
		log::debug!("File detected as WAVE");
		return Ok(Some(Detection::of(FileType::Wave)));
	}
	if is_aiff(data)? {
		log::debug!("File detected as AIFF");
		return Ok(Some(Detection::of(FileType::Aiff)));
	}
	if is_flac(data)? {
		log::debug!("File detected as FLAC");
		return Ok(Some(Detection::of(FileType::Flac)));
	}
	if is_atx(data)? {
		log::debug!("File detected as ATX");
		return Ok(Some(Detection::of(FileType::Atx)));
	}
	if is_tmc(data)? {
		log::debug!("File detected as TMC");
		return Ok(Some(Detection::of(FileType::Tmc)));
	}
	if is_ogg(data)? {
		log::debug!("File detected as Ogg");
		return Ok(Some(Detection::of(FileType::Ogg)));
	}
	if let Some(detection) = is_mpeg(data)? {
		log::debug!(
			"File detected as MPEG, first frame at {}",
			detection.mpeg_frame_offset
		);
		return Ok(Some(detection));
	}

	Ok(None)
}

fn is_wave<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	let mut id = [0; 12];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut id)? != 12 {
		return Ok(false);
	}

	Ok(&id[..4] == b"RIFF" && &id[8..] == b"WAVE")
}

fn is_aiff<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	let mut id = [0; 12];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut id)? != 12 {
		return Ok(false);
	}

	Ok(&id[..4] == b"FORM" && &id[8..] == b"AIFF")
}

fn is_flac<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	data.seek(SeekFrom::Start(0))?;

	// A FLAC file may carry a prepended ID3v2 tag
	let mut header = [0; 10];
	if data.read(&mut header)? != 10 {
		return Ok(false);
	}

	if &header[..3] == b"ID3" {
		data.seek(SeekFrom::Start(id3v2_tag_size(&header) + 10))?;
	} else {
		data.seek(SeekFrom::Start(0))?;
	}

	let mut marker = [0; 4];
	if data.read(&mut marker)? != 4 {
		return Ok(false);
	}

	Ok(&marker == b"fLaC")
}

fn is_atx<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	let mut magic = [0; 5];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut magic)? != 5 {
		return Ok(false);
	}

	Ok(&magic == b"FILE:")
}

fn is_tmc<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	let mut header = [0; 6];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut header)? != 6 {
		return Ok(false);
	}

	// 4-byte LE payload length, then the first MPEG sync bytes
	Ok(header[4] == 0xFF && header[5] & 0xF0 == 0xF0)
}

fn is_ogg<R>(data: &mut R) -> Result<bool>
where
	R: Read + Seek,
{
	let mut magic = [0; 4];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut magic)? != 4 {
		return Ok(false);
	}

	Ok(&magic == b"OggS")
}

// An MPEG stream is any leading ID3v2 tag followed by a frame sync. If the
// sync is not found right after the tag, the rest of the stream is scanned
// byte by byte, and the sync offset is recorded for the reader.
fn is_mpeg<R>(data: &mut R) -> Result<Option<Detection>>
where
	R: Read + Seek,
{
	let mut header = [0; 10];
	data.seek(SeekFrom::Start(0))?;
	if data.read(&mut header)? != 10 {
		return Ok(None);
	}

	let mut id3v2_tag = false;
	let mut offset = 0_u64;
	if header[..3].eq_ignore_ascii_case(b"ID3") {
		id3v2_tag = true;
		offset = id3v2_tag_size(&header) + 10;
	}

	data.seek(SeekFrom::Start(offset))?;

	let mut sync = [0; 2];
	if data.read(&mut sync)? != 2 {
		return Ok(None);
	}

	if sync[0] == 0xFF && sync[1] & 0xE0 == 0xE0 {
		return Ok(Some(Detection {
			file_type: FileType::Mpeg,
			mpeg_frame_offset: offset,
			id3v2_tag,
		}));
	}

	// No sync where the tag said it would be; scan for one
	let mut byte = [0; 1];
	while data.read(&mut byte)? == 1 {
		if byte[0] != 0xFF {
			continue;
		}
		if data.read(&mut byte)? == 1 && byte[0] & 0xF0 == 0xF0 {
			let offset = data.stream_position()? - 2;
			return Ok(Some(Detection {
				file_type: FileType::Mpeg,
				mpeg_frame_offset: offset,
				id3v2_tag: true,
			}));
		}
	}

	Ok(None)
}
