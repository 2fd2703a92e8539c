//! The MPEG audio extension (`mext`) chunk

use crate::error::Result;
use crate::macros::decode_err;

use byteorder::{ByteOrder, LittleEndian};

pub(crate) const MEXT_CHUNK_SIZE: usize = 12;

/// A parsed `mext` chunk
///
/// Note the inverted padding flag: bit 2 of the first byte set means padding
/// is NOT used.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MextChunk {
	pub homogenous: bool,
	pub padding_used: bool,
	pub rate_hacked: bool,
	pub free_format: bool,
	/// Frame size in bytes, only meaningful for homogenous streams
	pub frame_size: u16,
	pub anc_length: u16,
	pub left_energy: bool,
	pub ancillary_private: bool,
	pub right_energy: bool,
}

impl MextChunk {
	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < MEXT_CHUNK_SIZE {
			return Err(decode_err!("mext chunk too short"));
		}

		Ok(MextChunk {
			homogenous: content[0] & 1 != 0,
			padding_used: content[0] & 2 == 0,
			rate_hacked: content[0] & 4 != 0,
			free_format: content[0] & 8 != 0,
			frame_size: LittleEndian::read_u16(&content[2..4]),
			anc_length: LittleEndian::read_u16(&content[4..6]),
			left_energy: content[6] & 1 != 0,
			ancillary_private: content[6] & 2 != 0,
			right_energy: content[6] & 4 != 0,
		})
	}

	pub(crate) fn render(self) -> [u8; MEXT_CHUNK_SIZE] {
		let mut content = [0_u8; MEXT_CHUNK_SIZE];
		if self.homogenous {
			content[0] |= 1;
		}
		if !self.padding_used {
			content[0] |= 2;
		}
		if self.rate_hacked {
			content[0] |= 4;
		}
		if self.free_format {
			content[0] |= 8;
		}
		if self.homogenous {
			LittleEndian::write_u16(&mut content[2..4], self.frame_size);
		}
		LittleEndian::write_u16(&mut content[4..6], self.anc_length);
		if self.left_energy {
			content[6] |= 1;
		}
		if self.ancillary_private {
			content[6] |= 2;
		}
		if self.right_energy {
			content[6] |= 4;
		}
		content
	}
}

#[cfg(test)]
mod tests {
	use super::MextChunk;

	#[test]
	fn round_trip() {
		let chunk = MextChunk {
			homogenous: true,
			padding_used: false,
			rate_hacked: false,
			free_format: false,
			frame_size: 835,
			anc_length: 5,
			left_energy: true,
			ancillary_private: false,
			right_energy: true,
		};

		let content = chunk.render();
		assert_eq!(content[0], 1 | 2);
		assert_eq!(content[6], 1 | 4);
		assert_eq!(MextChunk::parse(&content).unwrap(), chunk);
	}

	#[test]
	fn frame_size_gated_on_homogenous() {
		let chunk = MextChunk {
			homogenous: false,
			padding_used: true,
			frame_size: 835,
			..MextChunk::default()
		};
		let parsed = MextChunk::parse(&chunk.render()).unwrap();
		assert_eq!(parsed.frame_size, 0);
	}
}
