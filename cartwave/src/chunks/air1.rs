//! The AirForce (`AIR1`) chunk, read-only

use crate::data::CartData;
use crate::util::text::fixed_string_trimmed;

const AIR1_MIN_SIZE: usize = 0x183;

/// Parses the chunk content directly onto a metadata record
pub(crate) fn apply(content: &[u8], data: &mut CartData) {
	if content.len() < AIR1_MIN_SIZE {
		return;
	}

	data.title = fixed_string_trimmed(&content[0x102..0x102 + 27]);
	data.artist = fixed_string_trimmed(&content[0x147..0x147 + 27]);
	data.album = fixed_string_trimmed(&content[0x163..0x163 + 27]);
	data.release_year = fixed_string_trimmed(&content[0x17F..0x17F + 4])
		.parse()
		.unwrap_or(0);
	data.metadata_found = true;
}

#[cfg(test)]
mod tests {
	use super::apply;
	use crate::data::CartData;

	#[test]
	fn fixed_offsets() {
		let mut content = vec![0_u8; 2048];
		content[0x102..0x102 + 9].copy_from_slice(b"News Open");
		content[0x147..0x147 + 8].copy_from_slice(b"Newsroom");
		content[0x163..0x163 + 7].copy_from_slice(b"Package");
		content[0x17F..0x17F + 4].copy_from_slice(b"2003");

		let mut data = CartData::new();
		apply(&content, &mut data);
		assert!(data.metadata_found);
		assert_eq!(data.title, "News Open");
		assert_eq!(data.artist, "Newsroom");
		assert_eq!(data.album, "Package");
		assert_eq!(data.release_year, 2003);
	}

	#[test]
	fn short_chunk_ignored() {
		let mut data = CartData::new();
		apply(&[0; 64], &mut data);
		assert!(!data.metadata_found);
	}
}
