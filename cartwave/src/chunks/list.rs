//! The TM Century `list`/`tags` chunk, read-only
//!
//! A run of `tag(4) + length(u32 LE) + data` elements, NUL padding between
//! them. Durations arrive as clock strings ("mm:ss", optionally fractional).

use crate::data::CartData;
use crate::util::text::fixed_string;
use crate::util::time::parse_time_length;

use byteorder::{ByteOrder, LittleEndian};

/// Walks the chunk content onto a metadata record; `ext_time_length` is the
/// audio length in ms, closing an open-ended segue
pub(crate) fn apply(content: &[u8], data: &mut CartData, ext_time_length: i64) {
	// The first 4 bytes are the list type identifier
	let mut offset = 4_usize;

	while offset + 8 <= content.len() {
		let tag = &content[offset..offset + 4];
		let len = LittleEndian::read_u32(&content[offset + 4..offset + 8]) as usize;
		offset += 8;
		if offset + len > content.len() {
			break;
		}
		let value = fixed_string(&content[offset..offset + len]);
		offset += len;

		data.metadata_found = true;
		match tag {
			b"tref" => data.song_id = value,
			b"tttl" => data.title = value,
			b"tart" => data.artist = value,
			b"tcom" => data.composer = value,
			b"tpub" => data.publisher = value,
			b"tlic" => data.licensing_organization = value,
			b"tlab" => data.label = value,
			b"tint" => {
				if let Some(msecs) = parse_time_length(&value) {
					data.talk_start_pos = 0;
					data.talk_end_pos = msecs;
				}
			},
			b"ttim" => {
				if let Some(msecs) = parse_time_length(&value) {
					data.start_pos = 0;
					data.end_pos = msecs;
				}
			},
			b"tyr " => data.release_year = value.trim().parse().unwrap_or(0),
			b"taux" => {
				if let Some(msecs) = parse_time_length(&value) {
					data.segue_start_pos = msecs;
				}
			},
			b"tbpm" => data.beats_per_minute = value.trim().parse().unwrap_or(0),
			b"talb" => data.album = value,
			b"tpli" => data.copyright_notice = value,
			b"tisr" => data.isrc = value.replace(' ', ""),
			_ => {},
		}

		while offset < content.len() && content[offset] == 0 {
			offset += 1;
		}
	}

	if data.segue_start_pos >= 0 && data.segue_end_pos < 0 {
		data.segue_end_pos = ext_time_length;
	}
}

#[cfg(test)]
mod tests {
	use super::apply;
	use crate::data::CartData;

	fn element(tag: &[u8; 4], value: &str) -> Vec<u8> {
		let mut bytes = Vec::new();
		bytes.extend_from_slice(tag);
		bytes.extend_from_slice(&(value.len() as u32 + 1).to_le_bytes());
		bytes.extend_from_slice(value.as_bytes());
		bytes.push(0);
		bytes
	}

	#[test]
	fn tag_walk() {
		let mut content = b"tags".to_vec();
		content.extend(element(b"tttl", "Hit Single"));
		content.extend(element(b"tart", "The Band"));
		content.extend(element(b"tint", "0:12"));
		content.extend(element(b"taux", "2:45.5"));
		content.extend(element(b"tisr", "US S1Z 99 00001"));
		content.extend(element(b"tyr ", "1999"));

		let mut data = CartData::new();
		apply(&content, &mut data, 180_000);

		assert!(data.metadata_found);
		assert_eq!(data.title, "Hit Single");
		assert_eq!(data.artist, "The Band");
		assert_eq!(data.talk_start_pos, 0);
		assert_eq!(data.talk_end_pos, 12_000);
		assert_eq!(data.isrc, "USS1Z9900001");
		assert_eq!(data.release_year, 1999);
		// An open-ended segue closes at the end of the audio
		assert_eq!(data.segue_start_pos, 165_500);
		assert_eq!(data.segue_end_pos, 180_000);
	}

	#[test]
	fn truncated_element_stops_walk() {
		let mut content = b"tags".to_vec();
		content.extend(element(b"tttl", "Kept"));
		content.extend_from_slice(b"tart");
		content.extend_from_slice(&1000_u32.to_le_bytes());
		content.extend_from_slice(b"cut off");

		let mut data = CartData::new();
		apply(&content, &mut data, 0);
		assert_eq!(data.title, "Kept");
		assert!(data.artist.is_empty());
	}
}
