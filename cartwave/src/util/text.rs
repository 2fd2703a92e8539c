use crate::error::Result;

pub(crate) fn utf8_decode(bytes: Vec<u8>) -> Result<String> {
	String::from_utf8(bytes).map_err(Into::into)
}

// Decodes a fixed-size, NUL-padded field from a chunk layout. Everything from
// the first NUL onward is discarded, and invalid bytes are replaced rather
// than rejected, since these fields come from decades of broadcast encoders.
pub(crate) fn fixed_string(bytes: &[u8]) -> String {
	let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
	String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// `fixed_string`, then strip surrounding whitespace (some chunks space-pad
// instead of NUL-padding)
pub(crate) fn fixed_string_trimmed(bytes: &[u8]) -> String {
	fixed_string(bytes).trim().to_string()
}

// Writes `text` into a fixed-size field, truncating or NUL-padding as needed
pub(crate) fn put_fixed_string(field: &mut [u8], text: &str) {
	let bytes = text.as_bytes();
	let len = core::cmp::min(bytes.len(), field.len());

	field[..len].copy_from_slice(&bytes[..len]);
	for b in &mut field[len..] {
		*b = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::{fixed_string, fixed_string_trimmed, put_fixed_string};

	#[test]
	fn fixed_field_decode() {
		assert_eq!(fixed_string(b"Morning Drive\0\0\0"), "Morning Drive");
		assert_eq!(fixed_string(b"no terminator"), "no terminator");
		assert_eq!(fixed_string_trimmed(b"  padded  \0"), "padded");
	}

	#[test]
	fn fixed_field_encode() {
		let mut field = [0xFF; 8];
		put_fixed_string(&mut field, "cut");
		assert_eq!(&field, b"cut\0\0\0\0\0");

		let mut short = [0; 4];
		put_fixed_string(&mut short, "overflowing");
		assert_eq!(&short, b"over");
	}
}
