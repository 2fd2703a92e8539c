//! The free-form XML metadata (`rdxl`) chunk
//!
//! The content is opaque text to this crate. It is kept verbatim on the
//! handle and round-tripped on write, ahead of the payload chunk.

use crate::error::Result;
use crate::util::text::utf8_decode;

pub(crate) fn parse(content: Vec<u8>) -> Result<String> {
	// Tolerate a NUL-padded tail
	let end = content
		.iter()
		.position(|&b| b == 0)
		.unwrap_or(content.len());
	let mut content = content;
	content.truncate(end);
	utf8_decode(content)
}

pub(crate) fn render(contents: &str) -> Vec<u8> {
	contents.as_bytes().to_vec()
}
