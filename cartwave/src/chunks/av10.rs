//! The BE AudioVault (`av10`) chunk, read-only
//!
//! The chunk is a run of NUL-terminated label/value string pairs starting at
//! offset 2. Only a handful of labels carry anything we keep.

use crate::data::CartData;

/// Parses the chunk content directly onto a metadata record
pub(crate) fn apply(content: &[u8], data: &mut CartData) {
	let mut user_defined = Vec::new();

	let mut fields = content.get(2..).unwrap_or_default().split(|&b| b == 0);
	while let (Some(label), Some(value)) = (fields.next(), fields.next()) {
		let label = String::from_utf8_lossy(label);
		let value = String::from_utf8_lossy(value).into_owned();

		match label.as_ref() {
			// Start position and length, as a "pos,len" millisecond pair
			"1" => {
				if let Some((pos, length)) = parse_msec_pair(&value) {
					data.start_pos = pos;
					data.end_pos = pos + length;
					data.metadata_found = true;
				}
			},
			"2" => {
				if let Some((pos, _)) = parse_msec_pair(&value) {
					data.segue_start_pos = pos;
					data.segue_end_pos = data.end_pos;
					data.metadata_found = true;
				}
			},
			"C" => user_defined.push(format!("av_category={value}")),
			"CL" => user_defined.push(format!("av_class={value}")),
			"CO" => user_defined.push(format!("av_codes={value}")),
			"CI" => data.artist = value,
			"D" => {
				data.title = value;
				data.metadata_found = true;
			},
			"IN" => {
				if let Ok(seconds) = value.trim().parse::<i64>() {
					data.talk_start_pos = data.start_pos.max(0);
					data.talk_end_pos = 1000 * seconds;
					data.metadata_found = true;
				}
			},
			"Q" => {
				data.out_cue = value;
				data.metadata_found = true;
			},
			_ => {},
		}
	}

	if !user_defined.is_empty() {
		data.user_defined = user_defined.join(", ");
	}
}

fn parse_msec_pair(value: &str) -> Option<(i64, i64)> {
	let (first, second) = value.split_once(',')?;
	Some((first.trim().parse().ok()?, second.trim().parse().ok()?))
}
