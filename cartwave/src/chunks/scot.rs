//! The legacy Scott Studios (`scot`) chunk, read-only

use crate::data::CartData;
use crate::error::Result;
use crate::macros::decode_err;
use crate::util::text::{fixed_string, fixed_string_trimmed};

use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveTime};

const SCOT_MIN_SIZE: usize = 342;

/// A parsed `scot` chunk
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScotChunk {
	pub title: String,
	pub artist: String,
	pub etc: String,
	pub year: i32,
	/// Intro length in ms
	pub intro_length: i64,
	pub cart_number: u32,
	/// Segue start in tenths of a second back from the end of the audio
	pub segue_start: u16,
	pub start_date: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_date: Option<NaiveDate>,
	pub end_time: Option<NaiveTime>,
}

fn digits(field: &[u8]) -> i32 {
	fixed_string_trimmed(field).parse().unwrap_or(0)
}

// Scheduling hours are stored biased by 128; anything outside 129..=151 means
// "no hour restriction"
fn biased_hour(field: &[u8]) -> Option<NaiveTime> {
	let hour = digits(field);
	if (129..=151).contains(&hour) {
		NaiveTime::from_hms_opt(hour as u32 - 128, 0, 0)
	} else {
		None
	}
}

impl ScotChunk {
	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < SCOT_MIN_SIZE {
			return Err(decode_err!("scot chunk too short"));
		}

		let start_date = NaiveDate::from_ymd_opt(
			digits(&content[69..71]) + 2000,
			digits(&content[65..67]) as u32,
			digits(&content[67..69]) as u32,
		);
		// An end date is only meaningful alongside a valid start date
		let end_date = if start_date.is_some() {
			NaiveDate::from_ymd_opt(
				digits(&content[75..77]) + 2000,
				digits(&content[71..73]) as u32,
				digits(&content[73..75]) as u32,
			)
		} else {
			None
		};
		let (start_date, end_date) = if end_date.is_some() {
			(start_date, end_date)
		} else {
			(None, None)
		};

		Ok(ScotChunk {
			title: fixed_string(&content[4..46]),
			artist: fixed_string(&content[267..300]),
			etc: fixed_string(&content[301..334]),
			year: digits(&content[338..342]),
			intro_length: 1000 * i64::from(digits(&content[335..337])),
			cart_number: fixed_string_trimmed(&content[47..51]).parse().unwrap_or(0),
			segue_start: LittleEndian::read_u16(&content[88..90]),
			start_date,
			start_time: biased_hour(&content[77..79]),
			end_date,
			end_time: biased_hour(&content[78..80]),
		})
	}

	/// Projects the chunk onto a metadata record; `ext_time_length` is the
	/// audio length in ms, anchoring the end-relative segue offset
	pub(crate) fn apply(&self, data: &mut CartData, ext_time_length: i64) {
		data.metadata_found = true;
		data.title = self.title.trim().to_string();
		data.artist = self.artist.trim().to_string();
		data.user_defined = self.etc.trim().to_string();
		data.release_year = self.year;
		data.cut_name = self.cart_number.to_string();
		data.talk_start_pos = 0;
		data.talk_end_pos = self.intro_length;
		if self.segue_start > 0 {
			data.segue_start_pos = ext_time_length - 10 * i64::from(self.segue_start);
			data.segue_end_pos = ext_time_length;
		}
		if self.start_date.is_some() {
			data.set_start_date(self.start_date);
		}
		if self.start_time.is_some() {
			data.set_start_time(self.start_time);
		}
		if self.end_date.is_some() {
			data.set_end_date(self.end_date);
		}
		if self.end_time.is_some() {
			data.set_end_time(self.end_time);
		}
	}
}
