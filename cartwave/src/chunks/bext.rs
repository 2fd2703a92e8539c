//! The EBU broadcast extension (`bext`) chunk

use crate::data::CartData;
use crate::error::Result;
use crate::macros::decode_err;
use crate::util::text::{fixed_string, put_fixed_string};

use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveTime};

pub(crate) const BEXT_CHUNK_SIZE: usize = 602;
const BWF_VERSION: u16 = 1;

/// A parsed `bext` chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BextChunk {
	pub description: String,
	pub originator: String,
	pub originator_ref: String,
	pub origination_date: Option<NaiveDate>,
	pub origination_time: Option<NaiveTime>,
	/// First-sample offset from midnight, in samples
	pub time_reference: u64,
	pub version: u16,
	pub umid: [u8; 64],
	pub coding_history: String,
}

impl Default for BextChunk {
	fn default() -> Self {
		Self {
			description: String::new(),
			originator: String::new(),
			originator_ref: String::new(),
			origination_date: None,
			origination_time: None,
			time_reference: 0,
			version: BWF_VERSION,
			umid: [0; 64],
			coding_history: String::new(),
		}
	}
}

impl BextChunk {
	pub(crate) fn parse(content: &[u8]) -> Result<Self> {
		if content.len() < BEXT_CHUNK_SIZE {
			return Err(decode_err!("bext chunk too short"));
		}

		let mut umid = [0; 64];
		umid.copy_from_slice(&content[348..412]);

		let time_reference_low = LittleEndian::read_u32(&content[338..342]);
		let time_reference_high = LittleEndian::read_u32(&content[342..346]);

		Ok(BextChunk {
			description: fixed_string(&content[0..256]),
			originator: fixed_string(&content[256..288]),
			originator_ref: fixed_string(&content[288..320]),
			origination_date: NaiveDate::parse_from_str(
				fixed_string(&content[320..330]).trim(),
				"%Y-%m-%d",
			)
			.ok(),
			origination_time: NaiveTime::parse_from_str(
				fixed_string(&content[330..338]).trim(),
				"%H:%M:%S",
			)
			.ok(),
			time_reference: u64::from(time_reference_low)
				| u64::from(time_reference_high) << 32,
			version: LittleEndian::read_u16(&content[346..348]),
			umid,
			coding_history: fixed_string(&content[BEXT_CHUNK_SIZE..]),
		})
	}

	pub(crate) fn apply(&self, data: &mut CartData) {
		data.metadata_found = true;
		data.description = self.description.clone();
	}

	/// Renders the chunk content: the fixed 602-byte layout plus any
	/// trailing coding history
	pub(crate) fn render(&self) -> Vec<u8> {
		let mut content = vec![0_u8; BEXT_CHUNK_SIZE];
		put_fixed_string(&mut content[0..256], &self.description);
		put_fixed_string(&mut content[256..288], &self.originator);
		put_fixed_string(&mut content[288..320], &self.originator_ref);

		if let Some(date) = self.origination_date {
			content[320..330].copy_from_slice(date.format("%Y-%m-%d").to_string().as_bytes());
		}
		if let Some(time) = self.origination_time {
			content[330..338].copy_from_slice(time.format("%H:%M:%S").to_string().as_bytes());
		}

		LittleEndian::write_u32(&mut content[338..342], self.time_reference as u32);
		LittleEndian::write_u32(&mut content[342..346], (self.time_reference >> 32) as u32);
		LittleEndian::write_u16(&mut content[346..348], BWF_VERSION);
		content[348..412].copy_from_slice(&self.umid);

		content.extend_from_slice(self.coding_history.as_bytes());
		content
	}
}
