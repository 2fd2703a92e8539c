//! The AES46-2002 `cart` chunk

use crate::data::CartData;
use crate::error::Result;
use crate::macros::decode_err;
use crate::util::text::{fixed_string, put_fixed_string};

use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveTime};

pub(crate) const CART_CHUNK_SIZE: usize = 2048;
const CART_VERSION: &[u8; 4] = b"0101";
const MAX_TIMERS: usize = 8;

/// One cue timer slot: a 4-byte label and a sample offset
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CartTimer {
	pub label: [u8; 4],
	pub sample: u32,
}

/// A parsed `cart` chunk
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartChunk {
	pub version: [u8; 4],
	pub title: String,
	pub artist: String,
	pub cut_id: String,
	pub client_id: String,
	pub category: String,
	pub classification: String,
	pub out_cue: String,
	pub start_date: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_date: Option<NaiveDate>,
	pub end_time: Option<NaiveTime>,
	pub producer_app_id: String,
	pub producer_app_ver: String,
	pub user_def: String,
	pub level_ref: u32,
	pub timers: Vec<CartTimer>,
	pub url: String,
	pub tag_text: String,
}

fn cut_date(field: &[u8]) -> Option<NaiveDate> {
	NaiveDate::parse_from_str(fixed_string(field).trim(), "%Y-%m-%d").ok()
}

fn cut_time(field: &[u8]) -> Option<NaiveTime> {
	NaiveTime::parse_from_str(fixed_string(field).trim(), "%H:%M:%S").ok()
}

impl CartChunk {
	/// Parses the chunk content
	///
	/// The URL field and the trailing tag text are only defined for RIFF/WAVE
	/// hosts; `wave` gates them.
	pub(crate) fn parse(content: &[u8], wave: bool) -> Result<Self> {
		if content.len() < CART_CHUNK_SIZE {
			return Err(decode_err!("cart chunk too short"));
		}

		let mut timers = Vec::new();
		for i in 0..MAX_TIMERS {
			let slot = &content[684 + i * 8..692 + i * 8];
			if slot[0] != 0 {
				timers.push(CartTimer {
					label: [slot[0], slot[1], slot[2], slot[3]],
					sample: LittleEndian::read_u32(&slot[4..8]),
				});
			}
		}

		let (url, tag_text) = if wave {
			(
				fixed_string(&content[1024..2048]),
				fixed_string(&content[2048..]),
			)
		} else {
			(String::new(), String::new())
		};

		Ok(CartChunk {
			version: [content[0], content[1], content[2], content[3]],
			title: fixed_string(&content[4..68]),
			artist: fixed_string(&content[68..132]),
			cut_id: fixed_string(&content[132..196]),
			client_id: fixed_string(&content[196..260]),
			category: fixed_string(&content[260..324]),
			classification: fixed_string(&content[324..388]),
			out_cue: fixed_string(&content[388..452]),
			start_date: cut_date(&content[452..462]),
			start_time: cut_time(&content[462..470]),
			end_date: cut_date(&content[470..480]),
			end_time: cut_time(&content[480..488]),
			producer_app_id: fixed_string(&content[488..552]),
			producer_app_ver: fixed_string(&content[552..616]),
			user_def: fixed_string(&content[616..680]),
			level_ref: LittleEndian::read_u32(&content[680..684]),
			timers,
			url,
			tag_text,
		})
	}

	/// Projects the chunk onto a metadata record, converting timer sample
	/// offsets to milliseconds at `samples_per_sec`
	pub(crate) fn apply(&self, data: &mut CartData, samples_per_sec: u32) {
		data.metadata_found = true;
		data.title = self.title.clone();
		data.artist = self.artist.clone();
		data.cut_name = self.cut_id.clone();
		data.client = self.client_id.clone();
		data.category = self.category.clone();
		data.classification = self.classification.clone();
		data.out_cue = self.out_cue.clone();
		data.set_start_date(self.start_date);
		data.set_start_time(self.start_time);
		data.set_end_date(self.end_date);
		data.set_end_time(self.end_time);
		data.user_defined = self.user_def.clone();
		data.url = self.url.clone();
		data.tag_text = self.tag_text.clone();

		if samples_per_sec == 0 {
			return;
		}
		let to_msec = |sample: u32| 1000 * i64::from(sample) / i64::from(samples_per_sec);

		// ENCO writes both ends of the audio pair under a single "AUDs" label
		let aud_starts: Vec<u32> = self
			.timers
			.iter()
			.filter(|t| &t.label == b"AUDs")
			.map(|t| t.sample)
			.collect();
		if aud_starts.len() == 2 {
			data.start_pos = to_msec(aud_starts[0].min(aud_starts[1]));
			data.end_pos = to_msec(aud_starts[0].max(aud_starts[1]));
		} else {
			for timer in &self.timers {
				match &timer.label {
					b"AUDs" => data.start_pos = to_msec(timer.sample),
					b"AUDe" => data.end_pos = to_msec(timer.sample),
					_ => {},
				}
			}
		}

		for timer in &self.timers {
			match &timer.label {
				b"SEGs" | b"SEC1" => data.segue_start_pos = to_msec(timer.sample),
				b"SEGe" | b"EOD " => data.segue_end_pos = to_msec(timer.sample),
				b"INTs" => data.talk_start_pos = to_msec(timer.sample),
				b"INTe" => data.talk_end_pos = to_msec(timer.sample),
				b"INT " | b"INT1" => {
					data.talk_start_pos = 0;
					data.talk_end_pos = to_msec(timer.sample);
				},
				_ => {},
			}
		}
	}

	/// Builds a chunk from a metadata record for writing
	///
	/// Marker pairs become timers, converted back to sample offsets after
	/// subtracting `ptr_offset_msecs` (payload lead-in already written).
	pub(crate) fn from_data(
		data: &CartData,
		level_ref: u32,
		samples_per_sec: u32,
		ptr_offset_msecs: i64,
	) -> Self {
		let frame_offset = |msecs: i64| -> u32 {
			let msecs = msecs - ptr_offset_msecs;
			if msecs < 0 {
				return 0;
			}
			(msecs * i64::from(samples_per_sec) / 1000) as u32
		};

		let mut timers = Vec::new();
		let mut pair = |start_label: &[u8; 4], end_label: &[u8; 4], start: i64, end: i64| {
			if start >= 0 && end > start {
				timers.push(CartTimer {
					label: *start_label,
					sample: frame_offset(start),
				});
				timers.push(CartTimer {
					label: *end_label,
					sample: frame_offset(end),
				});
			}
		};
		pair(b"SEGs", b"SEGe", data.segue_start_pos, data.segue_end_pos);
		pair(b"INTs", b"INTe", data.talk_start_pos, data.talk_end_pos);
		pair(b"AUDs", b"AUDe", data.start_pos, data.end_pos);

		CartChunk {
			version: *CART_VERSION,
			title: data.title.clone(),
			artist: data.artist.clone(),
			cut_id: data.cut_name.clone(),
			client_id: data.client.clone(),
			category: data.category.clone(),
			classification: data.classification.clone(),
			out_cue: data.out_cue.clone(),
			start_date: data.start_date(),
			start_time: data.start_time(),
			end_date: data.end_date(),
			end_time: data.end_time(),
			producer_app_id: env!("CARGO_PKG_NAME").to_string(),
			producer_app_ver: env!("CARGO_PKG_VERSION").to_string(),
			user_def: data.user_defined.clone(),
			level_ref,
			timers,
			url: data.url.clone(),
			tag_text: data.tag_text.clone(),
		}
	}

	/// Renders the chunk content: the fixed 2048-byte layout plus any
	/// trailing tag text
	pub(crate) fn render(&self) -> Vec<u8> {
		let mut content = vec![0_u8; CART_CHUNK_SIZE];
		content[0..4].copy_from_slice(&self.version);
		put_fixed_string(&mut content[4..68], &self.title);
		put_fixed_string(&mut content[68..132], &self.artist);
		put_fixed_string(&mut content[132..196], &self.cut_id);
		put_fixed_string(&mut content[196..260], &self.client_id);
		put_fixed_string(&mut content[260..324], &self.category);
		put_fixed_string(&mut content[324..388], &self.classification);
		put_fixed_string(&mut content[388..452], &self.out_cue);

		// Unset windows render as the widest representable window
		let start_date = self
			.start_date
			.map_or_else(|| "1900-01-01".to_string(), |d| d.format("%Y-%m-%d").to_string());
		let start_time = self
			.start_time
			.map_or_else(|| "00:00:00".to_string(), |t| t.format("%H:%M:%S").to_string());
		let end_date = self
			.end_date
			.map_or_else(|| "9999-12-31".to_string(), |d| d.format("%Y-%m-%d").to_string());
		let end_time = self
			.end_time
			.map_or_else(|| "23:59:59".to_string(), |t| t.format("%H:%M:%S").to_string());
		content[452..462].copy_from_slice(start_date.as_bytes());
		content[462..470].copy_from_slice(start_time.as_bytes());
		content[470..480].copy_from_slice(end_date.as_bytes());
		content[480..488].copy_from_slice(end_time.as_bytes());

		put_fixed_string(&mut content[488..552], &self.producer_app_id);
		put_fixed_string(&mut content[552..616], &self.producer_app_ver);
		put_fixed_string(&mut content[616..680], &self.user_def);
		LittleEndian::write_u32(&mut content[680..684], self.level_ref);

		for (i, timer) in self.timers.iter().take(MAX_TIMERS).enumerate() {
			content[684 + i * 8..688 + i * 8].copy_from_slice(&timer.label);
			LittleEndian::write_u32(&mut content[688 + i * 8..692 + i * 8], timer.sample);
		}

		put_fixed_string(&mut content[1024..2048], &self.url);
		content.extend_from_slice(self.tag_text.as_bytes());

		content
	}
}
