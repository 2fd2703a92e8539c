//! The format-agnostic metadata record shared by every container type

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// The class of asset a cart represents
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum CartType {
	/// An audio asset
	#[default]
	Audio,
	/// A macro (command sequence) asset
	Macro,
}

/// How an asset is intended to be scheduled
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UsageCode {
	#[default]
	Feature,
	Open,
	Close,
	Theme,
	Background,
	Promo,
}

/// Position marker pairs, in milliseconds, `-1` meaning unset
pub const MARKER_UNSET: i64 = -1;

/// A flat, format-agnostic record of everything known about an audio asset
///
/// One instance describes a single cart/cut pair. Format readers populate it
/// opportunistically from whichever metadata chunks a file carries, and the
/// writer projects it back into cart/bext chunks.
///
/// All position markers are in milliseconds relative to the start of audio,
/// with `-1` meaning "unset".
#[derive(Clone, Debug, PartialEq)]
pub struct CartData {
	// Identity
	/// Cart number
	pub cart_number: u32,
	/// Cut number within the cart
	pub cut_number: u32,
	/// Cut name
	pub cut_name: String,
	/// Asset class
	pub cart_type: CartType,
	/// Scheduling usage
	pub usage_code: UsageCode,

	// Descriptive
	/// Title
	pub title: String,
	/// Artist
	pub artist: String,
	/// Album
	pub album: String,
	/// Conductor
	pub conductor: String,
	/// Composer
	pub composer: String,
	/// Publisher
	pub publisher: String,
	/// Record label
	pub label: String,
	/// Client
	pub client: String,
	/// Agency
	pub agency: String,
	/// Category
	pub category: String,
	/// Classification
	pub classification: String,
	/// Out cue
	pub out_cue: String,
	/// Release year, `0` when unknown
	pub release_year: i32,
	/// Copyright notice
	pub copyright_notice: String,
	/// Beats per minute, `0` when unknown
	pub beats_per_minute: i32,
	/// Licensing organization
	pub licensing_organization: String,
	/// TM Century song identifier
	pub song_id: String,
	/// International Standard Recording Code
	pub isrc: String,
	/// Industry Standard Commercial Identifier
	pub isci: String,
	/// MusicBrainz recording ID
	pub recording_mbid: String,
	/// MusicBrainz release ID
	pub release_mbid: String,
	/// Free-text user-defined field
	pub user_defined: String,
	/// URL
	pub url: String,
	/// Free-text tag data
	pub tag_text: String,
	/// Description
	pub description: String,

	// Scheduling
	/// Allowed days of the week, Monday first
	pub day_of_week: [bool; 7],
	/// Scheduling weight
	pub weight: u32,
	/// Evergreen flag
	pub evergreen: bool,
	start_date: Option<NaiveDate>,
	start_time: Option<NaiveTime>,
	end_date: Option<NaiveDate>,
	end_time: Option<NaiveTime>,
	/// Daypart window start
	pub daypart_start_time: Option<NaiveTime>,
	/// Daypart window end
	pub daypart_end_time: Option<NaiveTime>,
	/// Scheduling codes, in order
	pub scheduling_codes: Vec<String>,

	// Markers
	/// Start marker
	pub start_pos: i64,
	/// End marker
	pub end_pos: i64,
	/// Talk start marker
	pub talk_start_pos: i64,
	/// Talk end marker
	pub talk_end_pos: i64,
	/// Segue start marker
	pub segue_start_pos: i64,
	/// Segue end marker
	pub segue_end_pos: i64,
	/// Segue gain in hundredths of a dB, default `-3000` (-30.00 dB)
	pub segue_gain: i32,
	/// Hook start marker
	pub hook_start_pos: i64,
	/// Hook end marker
	pub hook_end_pos: i64,
	/// Fade-up point
	pub fade_up_pos: i64,
	/// Fade-down point
	pub fade_down_pos: i64,

	// Length policy
	/// Forced length in ms, `-1` = none
	pub forced_length: i64,
	/// Average length in ms, `-1` = none
	pub average_length: i64,
	/// Allowed length deviation in ms
	pub length_deviation: u32,
	/// Whether the forced length is enforced
	pub enforce_length: bool,
	/// Whether the asset plays asynchronously
	pub asyncronous: bool,

	// Statistics
	/// Number of plays
	pub play_counter: u32,
	/// Last cut played within the cart
	pub last_cut_played: u32,
	/// When the asset last played
	pub last_play_datetime: Option<NaiveDateTime>,
	/// Actual audio length in ms
	pub length: i64,

	// Housekeeping
	/// Whether any source chunk populated this record
	pub metadata_found: bool,
	/// When the metadata was captured
	pub metadata_datetime: Option<NaiveDateTime>,
	/// Owning user/host
	pub owner: String,
}

impl Default for CartData {
	fn default() -> Self {
		Self::new()
	}
}

impl CartData {
	/// Creates an empty record with the standard defaults
	#[must_use]
	pub fn new() -> Self {
		Self {
			cart_number: 0,
			cut_number: 0,
			cut_name: String::new(),
			cart_type: CartType::Audio,
			usage_code: UsageCode::Feature,
			title: String::new(),
			artist: String::new(),
			album: String::new(),
			conductor: String::new(),
			composer: String::new(),
			publisher: String::new(),
			label: String::new(),
			client: String::new(),
			agency: String::new(),
			category: String::new(),
			classification: String::new(),
			out_cue: String::new(),
			release_year: 0,
			copyright_notice: String::new(),
			beats_per_minute: 0,
			licensing_organization: String::new(),
			song_id: String::new(),
			isrc: String::new(),
			isci: String::new(),
			recording_mbid: String::new(),
			release_mbid: String::new(),
			user_defined: String::new(),
			url: String::new(),
			tag_text: String::new(),
			description: String::new(),
			day_of_week: [true; 7],
			weight: 1,
			evergreen: false,
			start_date: None,
			start_time: None,
			end_date: None,
			end_time: None,
			daypart_start_time: None,
			daypart_end_time: None,
			scheduling_codes: Vec::new(),
			start_pos: MARKER_UNSET,
			end_pos: MARKER_UNSET,
			talk_start_pos: MARKER_UNSET,
			talk_end_pos: MARKER_UNSET,
			segue_start_pos: MARKER_UNSET,
			segue_end_pos: MARKER_UNSET,
			segue_gain: -3000,
			hook_start_pos: MARKER_UNSET,
			hook_end_pos: MARKER_UNSET,
			fade_up_pos: MARKER_UNSET,
			fade_down_pos: MARKER_UNSET,
			forced_length: -1,
			average_length: -1,
			length_deviation: 0,
			enforce_length: false,
			asyncronous: false,
			play_counter: 0,
			last_cut_played: 0,
			last_play_datetime: None,
			length: 0,
			metadata_found: false,
			metadata_datetime: None,
			owner: String::new(),
		}
	}

	/// The start of the airing window, if one was set
	pub fn start_date(&self) -> Option<NaiveDate> {
		self.start_date
	}

	/// The start time of the airing window
	pub fn start_time(&self) -> Option<NaiveTime> {
		self.start_time
	}

	/// The end of the airing window, if one was set
	pub fn end_date(&self) -> Option<NaiveDate> {
		self.end_date
	}

	/// The end time of the airing window
	pub fn end_time(&self) -> Option<NaiveTime> {
		self.end_time
	}

	/// Sets the start date of the airing window
	pub fn set_start_date(&mut self, date: Option<NaiveDate>) {
		self.start_date = date;
	}

	/// Sets the start time of the airing window
	pub fn set_start_time(&mut self, time: Option<NaiveTime>) {
		self.start_time = time;
	}

	/// Sets the end date of the airing window
	pub fn set_end_date(&mut self, date: Option<NaiveDate>) {
		self.end_date = date;
	}

	/// Sets the end time of the airing window
	pub fn set_end_time(&mut self, time: Option<NaiveTime>) {
		self.end_time = time;
	}

	fn start_date_time(&self) -> Option<NaiveDateTime> {
		self.start_date
			.map(|d| d.and_time(self.start_time.unwrap_or(NaiveTime::MIN)))
	}

	fn end_date_time(&self) -> Option<NaiveDateTime> {
		self.end_date
			.map(|d| d.and_time(self.end_time.unwrap_or(NaiveTime::MIN)))
	}

	/// Normalizes all position markers against the track length
	///
	/// `msec` is the track length in milliseconds; a negative value falls back
	/// to the record's own `length` field.
	///
	/// The rules, in order:
	///
	/// * A negative start marker becomes `0`; a negative or overlong end marker
	///   becomes the track length; an inverted start/end pair is reset to the
	///   full track.
	/// * A talk or segue pair equal to the start/end pair collapses to unset.
	/// * An invalid talk/segue/hook pair (either side unset, or inverted)
	///   becomes unset; otherwise the pair's end is clamped to the end marker,
	///   and the pair is unset entirely when its start lies past the end marker.
	/// * Fade points past the end marker are clamped to it.
	///
	/// Returns `true` when anything was modified. A second call over the same
	/// record is always a no-op.
	pub fn validate_markers(&mut self, msec: i64) -> bool {
		let len = if msec < 0 { self.length } else { msec };
		let mut modified = false;

		// Start/end markers
		if self.start_pos < 0 {
			self.start_pos = 0;
			modified = true;
		}
		if self.end_pos < 0 || self.end_pos > len {
			self.end_pos = len;
			modified = true;
		}
		if self.start_pos > self.end_pos {
			self.start_pos = 0;
			self.end_pos = len;
			modified = true;
		}

		let (talk, m) = Self::validate_pair(
			(self.talk_start_pos, self.talk_end_pos),
			(self.start_pos, self.end_pos),
			true,
		);
		(self.talk_start_pos, self.talk_end_pos) = talk;
		modified |= m;

		let (segue, m) = Self::validate_pair(
			(self.segue_start_pos, self.segue_end_pos),
			(self.start_pos, self.end_pos),
			true,
		);
		(self.segue_start_pos, self.segue_end_pos) = segue;
		modified |= m;

		let (hook, m) = Self::validate_pair(
			(self.hook_start_pos, self.hook_end_pos),
			(self.start_pos, self.end_pos),
			false,
		);
		(self.hook_start_pos, self.hook_end_pos) = hook;
		modified |= m;

		if self.fade_up_pos >= 0 && self.fade_up_pos > self.end_pos {
			self.fade_up_pos = self.end_pos;
			modified = true;
		}
		if self.fade_down_pos >= 0 && self.fade_down_pos > self.end_pos {
			self.fade_down_pos = self.end_pos;
			modified = true;
		}

		modified
	}

	fn validate_pair(
		(mut start, mut end): (i64, i64),
		(track_start, track_end): (i64, i64),
		collapse: bool,
	) -> ((i64, i64), bool) {
		let original = (start, end);

		if collapse && start == track_start && end == track_end {
			return ((MARKER_UNSET, MARKER_UNSET), true);
		}

		if start < 0 || end < 0 || start > end {
			start = MARKER_UNSET;
			end = MARKER_UNSET;
		} else {
			if end > track_end {
				end = track_end;
			}
			if start > track_end {
				start = MARKER_UNSET;
				end = MARKER_UNSET;
			}
		}

		((start, end), (start, end) != original)
	}

	/// Normalizes the airing window date-times
	///
	/// A window whose start lies at or after its end is treated as "no
	/// restriction": all four date/time fields are cleared and `true` is
	/// returned. A window with start before end is left untouched, and a
	/// window that was never set is ignored; both return `false`.
	///
	/// The polarity here is counter-intuitive but deliberate; downstream
	/// scheduling logic depends on it.
	pub fn validate_date_times(&mut self) -> bool {
		let (Some(start), Some(end)) = (self.start_date_time(), self.end_date_time()) else {
			return false;
		};

		if start < end {
			return false;
		}

		self.start_date = None;
		self.start_time = None;
		self.end_date = None;
		self.end_time = None;
		true
	}
}
