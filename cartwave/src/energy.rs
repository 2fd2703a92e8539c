//! Per-block peak energy
//!
//! Energy values are raw 16-bit sample magnitudes, one per channel per
//! 1152-sample block. They are gathered incrementally while recording and
//! can be recovered from an existing file after the fact, either from the
//! MPEG frames' embedded scale factors or by scanning the PCM payload.

use crate::chunks::fmt::{WAVE_FORMAT_MPEG, WAVE_FORMAT_PCM};
use crate::error::Result;
use crate::file::StreamInfo;

use std::io::{Read, Seek, SeekFrom};

pub(crate) const ENERGY_BLOCK_SIZE: u32 = 1152;

/// What the analyzer is being fed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EnergyMode {
	Pcm16,
	Pcm24,
	/// MPEG Layer II, with the frame's byte length
	MpegLayer2 { block_align: u16 },
}

/// Tracks per-block peaks over a stream of payload bytes
///
/// The byte-level state machines mirror the on-disk layouts exactly, so the
/// analyzer can be fed arbitrary slices of the payload as they are written.
pub(crate) struct EnergyAnalyzer {
	mode: EnergyMode,
	channels: usize,
	energy: Vec<u16>,
	state: u8,
	accum: u16,
	block_ptr: u32,
}

impl EnergyAnalyzer {
	pub(crate) fn new(mode: EnergyMode, channels: u16) -> Self {
		Self {
			mode,
			channels: usize::from(channels),
			energy: vec![0; usize::from(channels)],
			state: 0,
			accum: 0,
			block_ptr: 0,
		}
	}

	pub(crate) fn feed(&mut self, buf: &[u8]) {
		match self.mode {
			EnergyMode::Pcm16 => self.feed_pcm16(buf),
			EnergyMode::Pcm24 => self.feed_pcm24(buf),
			EnergyMode::MpegLayer2 { block_align } => self.feed_mpeg(buf, u32::from(block_align)),
		}
	}

	pub(crate) fn peaks(&self) -> &[u16] {
		&self.energy
	}

	/// Consumes the analyzer, keeping only the completed blocks
	///
	/// The trailing open accumulator slot never represents a full 1152-sample
	/// frame and is dropped, so a finalized table holds exactly one entry per
	/// channel per completed block.
	pub(crate) fn into_peaks(mut self) -> Vec<u16> {
		self.energy.truncate(self.energy.len() - self.channels);
		self.energy
	}

	fn feed_pcm16(&mut self, buf: &[u8]) {
		for &b in buf {
			match self.state {
				0 => {
					self.accum = u16::from(b);
					self.state = 1;
				},
				1 => {
					self.accum |= u16::from(b) << 8;
					if self.channels == 1 {
						self.left_peak();
						self.block_tick();
						self.state = 0;
					} else {
						self.left_peak();
						self.state = 2;
					}
				},
				2 => {
					self.accum = u16::from(b);
					self.state = 3;
				},
				_ => {
					self.accum |= u16::from(b) << 8;
					self.right_peak();
					self.block_tick();
					self.state = 0;
				},
			}
		}
	}

	fn feed_pcm24(&mut self, buf: &[u8]) {
		// The least significant byte of each sample never figures into the
		// peak
		for &b in buf {
			match self.state {
				0 => self.state = 1,
				1 => {
					self.accum = u16::from(b);
					self.state = 2;
				},
				2 => {
					self.accum |= u16::from(b) << 8;
					if self.channels == 1 {
						self.left_peak();
						self.block_tick();
						self.state = 0;
					} else {
						self.left_peak();
						self.state = 3;
					}
				},
				3 => self.state = 4,
				4 => {
					self.accum = u16::from(b);
					self.state = 5;
				},
				_ => {
					self.accum |= u16::from(b) << 8;
					self.right_peak();
					self.block_tick();
					self.state = 0;
				},
			}
		}
	}

	// Layer II frames end in the scale factors, big-endian, right channel
	// first
	fn feed_mpeg(&mut self, buf: &[u8], block_align: u32) {
		for &b in buf {
			if self.block_ptr == block_align - 5 {
				if self.channels == 2 {
					self.accum = u16::from(b) << 8;
				}
				self.block_ptr += 1;
			} else if self.block_ptr == block_align - 4 {
				if self.channels == 2 {
					self.accum |= u16::from(b);
					let last = self.energy.len() - 1;
					self.energy[last] = self.accum;
				}
				self.block_ptr += 1;
			} else if self.block_ptr == block_align - 2 {
				self.accum = u16::from(b) << 8;
				self.block_ptr += 1;
			} else if self.block_ptr == block_align - 1 {
				self.accum |= u16::from(b);
				let left = self.energy.len() - self.channels;
				self.energy[left] = self.accum;
				self.energy.extend(std::iter::repeat_n(0, self.channels));
				self.block_ptr = 0;
			} else {
				self.block_ptr += 1;
			}
		}
	}

	fn left_peak(&mut self) {
		let idx = self.energy.len() - self.channels;
		if self.accum > self.energy[idx] {
			self.energy[idx] = self.accum;
		}
	}

	fn right_peak(&mut self) {
		let idx = self.energy.len() - 1;
		if self.accum > self.energy[idx] {
			self.energy[idx] = self.accum;
		}
	}

	fn block_tick(&mut self) {
		self.block_ptr += 1;
		if self.block_ptr == ENERGY_BLOCK_SIZE {
			self.energy.extend(std::iter::repeat_n(0, self.channels));
			self.block_ptr = 0;
		}
	}
}

/// Recovers the peak table from an existing file's payload
///
/// Returns `None` for formats that cannot provide energy (MPEG layers other
/// than II, Layer II without embedded scale factors, compressed containers).
/// A short read ends the table early rather than failing; partial energy is
/// still useful for trimming.
pub(crate) fn load_energy<R>(
	reader: &mut R,
	info: &StreamInfo,
	left_energy: bool,
	right_energy: bool,
) -> Result<Option<Vec<u16>>>
where
	R: Read + Seek,
{
	let channels = usize::from(info.channels);
	if channels == 0 {
		return Ok(None);
	}
	let energy_size = (info.sample_length as usize * channels) / ENERGY_BLOCK_SIZE as usize;

	reader.seek(SeekFrom::Start(info.data_start))?;

	match info.format_tag {
		WAVE_FORMAT_MPEG => {
			if info.head_layer != 2 || !(left_energy || right_energy) {
				return Ok(None);
			}

			let mut energy = Vec::with_capacity(energy_size);
			let mut block = [0; 5];
			while energy.len() < energy_size {
				reader.seek(SeekFrom::Current(i64::from(info.block_align) - 5))?;
				if reader.read(&mut block)? < 5 {
					break;
				}
				if left_energy {
					energy.push(u16::from(block[4]) | u16::from(block[3]) << 8);
				}
				if right_energy {
					energy.push(u16::from(block[1]) | u16::from(block[0]) << 8);
				}
			}
			Ok(Some(energy))
		},
		WAVE_FORMAT_PCM if info.bits_per_sample == 16 || info.bits_per_sample == 24 => {
			let bytes_per_sample = usize::from(info.bits_per_sample) / 8;
			let block_size = bytes_per_sample * ENERGY_BLOCK_SIZE as usize * channels;
			let mut pcm = vec![0; block_size];

			let mut energy = Vec::with_capacity(energy_size);
			'blocks: while energy.len() < energy_size {
				let mut filled = 0;
				while filled < block_size {
					let n = reader.read(&mut pcm[filled..])?;
					if n == 0 {
						break 'blocks;
					}
					filled += n;
				}

				for j in 0..channels {
					let mut peak = 0_u16;
					for k in 0..ENERGY_BLOCK_SIZE as usize {
						// The top two bytes of the sample
						let offset =
							bytes_per_sample * (k * channels + j) + bytes_per_sample - 2;
						let value = u16::from(pcm[offset]) | u16::from(pcm[offset + 1]) << 8;
						if value > peak {
							peak = value;
						}
					}
					energy.push(peak);
				}
			}
			Ok(Some(energy))
		},
		_ => Ok(None),
	}
}

fn trim_threshold(level: i32) -> f64 {
	10_f64.powf(-f64::from(level) / 2000.0) * 32_768.0
}

/// The first sample at or above `level` (hundredths of a dB below full
/// scale), or `-1` when the whole table is quieter
pub(crate) fn start_trim(peaks: &[u16], channels: u16, level: i32) -> i64 {
	let threshold = trim_threshold(level);
	for (i, &peak) in peaks.iter().enumerate() {
		if f64::from(peak) >= threshold {
			return (i as i64) * i64::from(ENERGY_BLOCK_SIZE) / i64::from(channels);
		}
	}
	-1
}

/// The last sample at or above `level`, or `-1` when the whole table is
/// quieter
pub(crate) fn end_trim(peaks: &[u16], channels: u16, level: i32) -> i64 {
	let threshold = trim_threshold(level);
	for (i, &peak) in peaks.iter().enumerate().rev() {
		if f64::from(peak) >= threshold {
			return (i as i64) * i64::from(ENERGY_BLOCK_SIZE) / i64::from(channels);
		}
	}
	-1
}

#[cfg(test)]
mod tests {
	use super::{EnergyAnalyzer, EnergyMode, end_trim, load_energy, start_trim};
	use crate::chunks::fmt::{WAVE_FORMAT_MPEG, WAVE_FORMAT_PCM};
	use crate::file::StreamInfo;

	use std::io::Cursor;

	fn pcm16_block(left: i16, right: i16) -> Vec<u8> {
		let mut block = Vec::new();
		for _ in 0..1152 {
			block.extend_from_slice(&left.to_le_bytes());
			block.extend_from_slice(&right.to_le_bytes());
		}
		block
	}

	#[test_log::test]
	fn pcm16_stereo_peaks() {
		let mut analyzer = EnergyAnalyzer::new(EnergyMode::Pcm16, 2);
		analyzer.feed(&pcm16_block(1000, 2000));
		analyzer.feed(&pcm16_block(3000, 50));

		// Two completed blocks plus the trailing open block
		assert_eq!(
			analyzer.peaks(),
			&[1000, 2000, 3000, 50, 0, 0]
		);
	}

	#[test_log::test]
	fn finalized_table_has_one_entry_per_completed_block() {
		let mut analyzer = EnergyAnalyzer::new(EnergyMode::Pcm16, 2);
		analyzer.feed(&pcm16_block(1000, 2000));
		analyzer.feed(&pcm16_block(3000, 50));
		assert_eq!(analyzer.into_peaks(), vec![1000, 2000, 3000, 50]);

		// Nothing fed, nothing kept
		let analyzer = EnergyAnalyzer::new(EnergyMode::Pcm16, 2);
		assert_eq!(analyzer.into_peaks(), Vec::<u16>::new());
	}

	#[test]
	fn pcm16_split_feeds_match_single_feed() {
		let block = pcm16_block(1234, 4321);

		let mut whole = EnergyAnalyzer::new(EnergyMode::Pcm16, 2);
		whole.feed(&block);

		let mut split = EnergyAnalyzer::new(EnergyMode::Pcm16, 2);
		for chunk in block.chunks(7) {
			split.feed(chunk);
		}

		assert_eq!(whole.peaks(), split.peaks());
	}

	#[test]
	fn pcm24_ignores_low_byte() {
		let mut analyzer = EnergyAnalyzer::new(EnergyMode::Pcm24, 1);
		let mut block = Vec::new();
		for _ in 0..1152 {
			block.extend_from_slice(&[0xFF, 0x34, 0x12]);
		}
		analyzer.feed(&block);
		assert_eq!(analyzer.peaks(), &[0x1234, 0]);
	}

	#[test_log::test]
	fn mpeg_scale_factors() {
		let block_align = 96_u16;
		let mut analyzer =
			EnergyAnalyzer::new(EnergyMode::MpegLayer2 { block_align }, 2);

		let mut frame = vec![0_u8; usize::from(block_align)];
		// Right channel at block_align-5, left at block_align-2, big-endian
		frame[91] = 0x11;
		frame[92] = 0x22;
		frame[94] = 0x33;
		frame[95] = 0x44;
		analyzer.feed(&frame);

		assert_eq!(analyzer.peaks(), &[0x3344, 0x1122, 0, 0]);
	}

	#[test_log::test]
	fn pcm16_energy_reload() {
		let mut payload = pcm16_block(1000, 2000);
		payload.extend_from_slice(&pcm16_block(3000, 50));

		let info = StreamInfo {
			format_tag: WAVE_FORMAT_PCM,
			channels: 2,
			bits_per_sample: 16,
			sample_length: 2304,
			data_start: 0,
			data_length: payload.len() as u64,
			..StreamInfo::default()
		};

		let energy = load_energy(&mut Cursor::new(payload), &info, false, false)
			.unwrap()
			.unwrap();
		assert_eq!(energy, vec![1000, 2000, 3000, 50]);
	}

	#[test]
	fn mpeg_energy_reload() {
		let block_align = 96_u16;
		let mut payload = vec![0_u8; usize::from(block_align) * 2];
		payload[91] = 0x11;
		payload[92] = 0x22;
		payload[94] = 0x33;
		payload[95] = 0x44;

		let info = StreamInfo {
			format_tag: WAVE_FORMAT_MPEG,
			channels: 2,
			block_align,
			head_layer: 2,
			sample_length: 1152,
			data_start: 0,
			data_length: payload.len() as u64,
			..StreamInfo::default()
		};

		let energy = load_energy(&mut Cursor::new(payload.clone()), &info, true, true)
			.unwrap()
			.unwrap();
		assert_eq!(energy, vec![0x3344, 0x1122]);

		// Layer III carries no usable scale factors
		let info = StreamInfo {
			head_layer: 3,
			..info
		};
		assert!(
			load_energy(&mut Cursor::new(payload), &info, true, true)
				.unwrap()
				.is_none()
		);
	}

	#[test]
	fn trims() {
		// -30 dB of full scale is about 1036
		let peaks = [0_u16, 40, 5000, 6000, 30, 2000, 10];
		assert_eq!(start_trim(&peaks, 2, 3000), 2 * 1152 / 2);
		assert_eq!(end_trim(&peaks, 2, 3000), 5 * 1152 / 2);
		assert_eq!(start_trim(&peaks, 2, 0), -1);
		assert_eq!(end_trim(&[0_u16; 4], 2, 3000), -1);
	}
}
