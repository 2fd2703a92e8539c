//! The container handle

use crate::aiff;
use crate::atx;
use crate::chunks::bext::BextChunk;
use crate::chunks::cart::CartChunk;
use crate::chunks::fmt::{
	FormatChunk, WAVE_FORMAT_MPEG, WAVE_FORMAT_PCM, WAVE_FORMAT_VORBIS,
};
use crate::chunks::levl::LevlChunk;
use crate::chunks::mext::MextChunk;
use crate::config::ParseOptions;
use crate::data::CartData;
use crate::energy::{self, EnergyAnalyzer, EnergyMode};
use crate::error::Result;
use crate::flac;
use crate::m4a::{self, Mp4Decoder};
use crate::macros::err;
use crate::mpeg;
use crate::ogg::{self, OggWriter, VorbisEncoder};
use crate::probe::{self, FileType};
use crate::tmc;
use crate::wave;
use crate::wave::{WaveFinal, WaveOutline};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// The audio parameters of an opened stream, format-agnostic
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StreamInfo {
	pub format_tag: u16,
	/// Whether the parameters above came from real format information rather
	/// than defaults
	pub format_chunk: bool,
	pub channels: u16,
	pub samples_per_sec: u32,
	pub avg_bytes_per_sec: u32,
	pub block_align: u16,
	pub bits_per_sample: u16,
	pub head_layer: u16,
	pub head_bit_rate: u32,
	pub head_mode: u16,
	pub head_flags: u16,
	/// Nominal MPEG frame size, `144·bitrate/rate`
	pub mpeg_frame_size: u32,
	/// Total samples per channel
	pub sample_length: u64,
	/// Track length in milliseconds
	pub ext_time_length: i64,
	/// Absolute file offset of the first payload byte
	pub data_start: u64,
	/// Payload length in bytes
	pub data_length: u64,
}

/// The stream layout to record with
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RecordFormat {
	/// Linear PCM inside RIFF/WAVE
	Pcm {
		channels: u16,
		samples_per_sec: u32,
		bits_per_sample: u16,
	},
	/// MPEG audio inside RIFF/WAVE
	Mpeg {
		channels: u16,
		samples_per_sec: u32,
		layer: u16,
		bit_rate: u32,
		/// ACM mode word
		mode: u16,
	},
	/// Ogg Vorbis, requiring a [`VorbisEncoder`] on the handle
	Vorbis {
		channels: u16,
		samples_per_sec: u32,
		quality: f32,
		/// Bitstream serial number, generated when `None`
		serial: Option<u32>,
	},
}

/// A handle on one audio file
///
/// The handle is reusable: [`close`](CartFile::close) returns it to its
/// initial state, keeping the path and any injected capabilities.
pub struct CartFile {
	path: PathBuf,
	options: ParseOptions,
	mp4_decoder: Option<Box<dyn Mp4Decoder>>,
	vorbis_encoder: Option<Box<dyn VorbisEncoder>>,

	file: Option<File>,
	file_type: Option<FileType>,
	info: StreamInfo,
	fmt: Option<FormatChunk>,

	cart: Option<CartChunk>,
	bext: Option<BextChunk>,
	mext: Option<MextChunk>,
	levl: Option<LevlChunk>,
	rdxl: Option<String>,

	// Recording state
	recordable: bool,
	cart_enabled: bool,
	bext_enabled: bool,
	mext_enabled: bool,
	levl_enabled: bool,
	data: CartData,
	ptr_offset_msecs: i64,
	analyzer: Option<EnergyAnalyzer>,
	ogg_writer: Option<OggWriter>,

	energy: Option<Vec<u16>>,
	normalize_level: f64,
}

impl CartFile {
	/// Creates an unopened handle on `path`
	#[must_use]
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			options: ParseOptions::new(),
			mp4_decoder: None,
			vorbis_encoder: None,
			file: None,
			file_type: None,
			info: StreamInfo::default(),
			fmt: None,
			cart: None,
			bext: None,
			mext: None,
			levl: None,
			rdxl: None,
			recordable: false,
			cart_enabled: false,
			bext_enabled: false,
			mext_enabled: false,
			levl_enabled: false,
			data: CartData::new(),
			ptr_offset_msecs: 0,
			analyzer: None,
			ogg_writer: None,
			energy: None,
			normalize_level: 1.0,
		}
	}

	/// Sets the parse options used by [`open`](CartFile::open)
	#[must_use]
	pub fn parse_options(mut self, options: ParseOptions) -> Self {
		self.options = options;
		self
	}

	/// Attaches an MPEG-4 decoder, enabling M4A files
	#[must_use]
	pub fn mp4_decoder(mut self, decoder: Box<dyn Mp4Decoder>) -> Self {
		self.mp4_decoder = Some(decoder);
		self
	}

	/// Attaches a Vorbis encoder, enabling Ogg recording
	#[must_use]
	pub fn vorbis_encoder(mut self, encoder: Box<dyn VorbisEncoder>) -> Self {
		self.vorbis_encoder = Some(encoder);
		self
	}

	/// Opens the file for reading, detecting its container type
	///
	/// Metadata found in the file is projected onto `data` when one is
	/// passed, and its markers are normalized against the track length.
	pub fn open(&mut self, data: Option<&mut CartData>) -> Result<()> {
		let mut file = File::open(&self.path)?;
		let file_len = file.metadata()?.len();

		let mut scratch = CartData::new();
		let data = data.unwrap_or(&mut scratch);

		match probe::detect(&mut file)? {
			Some(detection) => match detection.file_type {
				FileType::Wave => {
					let contents = wave::open(&mut file, file_len, data, self.options)?;
					self.file_type = Some(contents.file_type);
					self.info = contents.info;
					self.cart = contents.cart;
					self.bext = contents.bext;
					self.mext = contents.mext;
					self.levl = contents.levl;
					self.rdxl = contents.rdxl;
				},
				FileType::Aiff => {
					self.info = aiff::open(&mut file, file_len)?;
					self.file_type = Some(FileType::Aiff);
				},
				FileType::Flac => {
					if self.options.read_metadata {
						mpeg::read_id3_metadata(&self.path, data);
					}
					self.info = flac::open(&mut file, data, self.options.read_metadata)?;
					self.file_type = Some(FileType::Flac);
				},
				FileType::Atx => {
					self.info = atx::open(&mut file, file_len)?;
					self.file_type = Some(FileType::Atx);
				},
				FileType::Tmc => {
					if self.options.read_metadata {
						self.info = tmc::open(&mut file, data)?;
					} else {
						self.info = tmc::open(&mut file, &mut CartData::new())?;
					}
					self.file_type = Some(FileType::Tmc);
				},
				FileType::Ogg => {
					self.info = ogg::open(&mut file)?;
					self.normalize_level = ogg::normalize_level(&self.path);
					self.file_type = Some(FileType::Ogg);
				},
				FileType::Mpeg => {
					self.info = mpeg::open(&mut file, &detection, file_len)?;
					if self.options.read_metadata {
						mpeg::read_id3_metadata(&self.path, data);
					}
					self.file_type = Some(FileType::Mpeg);
				},
				_ => err!(UnknownFormat),
			},
			None => {
				// MPEG-4 carries no stable leading signature the cheap probes
				// can own, and needs the decoder capability anyway
				if self.mp4_decoder.is_some() && m4a::is_m4a(&mut file)? {
					self.info = m4a::open(&mut file, data, self.options.read_metadata)?;
					self.file_type = Some(FileType::M4a);
				} else {
					err!(UnknownFormat);
				}
			},
		}

		file.seek(SeekFrom::Start(self.info.data_start))?;
		self.file = Some(file);
		data.validate_markers(self.info.ext_time_length);
		Ok(())
	}

	/// Creates the file for recording
	///
	/// `data` seeds the metadata chunks written at create time and rewritten
	/// on [`close`](CartFile::close); `ptr_offset_msecs` is subtracted from
	/// every marker when projecting them into the cart chunk.
	pub fn create(
		&mut self,
		data: &CartData,
		format: RecordFormat,
		ptr_offset_msecs: i64,
	) -> Result<()> {
		self.data = data.clone();
		self.ptr_offset_msecs = ptr_offset_msecs;

		match format {
			RecordFormat::Pcm {
				channels,
				samples_per_sec,
				bits_per_sample,
			} => {
				let fmt = FormatChunk::for_pcm(channels, samples_per_sec, bits_per_sample)?;
				self.create_riff(fmt)?;
			},
			RecordFormat::Mpeg {
				channels,
				samples_per_sec,
				layer,
				bit_rate,
				mode,
			} => {
				let padding_used = !matches!(samples_per_sec, 11_025 | 22_050 | 44_100);
				let fmt = FormatChunk::for_mpeg(
					channels,
					samples_per_sec,
					layer,
					bit_rate,
					mode,
					0,
					padding_used,
				)?;
				self.create_riff(fmt)?;
			},
			RecordFormat::Vorbis {
				channels,
				samples_per_sec,
				quality,
				serial,
			} => {
				let Some(encoder) = self.vorbis_encoder.take() else {
					err!(Unsupported("Ogg Vorbis encoding"));
				};

				let mut file = writable_file(&self.path)?;
				let writer = OggWriter::start(
					&mut file,
					encoder,
					channels,
					samples_per_sec,
					quality,
					serial,
				)?;

				self.info = StreamInfo {
					format_tag: WAVE_FORMAT_VORBIS,
					format_chunk: true,
					channels,
					samples_per_sec,
					avg_bytes_per_sec: 2 * u32::from(channels) * samples_per_sec,
					block_align: 2 * channels,
					bits_per_sample: 16,
					..StreamInfo::default()
				};
				self.file_type = Some(FileType::Ogg);
				self.ogg_writer = Some(writer);
				self.file = Some(file);
				self.recordable = true;
			},
		}

		Ok(())
	}

	fn create_riff(&mut self, fmt: FormatChunk) -> Result<()> {
		if self.mext_enabled && fmt.format_tag == WAVE_FORMAT_MPEG && self.mext.is_none() {
			self.mext = Some(MextChunk {
				homogenous: true,
				padding_used: !matches!(fmt.samples_per_sec, 11_025 | 22_050 | 44_100),
				rate_hacked: false,
				free_format: false,
				frame_size: fmt.block_align,
				anc_length: 5,
				left_energy: true,
				ancillary_private: false,
				right_energy: fmt.channels == 2,
			});
		}

		if self.levl_enabled {
			self.analyzer = match (fmt.format_tag, fmt.bits_per_sample, fmt.head_layer) {
				(WAVE_FORMAT_PCM, 16, _) => {
					Some(EnergyAnalyzer::new(EnergyMode::Pcm16, fmt.channels))
				},
				(WAVE_FORMAT_PCM, 24, _) => {
					Some(EnergyAnalyzer::new(EnergyMode::Pcm24, fmt.channels))
				},
				(WAVE_FORMAT_MPEG, _, 2) => Some(EnergyAnalyzer::new(
					EnergyMode::MpegLayer2 {
						block_align: fmt.block_align,
					},
					fmt.channels,
				)),
				_ => None,
			};
		}

		let cart = self.cart_enabled.then(|| self.build_cart(&fmt));
		let bext = self.bext_enabled.then(|| self.build_bext());

		let mut file = writable_file(&self.path)?;
		// Any stale normalization sidecar no longer describes this file
		let mut sidecar = self.path.as_os_str().to_os_string();
		sidecar.push(".energy");
		let _ = std::fs::remove_file(sidecar);

		let data_start = wave::create(
			&mut file,
			&WaveOutline {
				fmt: &fmt,
				cart: cart.as_ref(),
				bext: bext.as_ref(),
				mext: self.mext.as_ref(),
				rdxl: self.rdxl.as_deref(),
			},
		)?;

		self.info = StreamInfo {
			format_tag: fmt.format_tag,
			format_chunk: true,
			channels: fmt.channels,
			samples_per_sec: fmt.samples_per_sec,
			avg_bytes_per_sec: fmt.avg_bytes_per_sec,
			block_align: fmt.block_align,
			bits_per_sample: fmt.bits_per_sample,
			head_layer: fmt.head_layer,
			head_bit_rate: fmt.head_bit_rate,
			head_mode: fmt.head_mode,
			head_flags: fmt.head_flags,
			data_start,
			data_length: 0,
			..StreamInfo::default()
		};
		self.fmt = Some(fmt);
		self.cart = cart;
		self.bext = bext;
		self.file_type = Some(FileType::Wave);
		self.file = Some(file);
		self.recordable = true;
		Ok(())
	}

	fn build_cart(&self, fmt: &FormatChunk) -> CartChunk {
		CartChunk::from_data(
			&self.data,
			fmt.level_reference(),
			fmt.samples_per_sec,
			self.ptr_offset_msecs,
		)
	}

	fn build_bext(&self) -> BextChunk {
		let mut bext = self.bext.clone().unwrap_or_default();
		bext.description = self.data.description.clone();
		if bext.origination_date.is_none() {
			let now = Local::now().naive_local();
			bext.origination_date = Some(now.date());
			bext.origination_time = Some(now.time());
		}
		bext
	}

	/// Appends payload bytes to a recording, tracking peak energy
	pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
		if !self.recordable {
			err!(NotWritable);
		}

		if let Some(writer) = &mut self.ogg_writer {
			let file = self.file.as_mut().expect("recordable handle owns a file");
			writer.write(file, buf)?;
			return Ok(buf.len());
		}

		if let Some(analyzer) = &mut self.analyzer {
			analyzer.feed(buf);
		}

		let file = self.file.as_mut().expect("recordable handle owns a file");
		file.seek(SeekFrom::End(0))?;
		file.write_all(buf)?;
		self.info.data_length += buf.len() as u64;
		Ok(buf.len())
	}

	/// Reads raw payload bytes, stopping at the payload's end
	///
	/// Compressed containers whose payload is not byte-addressable (Ogg
	/// Vorbis, MPEG-4) cannot be read this way.
	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		if matches!(self.file_type, Some(FileType::Ogg | FileType::M4a)) {
			err!(Unsupported("raw payload access"));
		}
		let Some(file) = self.file.as_mut() else {
			return Ok(0);
		};

		let pos = file.stream_position()?;
		let end = self.info.data_start + self.info.data_length;
		if pos >= end {
			return Ok(0);
		}

		let want = usize::try_from(end - pos)
			.unwrap_or(usize::MAX)
			.min(buf.len());
		let mut filled = 0;
		while filled < want {
			let n = file.read(&mut buf[filled..want])?;
			if n == 0 {
				break;
			}
			filled += n;
		}
		Ok(filled)
	}

	/// Seeks to a payload-relative byte offset, clamped to the payload
	///
	/// Returns the resulting payload-relative position.
	pub fn seek(&mut self, offset: i64) -> Result<u64> {
		let Some(file) = self.file.as_mut() else {
			return Ok(0);
		};

		let offset = offset.max(0) as u64;
		let offset = offset.min(self.info.data_length);
		let pos = file.seek(SeekFrom::Start(self.info.data_start + offset))?;
		Ok(pos - self.info.data_start)
	}

	/// Finalizes the file and returns the handle to its initial state
	///
	/// `samples` overrides the sample count written to the fact chunk; when
	/// `None` it is recomputed from the payload geometry.
	pub fn close(&mut self, samples: Option<u32>) -> Result<()> {
		if self.recordable {
			if let Some(mut writer) = self.ogg_writer.take() {
				let file = self.file.as_mut().expect("recordable handle owns a file");
				writer.finish(file)?;
			} else if let Some(fmt) = self.fmt.take() {
				let levl = match self.analyzer.take() {
					Some(analyzer) if self.levl_enabled => Some(LevlChunk::new(
						u32::from(fmt.channels),
						analyzer.into_peaks(),
						Some(Local::now().naive_local()),
					)),
					_ => None,
				};
				let cart = self.cart_enabled.then(|| self.build_cart(&fmt));
				let bext = self.bext_enabled.then(|| self.build_bext());

				let file = self.file.as_mut().expect("recordable handle owns a file");
				wave::close(
					file,
					&WaveFinal {
						fmt: &fmt,
						data_length: self.info.data_length,
						samples,
						levl: levl.as_ref(),
						cart: cart.as_ref(),
						bext: bext.as_ref(),
						mext: self.mext.as_ref(),
					},
				)?;
			}
		}

		self.reset();
		Ok(())
	}

	// Everything except the path, the parse options, and the injected
	// capabilities starts over
	fn reset(&mut self) {
		let path = std::mem::take(&mut self.path);
		let options = self.options;
		let mp4_decoder = self.mp4_decoder.take();
		let vorbis_encoder = self.vorbis_encoder.take();

		*self = Self::new(path);
		self.options = options;
		self.mp4_decoder = mp4_decoder;
		self.vorbis_encoder = vorbis_encoder;
	}

	/// Enables writing a cart chunk when recording
	pub fn enable_cart_chunk(&mut self, enabled: bool) {
		self.cart_enabled = enabled;
	}

	/// Enables writing a bext chunk when recording
	pub fn enable_bext_chunk(&mut self, enabled: bool) {
		self.bext_enabled = enabled;
	}

	/// Enables writing a mext chunk when recording an MPEG stream
	///
	/// A default chunk is synthesized from the stream parameters unless one
	/// is supplied with [`set_mext_chunk`](CartFile::set_mext_chunk).
	pub fn enable_mext_chunk(&mut self, enabled: bool) {
		self.mext_enabled = enabled;
	}

	/// Supplies the exact mext chunk to write
	pub fn set_mext_chunk(&mut self, mext: MextChunk) {
		self.mext = Some(mext);
		self.mext_enabled = true;
	}

	/// Supplies bext fields beyond what the metadata record carries
	pub fn set_bext_chunk(&mut self, bext: BextChunk) {
		self.bext = Some(bext);
		self.bext_enabled = true;
	}

	/// Enables the peak table chunk when recording PCM or MPEG Layer II
	pub fn enable_levl_chunk(&mut self, enabled: bool) {
		self.levl_enabled = enabled;
	}

	/// Sets the XML sidecar chunk contents written when recording
	pub fn set_rdxl_contents(&mut self, contents: impl Into<String>) {
		self.rdxl = Some(contents.into());
	}

	/// The detected container type, once opened
	pub fn file_type(&self) -> Option<FileType> {
		self.file_type
	}

	/// Whether the handle was opened with [`create`](CartFile::create)
	pub fn recordable(&self) -> bool {
		self.recordable
	}

	/// The playback normalization gain read from the `.energy` sidecar
	pub fn normalize_level(&self) -> f64 {
		self.normalize_level
	}

	/// The wave format tag (PCM 0x0001, MPEG 0x0050, or a handle-internal
	/// tag for the non-RIFF containers)
	pub fn format_tag(&self) -> u16 {
		self.info.format_tag
	}

	/// Channel count
	pub fn channels(&self) -> u16 {
		self.info.channels
	}

	/// Sample rate in Hz
	pub fn samples_per_sec(&self) -> u32 {
		self.info.samples_per_sec
	}

	/// Average payload byte rate
	pub fn avg_bytes_per_sec(&self) -> u32 {
		self.info.avg_bytes_per_sec
	}

	/// Bytes per sample frame (PCM) or per MPEG frame
	pub fn block_align(&self) -> u16 {
		self.info.block_align
	}

	/// Bits per sample, `0` for compressed formats
	pub fn bits_per_sample(&self) -> u16 {
		self.info.bits_per_sample
	}

	/// MPEG layer number, `0` for non-MPEG streams
	pub fn head_layer(&self) -> u16 {
		self.info.head_layer
	}

	/// MPEG bit rate in bits per second
	pub fn head_bit_rate(&self) -> u32 {
		self.info.head_bit_rate
	}

	/// ACM MPEG mode word
	pub fn head_mode(&self) -> u16 {
		self.info.head_mode
	}

	/// ACM MPEG flag word
	pub fn head_flags(&self) -> u16 {
		self.info.head_flags
	}

	/// Total samples per channel
	pub fn sample_length(&self) -> u64 {
		self.info.sample_length
	}

	/// Track length in milliseconds
	pub fn ext_time_length(&self) -> i64 {
		self.info.ext_time_length
	}

	/// Absolute file offset of the first payload byte
	pub fn data_start(&self) -> u64 {
		self.info.data_start
	}

	/// Payload length in bytes
	pub fn data_length(&self) -> u64 {
		self.info.data_length
	}

	/// The cart chunk, when the file carried one
	pub fn cart_chunk(&self) -> Option<&CartChunk> {
		self.cart.as_ref()
	}

	/// The bext chunk, when the file carried one
	pub fn bext_chunk(&self) -> Option<&BextChunk> {
		self.bext.as_ref()
	}

	/// The mext chunk, when the file carried one
	pub fn mext_chunk(&self) -> Option<&MextChunk> {
		self.mext.as_ref()
	}

	/// The peak table chunk, when the file carried one and peak loading was
	/// enabled
	pub fn levl_chunk(&self) -> Option<&LevlChunk> {
		self.levl.as_ref()
	}

	/// The XML sidecar chunk contents, when the file carried one
	pub fn rdxl_contents(&self) -> Option<&str> {
		self.rdxl.as_deref()
	}

	/// Whether a peak table is available, loading one if necessary
	pub fn has_energy(&mut self) -> bool {
		self.load_energy().is_some_and(|peaks| !peaks.is_empty())
	}

	/// The number of peak entries available
	pub fn energy_size(&mut self) -> usize {
		self.load_energy().map_or(0, <[u16]>::len)
	}

	/// One peak entry, `0` when out of range
	pub fn energy(&mut self, frame: usize) -> u16 {
		self.load_energy()
			.and_then(|peaks| peaks.get(frame).copied())
			.unwrap_or(0)
	}

	/// The first sample louder than `level` (hundredths of a dB below full
	/// scale), `-1` when the whole file is quieter
	pub fn start_trim(&mut self, level: i32) -> i64 {
		let channels = self.info.channels;
		self.load_energy()
			.map_or(-1, |peaks| energy::start_trim(peaks, channels, level))
	}

	/// The last sample louder than `level`, `-1` when the whole file is
	/// quieter
	pub fn end_trim(&mut self, level: i32) -> i64 {
		let channels = self.info.channels;
		self.load_energy()
			.map_or(-1, |peaks| energy::end_trim(peaks, channels, level))
	}

	fn load_energy(&mut self) -> Option<&[u16]> {
		if self.energy.is_none() {
			// A stored peak table beats rescanning the payload
			if let Some(levl) = &self.levl {
				self.energy = Some(levl.peaks.clone());
			} else {
				let file = self.file.as_mut()?;
				let resume = file.stream_position().ok()?;

				let (left, right) = self
					.mext
					.as_ref()
					.map_or((false, false), |mext| (mext.left_energy, mext.right_energy));
				match energy::load_energy(file, &self.info, left, right) {
					Ok(Some(peaks)) => self.energy = Some(peaks),
					Ok(None) => self.energy = Some(Vec::new()),
					Err(err) => {
						log::warn!("Unable to scan for peak energy: {err}");
						self.energy = Some(Vec::new());
					},
				}
				let _ = file.seek(SeekFrom::Start(resume));
			}
		}

		self.energy.as_deref()
	}
}

fn writable_file(path: &Path) -> Result<File> {
	let mut options = OpenOptions::new();
	options.read(true).write(true).create(true).truncate(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		// Group-writable, matching multi-user audio stores
		options.mode(0o664);
	}
	Ok(options.open(path)?)
}
