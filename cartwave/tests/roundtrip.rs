use cartwave::data::CartData;
use cartwave::file::{CartFile, RecordFormat};
use cartwave::probe::FileType;

use std::path::PathBuf;

fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
	dir.path().join(name)
}

// One 1152-frame stereo block of constant left/right amplitudes
fn stereo_block(left: i16, right: i16) -> Vec<u8> {
	let mut block = Vec::with_capacity(1152 * 4);
	for _ in 0..1152 {
		block.extend_from_slice(&left.to_le_bytes());
		block.extend_from_slice(&right.to_le_bytes());
	}
	block
}

#[test_log::test]
fn pcm_output_is_valid_wav() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "plain.wav");

	let mut samples = Vec::new();
	for i in 0..4410_i16 {
		samples.push(i.wrapping_mul(7));
	}

	let mut file = CartFile::new(&path);
	file.create(
		&CartData::new(),
		RecordFormat::Pcm {
			channels: 1,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();
	let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
	file.write(&bytes).unwrap();
	file.close(None).unwrap();

	let mut reader = hound::WavReader::open(&path).unwrap();
	let spec = reader.spec();
	assert_eq!(spec.channels, 1);
	assert_eq!(spec.sample_rate, 44_100);
	assert_eq!(spec.bits_per_sample, 16);
	assert_eq!(spec.sample_format, hound::SampleFormat::Int);

	let read_back: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
	assert_eq!(read_back, samples);
}

#[test_log::test]
fn cart_metadata_survives_a_recording() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "tagged.wav");

	let mut data = CartData::new();
	data.title = "Drive Time Sweeper".to_string();
	data.artist = "Imaging".to_string();
	data.cut_name = "CUT0042".to_string();
	data.out_cue = "...right now".to_string();
	data.start_pos = 0;
	data.end_pos = 3000;
	data.segue_start_pos = 2500;
	data.segue_end_pos = 3000;
	data.talk_start_pos = 0;
	data.talk_end_pos = 1200;

	let mut file = CartFile::new(&path);
	file.enable_cart_chunk(true);
	file.create(
		&data,
		RecordFormat::Pcm {
			channels: 2,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();
	// Three seconds of silence
	file.write(&vec![0_u8; 44_100 * 4 * 3]).unwrap();
	file.close(None).unwrap();

	let mut reread = CartData::new();
	let mut file = CartFile::new(&path);
	file.open(Some(&mut reread)).unwrap();

	assert_eq!(file.file_type(), Some(FileType::Wave));
	assert!(reread.metadata_found);
	assert_eq!(reread.title, "Drive Time Sweeper");
	assert_eq!(reread.artist, "Imaging");
	assert_eq!(reread.cut_name, "CUT0042");
	assert_eq!(reread.out_cue, "...right now");
	assert_eq!(reread.start_pos, 0);
	assert_eq!(reread.end_pos, 3000);
	assert_eq!(reread.segue_start_pos, 2500);
	assert_eq!(reread.segue_end_pos, 3000);
	assert_eq!(reread.talk_start_pos, 0);
	assert_eq!(reread.talk_end_pos, 1200);

	let cart = file.cart_chunk().unwrap();
	assert_eq!(cart.level_ref, 0x8000);
}

#[test_log::test]
fn peak_table_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "peaks.wav");

	let mut file = CartFile::new(&path);
	file.enable_levl_chunk(true);
	file.create(
		&CartData::new(),
		RecordFormat::Pcm {
			channels: 2,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();

	// Quiet, loud, loud, quiet: one amplitude per 1152-frame block
	for (left, right) in [(10, 5), (20_000, 18_000), (15_000, 30_000), (8, 3)] {
		file.write(&stereo_block(left, right)).unwrap();
	}
	file.close(None).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert!(file.has_energy());
	// One peak per channel per 1152-frame block, nothing extra
	assert_eq!(file.energy_size(), 8);
	assert_eq!(file.energy(0), 10);
	assert_eq!(file.energy(1), 5);
	assert_eq!(file.energy(2), 20_000);
	assert_eq!(file.energy(3), 18_000);
	assert_eq!(file.energy(4), 15_000);
	assert_eq!(file.energy(5), 30_000);
	assert_eq!(file.energy(20), 0);

	// -10 dB threshold lands between the quiet and loud blocks
	assert_eq!(file.start_trim(1000), 1152);
	// The last peak over the threshold is the right channel of the third block
	assert_eq!(file.end_trim(1000), 5 * 1152 / 2);
}

#[test_log::test]
fn mono_peak_table_matches_written_blocks() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "mono.wav");

	let mut file = CartFile::new(&path);
	file.enable_levl_chunk(true);
	file.create(
		&CartData::new(),
		RecordFormat::Pcm {
			channels: 1,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();

	let amplitudes: [i16; 4] = [100, 9000, 500, 7];
	for amplitude in amplitudes {
		let mut block = Vec::with_capacity(1152 * 2);
		for _ in 0..1152 {
			block.extend_from_slice(&amplitude.to_le_bytes());
		}
		file.write(&block).unwrap();
	}
	file.close(None).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert_eq!(file.energy_size(), 4);
	for (frame, amplitude) in amplitudes.iter().enumerate() {
		assert_eq!(file.energy(frame), *amplitude as u16);
	}
}

#[test_log::test]
fn energy_rescanned_without_a_peak_table() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "rescan.wav");

	let mut file = CartFile::new(&path);
	file.create(
		&CartData::new(),
		RecordFormat::Pcm {
			channels: 2,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();
	for (left, right) in [(100, 200), (3000, 4000)] {
		file.write(&stereo_block(left, right)).unwrap();
	}
	file.close(None).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert!(file.levl_chunk().is_none());
	// The payload scan finds the same peaks the writer would have stored
	assert_eq!(file.energy_size(), 4);
	assert_eq!(file.energy(0), 100);
	assert_eq!(file.energy(1), 200);
	assert_eq!(file.energy(2), 3000);
	assert_eq!(file.energy(3), 4000);
}

#[test_log::test]
fn mpeg_riff_fact_chunk() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "layer2.wav");

	let mut file = CartFile::new(&path);
	file.enable_cart_chunk(true);
	file.enable_mext_chunk(true);
	file.create(
		&CartData::new(),
		RecordFormat::Mpeg {
			channels: 2,
			samples_per_sec: 44_100,
			layer: 2,
			bit_rate: 256_000,
			mode: cartwave::chunks::fmt::ACM_MPEG_STEREO,
		},
		0,
	)
	.unwrap();
	assert_eq!(file.block_align(), 835);

	// Six frames of silence-shaped payload
	file.write(&vec![0_u8; 835 * 6]).unwrap();
	file.close(None).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert_eq!(file.file_type(), Some(FileType::Wave));
	assert_eq!(file.head_layer(), 2);
	assert_eq!(file.head_bit_rate(), 256_000);
	assert_eq!(file.sample_length(), 1152 * 6);
	assert_eq!(file.ext_time_length(), 1000 * 1152 * 6 / 44_100);

	let mext = file.mext_chunk().unwrap();
	assert!(mext.homogenous);
	assert_eq!(mext.frame_size, 835);
	assert!(mext.left_energy);
	assert!(mext.right_energy);

	// MPEG streams carry no bit depth and keep the 16-bit level reference
	assert_eq!(file.cart_chunk().unwrap().level_ref, 0x8000);
}

#[test_log::test]
fn rdxl_sidecar_chunk_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "rdxl.wav");

	let xml = "<cut><cutName>CUT0001</cutName></cut>";

	let mut file = CartFile::new(&path);
	file.set_rdxl_contents(xml);
	file.create(
		&CartData::new(),
		RecordFormat::Pcm {
			channels: 1,
			samples_per_sec: 44_100,
			bits_per_sample: 16,
		},
		0,
	)
	.unwrap();
	file.write(&[0_u8; 2000]).unwrap();
	file.close(None).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert_eq!(file.rdxl_contents(), Some(xml));
}

#[test_log::test]
fn explicit_sample_count_wins() {
	let dir = tempfile::tempdir().unwrap();
	let path = temp_path(&dir, "fact.wav");

	let mut file = CartFile::new(&path);
	file.create(
		&CartData::new(),
		RecordFormat::Mpeg {
			channels: 2,
			samples_per_sec: 44_100,
			layer: 2,
			bit_rate: 256_000,
			mode: cartwave::chunks::fmt::ACM_MPEG_STEREO,
		},
		0,
	)
	.unwrap();
	file.write(&vec![0_u8; 835 * 6]).unwrap();
	// Caller knows better, e.g. the encoder reported its own total
	file.close(Some(5000)).unwrap();

	let mut file = CartFile::new(&path);
	file.open(None).unwrap();
	assert_eq!(file.sample_length(), 5000);
}
