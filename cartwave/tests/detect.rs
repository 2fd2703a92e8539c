use cartwave::data::CartData;
use cartwave::file::CartFile;
use cartwave::probe::FileType;

use std::io::Write;
use std::path::{Path, PathBuf};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
	let path = dir.path().join(name);
	std::fs::File::create(&path)
		.unwrap()
		.write_all(contents)
		.unwrap();
	path
}

// MPEG 1 Layer II, 256 kbps, 44.1 kHz stereo frames
fn layer2_frames(count: usize) -> Vec<u8> {
	let frame_size = 144_000 * 256 / 44_100;
	let mut stream = Vec::new();
	for _ in 0..count {
		stream.extend_from_slice(&[0xFF, 0xFD, 0xC0, 0x40]);
		stream.resize(stream.len() + frame_size - 4, 0);
	}
	stream
}

fn open(path: &Path) -> (CartFile, CartData) {
	let mut data = CartData::new();
	let mut file = CartFile::new(path);
	file.open(Some(&mut data)).unwrap();
	(file, data)
}

#[test_log::test]
fn raw_mpeg_stream() {
	let dir = tempfile::tempdir().unwrap();
	// MPEG 1 Layer III, 160 kbps, 44.1 kHz
	let frame_size = 144_000 * 160 / 44_100;
	let mut stream = Vec::new();
	for _ in 0..10 {
		stream.extend_from_slice(&[0xFF, 0xFB, 0xA0, 0x40]);
		stream.resize(stream.len() + frame_size - 4, 0);
	}
	let path = write_file(&dir, "raw.mp3", &stream);

	let (file, _) = open(&path);
	assert_eq!(file.file_type(), Some(FileType::Mpeg));
	assert_eq!(file.head_layer(), 3);
	assert_eq!(file.head_bit_rate(), 160_000);
	assert_eq!(file.data_start(), 0);
	assert_eq!(file.data_length(), stream.len() as u64);
	assert_eq!(file.sample_length(), 1152 * 10);
}

#[test_log::test]
fn atx_capture_file() {
	let dir = tempfile::tempdir().unwrap();
	let mut image = b"FILE: CART=0042 CUT=1 ".to_vec();
	let header_len = image.len() as u64;
	image.extend_from_slice(&layer2_frames(4));
	let path = write_file(&dir, "capture.atx", &image);

	let (file, _) = open(&path);
	assert_eq!(file.file_type(), Some(FileType::Atx));
	assert_eq!(file.head_layer(), 2);
	assert_eq!(file.data_start(), header_len);
}

#[test_log::test]
fn tmc_golddisc_file() {
	let dir = tempfile::tempdir().unwrap();
	let payload = layer2_frames(5);
	let mut image = (payload.len() as u32).to_le_bytes().to_vec();
	image.extend_from_slice(&payload);
	image.extend_from_slice(b"#TITLE\r\nNight Show Open\r\n#ARTIST\r\nOvernight\r\n");
	let path = write_file(&dir, "disc.tmc", &image);

	let (file, data) = open(&path);
	assert_eq!(file.file_type(), Some(FileType::Tmc));
	assert_eq!(file.data_start(), 4);
	assert_eq!(file.data_length(), payload.len() as u64);
	assert_eq!(file.sample_length(), 1152 * 5);
	assert_eq!(data.title, "Night Show Open");
	assert_eq!(data.artist, "Overnight");
}

#[test_log::test]
fn aiff_file() {
	let dir = tempfile::tempdir().unwrap();

	// 4410 stereo 16-bit frames at 44.1 kHz
	let mut comm = vec![0_u8; 18];
	comm[0..2].copy_from_slice(&2_u16.to_be_bytes());
	comm[2..6].copy_from_slice(&4410_u32.to_be_bytes());
	comm[6..8].copy_from_slice(&16_u16.to_be_bytes());
	comm[8..18].copy_from_slice(&[0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]);

	let sound = vec![0_u8; 4410 * 4];
	let mut image = b"FORM\0\0\0\0AIFF".to_vec();
	image.extend_from_slice(b"COMM");
	image.extend_from_slice(&18_u32.to_be_bytes());
	image.extend_from_slice(&comm);
	image.extend_from_slice(b"SSND");
	image.extend_from_slice(&((sound.len() + 8) as u32).to_be_bytes());
	image.extend_from_slice(&[0; 8]);
	image.extend_from_slice(&sound);
	let form_size = (image.len() - 8) as u32;
	image[4..8].copy_from_slice(&form_size.to_be_bytes());
	let path = write_file(&dir, "clip.aiff", &image);

	let (file, _) = open(&path);
	assert_eq!(file.file_type(), Some(FileType::Aiff));
	assert_eq!(file.channels(), 2);
	assert_eq!(file.samples_per_sec(), 44_100);
	assert_eq!(file.bits_per_sample(), 16);
	assert_eq!(file.sample_length(), 4410);
	assert_eq!(file.ext_time_length(), 100);
	assert_eq!(file.data_length(), sound.len() as u64);
}

#[test_log::test]
fn flac_file() {
	let dir = tempfile::tempdir().unwrap();

	// 44.1 kHz stereo 16-bit, 132300 samples
	let packed: u64 = 44_100_u64 << 44 | 1 << 41 | 15 << 36 | 132_300;
	let mut streaminfo = vec![0_u8; 34];
	streaminfo[10..18].copy_from_slice(&packed.to_be_bytes());

	let mut image = b"fLaC".to_vec();
	image.extend_from_slice(&[0x80, 0, 0, 34]);
	image.extend_from_slice(&streaminfo);
	let path = write_file(&dir, "song.flac", &image);

	let (file, _) = open(&path);
	assert_eq!(file.file_type(), Some(FileType::Flac));
	assert_eq!(file.channels(), 2);
	assert_eq!(file.samples_per_sec(), 44_100);
	assert_eq!(file.bits_per_sample(), 16);
	assert_eq!(file.sample_length(), 132_300);
	assert_eq!(file.ext_time_length(), 3000);
}

#[test_log::test]
fn mpeg4_needs_a_decoder() {
	let dir = tempfile::tempdir().unwrap();

	fn atom(fourcc: &[u8; 4], content: &[u8]) -> Vec<u8> {
		let mut buf = ((content.len() + 8) as u32).to_be_bytes().to_vec();
		buf.extend_from_slice(fourcc);
		buf.extend_from_slice(content);
		buf
	}

	let mut mdhd = vec![0_u8; 24];
	mdhd[12..16].copy_from_slice(&44_100_u32.to_be_bytes());
	mdhd[16..20].copy_from_slice(&88_200_u32.to_be_bytes());
	let mut hdlr = vec![0_u8; 24];
	hdlr[8..12].copy_from_slice(b"soun");
	let mut mp4a = vec![0_u8; 28];
	mp4a[16..18].copy_from_slice(&2_u16.to_be_bytes());
	mp4a[22..26].copy_from_slice(&(44_100_u32 << 16).to_be_bytes());
	let mut stsd = vec![0_u8; 8];
	stsd[7] = 1;
	stsd.extend_from_slice(&atom(b"mp4a", &mp4a));
	let minf = atom(b"stbl", &atom(b"stsd", &stsd));
	let mdia = [
		atom(b"mdhd", &mdhd),
		atom(b"hdlr", &hdlr),
		atom(b"minf", &minf),
	]
	.concat();
	let moov = atom(b"moov", &atom(b"trak", &atom(b"mdia", &mdia)));

	let mut image = atom(b"ftyp", b"M4A \x00\x00\x00\x00isom");
	image.extend_from_slice(&moov);
	let path = write_file(&dir, "clip.m4a", &image);

	// No decoder attached: the file is refused outright
	let mut file = CartFile::new(&path);
	assert!(file.open(None).is_err());

	struct NullDecoder;
	impl cartwave::Mp4Decoder for NullDecoder {
		fn decode(&mut self, _path: &std::path::Path) -> cartwave::error::Result<Vec<u8>> {
			Ok(Vec::new())
		}
	}

	let mut file = CartFile::new(&path).mp4_decoder(Box::new(NullDecoder));
	file.open(None).unwrap();
	assert_eq!(file.file_type(), Some(FileType::M4a));
	assert_eq!(file.samples_per_sec(), 44_100);
	assert_eq!(file.sample_length(), 88_200);
}

#[test_log::test]
fn unrecognized_file_is_refused() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(&dir, "notes.txt", b"station log for tuesday overnight\n");

	let mut file = CartFile::new(&path);
	assert!(file.open(None).is_err());
}
