//! RIFF/WAVE reading and writing

mod read;
mod write;

pub(crate) use read::{WaveContents, open};
pub(crate) use write::{WaveFinal, WaveOutline, close, create};
