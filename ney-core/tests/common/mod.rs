//! Synthetic recordings shared by the integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::io::Cursor;

use ney_core::AudioBuffer;

pub fn sine(freq: f64, sample_rate: u32, secs: f64) -> Vec<f32> {
    let n = (secs * sample_rate as f64) as usize;
    (0..n)
        .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
        .collect()
}

/// Deterministic white noise in [-0.5, 0.5).
pub fn noise(len: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 40) as f64 / (1u64 << 24) as f64 - 0.5) as f32
        })
        .collect()
}

pub fn buffer(samples: Vec<f32>, sample_rate: u32) -> AudioBuffer {
    AudioBuffer::new(samples, sample_rate).unwrap()
}

/// 16-bit PCM WAV file bytes.
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Lowercase hex text of `bytes`. No container signature survives the encoding,
/// so decoders reject it outright.
pub fn to_hex(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|b| format!("{b:02x}").into_bytes())
        .collect()
}

pub fn from_hex(text: &[u8]) -> Vec<u8> {
    text.chunks_exact(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect()
}
