//! # Audio Decoder Module
//!
//! Turns uploaded bytes into an [`AudioBuffer`]. The container is probed and decoded
//! in memory with Symphonia (WAV, FLAC, MP3, Ogg/Vorbis). Browser recordings often
//! arrive in formats Symphonia cannot read (WebM/Opus), so a failed decode is retried
//! once through an external transcoder that rewrites the upload as WAV.
//!
//! ## Scratch files
//! The transcoder works on files. Every fallback attempt gets its own scratch
//! directory under the configured upload directory, holding the upload copy, the
//! transcoded output and the transcoder's stderr. The directory is removed on every
//! exit path, including panics.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::AudioBuffer;
use crate::config::DecoderConfig;
use crate::error::{AnalysisError, TranscodeError};

/// How often a running transcoder is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Converts an audio file into a WAV file.
///
/// Implementations must not leave the process running after returning.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// Runs `ffmpeg` (or a compatible program) as a subprocess with a wall-clock limit.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let stderr_path = output.with_extension("stderr.log");
        let stderr_file = File::create(&stderr_path)?;

        let mut child = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr_file)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                // The child may exit between try_wait and kill.
                let _ = child.kill();
                child.wait()?;
                return Err(TranscodeError::TimedOut {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let mut stderr = String::new();
            File::open(&stderr_path)?.read_to_string(&mut stderr)?;
            return Err(TranscodeError::Failed {
                program: self.program.clone(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Decodes uploads, falling back to a [`Transcoder`] once.
pub struct AudioDecoder {
    upload_dir: PathBuf,
    transcoder: Box<dyn Transcoder>,
}

impl AudioDecoder {
    /// Decoder using the configured external transcoder program.
    pub fn new(config: &DecoderConfig) -> Self {
        Self::with_transcoder(
            config.upload_dir(),
            Box::new(FfmpegTranscoder::new(
                config.transcoder_program.clone(),
                config.transcode_timeout(),
            )),
        )
    }

    pub fn with_transcoder(upload_dir: impl Into<PathBuf>, transcoder: Box<dyn Transcoder>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            transcoder,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Decodes an uploaded recording to mono samples at its native sample rate.
    ///
    /// This function:
    /// 1. Probes and decodes `bytes` in memory
    /// 2. On failure, writes them to a scratch directory and runs the transcoder
    /// 3. Decodes the transcoded WAV
    /// 4. Removes the scratch directory
    ///
    /// # Errors
    /// * `AnalysisError::Decode` carrying both causes when neither attempt succeeds
    pub fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, AnalysisError> {
        let primary = match decode_bytes(bytes.to_vec()) {
            Ok(audio) => {
                log_decoded(&audio, "direct");
                return Ok(audio);
            }
            Err(e) => e,
        };

        tracing::warn!("Direct decode failed: {}. Trying transcoder fallback.", primary);

        match self.decode_via_transcoder(bytes) {
            Ok(audio) => {
                log_decoded(&audio, "transcoded");
                Ok(audio)
            }
            Err(fallback) => {
                tracing::error!("Transcoder fallback failed: {}", fallback);
                Err(AnalysisError::Decode { primary, fallback })
            }
        }
    }

    fn decode_via_transcoder(&self, bytes: &[u8]) -> Result<AudioBuffer, String> {
        let scratch = tempfile::Builder::new()
            .prefix("ney-upload-")
            .tempdir_in(&self.upload_dir)
            .map_err(|e| format!("cannot create scratch directory: {e}"))?;

        let input = scratch.path().join("upload.bin");
        let output = scratch.path().join("converted.wav");

        let result = std::fs::write(&input, bytes)
            .map_err(|e| format!("cannot store upload: {e}"))
            .and_then(|()| {
                self.transcoder
                    .transcode(&input, &output)
                    .map_err(|e| e.to_string())
            })
            .and_then(|()| std::fs::read(&output).map_err(|e| format!("cannot read output: {e}")))
            .and_then(|wav| decode_bytes(wav).map_err(|e| format!("transcoded audio: {e}")));

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!("Could not remove scratch directory {}: {}", scratch_path.display(), e);
        }
        result
    }
}

fn log_decoded(audio: &AudioBuffer, how: &str) {
    tracing::info!(
        "Audio loaded ({}). Sample rate: {}, Duration: {:.2}s",
        how,
        audio.sample_rate(),
        audio.duration_secs()
    );
}

/// Probes and decodes a complete in-memory file, downmixing to mono.
fn decode_bytes(bytes: Vec<u8>) -> Result<AudioBuffer, String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("unrecognised format: {e}"))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| "no audio track found".to_string())?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {e}"))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("packet read error: {e}")),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => return Err(format!("fatal decode error: {e}")),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate.get_or_insert(spec.rate);

        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().is_none_or(|buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| "unknown sample rate".to_string())?;
    if interleaved.is_empty() {
        return Err("no audio samples decoded".to_string());
    }
    AudioBuffer::from_interleaved(&interleaved, channels, sample_rate).map_err(|e| e.to_string())
}
