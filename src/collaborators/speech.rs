//! Text-to-speech for scripted dialogs

use crate::error::{AgentError, CollaboratorFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::check_status;

const SERVICE: &str = "rime";

/// Voices used in the dialogs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The buyer agent
    Cove,
    /// The supplier
    Juan,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Cove => write!(f, "cove"),
            Speaker::Juan => write!(f, "juan"),
        }
    }
}

/// One spoken line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogLine {
    pub text: String,
    pub speaker: Speaker,
}

impl DialogLine {
    pub fn new(speaker: Speaker, text: &str) -> Self {
        Self {
            text: text.to_string(),
            speaker,
        }
    }
}

/// Turns one line of text into audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, line: &DialogLine) -> Result<Vec<u8>>;
}

/// Joins per-line audio segments into one track
#[async_trait]
pub trait AudioJoiner: Send + Sync {
    async fn join(&self, segments: Vec<Vec<u8>>) -> Result<Vec<u8>>;
}

/// Synthesize every line in order and join the audio
pub async fn make_dialog(
    synthesizer: &dyn SpeechSynthesizer,
    joiner: &dyn AudioJoiner,
    dialog: &[DialogLine],
) -> Result<Vec<u8>> {
    let mut segments = Vec::with_capacity(dialog.len());
    for (index, line) in dialog.iter().enumerate() {
        let audio = synthesizer.synthesize(line).await?;
        tracing::debug!(
            "Synthesized line {}/{} ({}): {} bytes",
            index + 1,
            dialog.len(),
            line.speaker,
            audio.len()
        );
        segments.push(audio);
    }

    let track = joiner.join(segments).await?;
    tracing::info!("Dialog of {} lines joined into {} bytes", dialog.len(), track.len());
    Ok(track)
}

/// Speech service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub base_url: String,
    pub model_id: String,
    pub lang: String,
    pub sampling_rate: u32,
    pub speed_alpha: f32,
    /// `ffmpeg` or `concat`
    pub joiner: String,
    pub ffmpeg_path: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://users.rime.ai".to_string(),
            model_id: "mistv2".to_string(),
            lang: "eng".to_string(),
            sampling_rate: 22_050,
            speed_alpha: 1.0,
            joiner: "ffmpeg".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RimeRequest<'a> {
    speaker: Speaker,
    text: &'a str,
    model_id: &'a str,
    lang: &'a str,
    sampling_rate: u32,
    speed_alpha: f32,
    reduce_latency: bool,
    pause_between_brackets: bool,
    phonemize_between_brackets: bool,
    inline_speed_alpha: &'a str,
}

/// Rime TTS client
pub struct RimeSynthesizer {
    config: SpeechConfig,
    token: String,
    client: reqwest::Client,
}

impl RimeSynthesizer {
    pub fn new(config: SpeechConfig, token: String) -> Self {
        Self {
            config,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn request<'a>(&'a self, line: &'a DialogLine) -> RimeRequest<'a> {
        RimeRequest {
            speaker: line.speaker,
            text: &line.text,
            model_id: &self.config.model_id,
            lang: &self.config.lang,
            sampling_rate: self.config.sampling_rate,
            speed_alpha: self.config.speed_alpha,
            reduce_latency: false,
            pause_between_brackets: false,
            phonemize_between_brackets: false,
            inline_speed_alpha: "0.5, 3",
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for RimeSynthesizer {
    async fn synthesize(&self, line: &DialogLine) -> Result<Vec<u8>> {
        let url = format!("{}/v1/rime-tts", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "audio/mp3")
            .bearer_auth(&self.token)
            .json(&self.request(line))
            .send()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;
        let audio = check_status(SERVICE, response)?
            .bytes()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;

        Ok(audio.to_vec())
    }
}

/// Appends segments byte for byte
///
/// Good enough for MP3 frames from the same encoder settings.
pub struct ConcatJoiner;

#[async_trait]
impl AudioJoiner for ConcatJoiner {
    async fn join(&self, segments: Vec<Vec<u8>>) -> Result<Vec<u8>> {
        Ok(segments.concat())
    }
}

/// Joins segments with the ffmpeg concat demuxer, resampled to mono
pub struct FfmpegJoiner {
    ffmpeg: String,
    work_dir: PathBuf,
    sample_rate: u32,
}

impl FfmpegJoiner {
    pub fn new(ffmpeg: &str, sample_rate: u32) -> Self {
        Self::with_work_dir(ffmpeg, std::env::temp_dir(), sample_rate)
    }

    pub fn with_work_dir(ffmpeg: &str, work_dir: PathBuf, sample_rate: u32) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            work_dir,
            sample_rate,
        }
    }

    async fn run(&self, prefix: &str, segments: &[Vec<u8>], files: &mut Vec<PathBuf>) -> Result<Vec<u8>> {
        let mut list = String::new();
        for (index, segment) in segments.iter().enumerate() {
            let path = self.work_dir.join(segment_file_name(prefix, index, segments.len()));
            tokio::fs::write(&path, segment).await?;
            list.push_str(&format!("file '{}'\n", path.display()));
            files.push(path);
        }

        let list_path = self.work_dir.join(format!("{}-list.txt", prefix));
        tokio::fs::write(&list_path, list).await?;
        files.push(list_path.clone());

        let output = self.work_dir.join(format!("{}-joined.mp3", prefix));
        files.push(output.clone());

        let sample_rate = self.sample_rate.to_string();
        let status = tokio::process::Command::new(&self.ffmpeg)
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-ar", sample_rate.as_str(), "-ac", "1"])
            .arg(&output)
            .status()
            .await
            .map_err(|e| {
                AgentError::collaborator("ffmpeg", CollaboratorFailure::Process(e.to_string()))
            })?;
        if !status.success() {
            return Err(AgentError::collaborator(
                "ffmpeg",
                CollaboratorFailure::Process(format!("exited with {}", status)),
            ));
        }

        Ok(tokio::fs::read(&output).await?)
    }
}

#[async_trait]
impl AudioJoiner for FfmpegJoiner {
    async fn join(&self, segments: Vec<Vec<u8>>) -> Result<Vec<u8>> {
        let prefix = job_prefix();
        let mut files = Vec::new();

        let joined = self.run(&prefix, &segments, &mut files).await;
        remove_files(&files).await;
        joined
    }
}

fn segment_file_name(prefix: &str, index: usize, total: usize) -> String {
    format!("{}-speech-{:05}-of-{:05}.mp3", prefix, index, total)
}

/// Per-join file prefix; joins sharing a work dir must not collide
fn job_prefix() -> String {
    format!("dialog-{}-{:08x}", timestamp_millis(), rand::random::<u32>())
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

async fn remove_files(files: &[PathBuf]) {
    for path in files {
        if let Err(e) = remove_if_exists(path).await {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
