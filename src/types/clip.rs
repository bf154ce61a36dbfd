//! Clip and job status types
//!
//! Upstream clip payloads are duck-typed JSON; every response struct here is
//! tolerant — unknown fields are ignored and missing fields decay to
//! defaults so a schema drift upstream degrades data instead of failing
//! deserialization.

use serde::{Deserialize, Serialize};

use crate::types::serde_helpers::deserialize_flexible_f64;
use crate::utils::parse_lyrics;

/// Lifecycle status of one generated clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStatus {
    Submitted,
    Queued,
    Streaming,
    Complete,
    Error,
    /// Anything the upstream adds later
    #[serde(other)]
    Unknown,
}

impl Default for ClipStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

impl ClipStatus {
    /// Statuses that count as success for polling termination
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Streaming | Self::Complete)
    }
}

/// Metadata block nested inside an upstream clip
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipMetadata {
    #[serde(default)]
    pub gpt_description_prompt: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "type")]
    pub clip_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub negative_tags: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_f64")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stem_from_id: Option<String>,
}

/// One clip as the upstream feed/detail endpoints return it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_large_url: Option<String>,
    #[serde(default)]
    pub major_model_version: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub metadata: ClipMetadata,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: ClipStatus,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_trashed: bool,
}

/// Envelope for submission and feed responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipsResponse {
    #[serde(default)]
    pub clips: Vec<ClipInfo>,
}

/// Flattened clip projection returned to callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioInfo {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub lyric: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: Option<String>,
    pub model_name: Option<String>,
    pub status: ClipStatus,
    pub gpt_description_prompt: Option<String>,
    pub prompt: Option<String>,
    #[serde(rename = "type")]
    pub clip_type: Option<String>,
    pub tags: Option<String>,
    pub negative_tags: Option<String>,
    pub duration: Option<f64>,
    pub error_message: Option<String>,
    pub stem_from_id: Option<String>,
}

impl From<ClipInfo> for AudioInfo {
    fn from(clip: ClipInfo) -> Self {
        let lyric = clip
            .metadata
            .prompt
            .as_deref()
            .map(parse_lyrics)
            .filter(|l| !l.is_empty());
        Self {
            id: clip.id,
            title: clip.title,
            image_url: clip.image_url,
            lyric,
            audio_url: clip.audio_url,
            video_url: clip.video_url,
            created_at: clip.created_at,
            model_name: clip.model_name,
            status: clip.status,
            gpt_description_prompt: clip.metadata.gpt_description_prompt,
            prompt: clip.metadata.prompt,
            clip_type: clip.metadata.clip_type,
            tags: clip.metadata.tags,
            negative_tags: clip.metadata.negative_tags,
            duration: clip.metadata.duration,
            error_message: clip.metadata.error_message,
            stem_from_id: clip.metadata.stem_from_id,
        }
    }
}

/// Stem split mode. `Two` splits vocals + instrumental, `All` splits every
/// detected stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemKind {
    Two,
    All,
}

impl StemKind {
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Two => 91,
            Self::All => 92,
        }
    }

    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Two => "Two",
            Self::All => "All",
        }
    }

    pub fn task(&self) -> &'static str {
        match self {
            Self::Two => "two",
            Self::All => "all",
        }
    }
}

/// One converted stem with its WAV download URL
#[derive(Debug, Clone, Serialize)]
pub struct StemWav {
    pub id: String,
    pub title: Option<String>,
    pub wav_url: String,
    pub audio_url: Option<String>,
    pub stem_from_id: String,
}

/// WAV conversion status as callers see it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WavResult {
    pub wav_url: Option<String>,
    pub status: Option<String>,
}

/// Raw WAV-status payload. The URL field name has drifted upstream, so all
/// three known spellings are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WavFileResponse {
    #[serde(default)]
    pub wav_file_url: Option<String>,
    #[serde(default)]
    pub wav_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WavFileResponse {
    /// First present URL spelling, if any
    pub fn resolve_url(&self) -> Option<&str> {
        self.wav_file_url
            .as_deref()
            .or(self.wav_url.as_deref())
            .or(self.url.as_deref())
    }
}

/// One word with alignment timing, for karaoke-style display
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignedWord {
    pub word: String,
    #[serde(default)]
    pub start_s: f64,
    #[serde(default)]
    pub end_s: f64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub p_align: f64,
}

/// Envelope for the lyric-alignment endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlignedLyricsResponse {
    #[serde(default)]
    pub aligned_words: Vec<AlignedWord>,
}

/// Raw billing payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingInfoResponse {
    #[serde(default)]
    pub total_credits_left: f64,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub monthly_limit: f64,
    #[serde(default)]
    pub monthly_usage: f64,
}

/// Credit balance projection returned to callers
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreditsInfo {
    pub credits_left: f64,
    pub period: Option<String>,
    pub monthly_limit: f64,
    pub monthly_usage: f64,
}

impl From<BillingInfoResponse> for CreditsInfo {
    fn from(raw: BillingInfoResponse) -> Self {
        Self {
            credits_left: raw.total_credits_left,
            period: raw.period,
            monthly_limit: raw.monthly_limit,
            monthly_usage: raw.monthly_usage,
        }
    }
}

/// `/api/c/check` status response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptchaCheckResponse {
    #[serde(default)]
    pub required: bool,
}

/// Vox-stem extraction response; the id may arrive nested or flat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoxStemResponse {
    #[serde(default)]
    pub processed_clip: Option<ProcessedClip>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedClip {
    pub id: String,
}

impl VoxStemResponse {
    pub fn vox_audio_id(&self) -> Option<&str> {
        self.processed_clip
            .as_ref()
            .map(|c| c.id.as_str())
            .or(self.id.as_deref())
    }
}

/// Result of vox-stem extraction
#[derive(Debug, Clone, Serialize)]
pub struct VoxStem {
    pub vox_audio_id: String,
    pub clip_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clip_status_parses_lowercase() {
        let status: ClipStatus = serde_json::from_str("\"streaming\"").unwrap();
        assert_eq!(status, ClipStatus::Streaming);
        assert!(status.is_success());

        let status: ClipStatus = serde_json::from_str("\"brand_new_state\"").unwrap();
        assert_eq!(status, ClipStatus::Unknown);
    }

    #[test]
    fn test_clip_info_tolerates_sparse_payload() {
        let clip: ClipInfo = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(clip.id, "abc");
        assert_eq!(clip.status, ClipStatus::Submitted);
        assert!(clip.metadata.prompt.is_none());
    }

    #[test]
    fn test_audio_info_projection_normalizes_lyrics() {
        let clip: ClipInfo = serde_json::from_str(
            r#"{
                "id": "abc",
                "title": "Song",
                "status": "complete",
                "metadata": {"prompt": "line one\n\nline two", "tags": "pop"},
                "unknown_field": 42
            }"#,
        )
        .unwrap();
        let audio = AudioInfo::from(clip);
        assert_eq!(audio.lyric.as_deref(), Some("line one\nline two"));
        assert_eq!(audio.tags.as_deref(), Some("pop"));
        assert_eq!(audio.status, ClipStatus::Complete);
    }

    #[test]
    fn test_stem_kind_config() {
        assert_eq!(StemKind::Two.type_id(), 91);
        assert_eq!(StemKind::All.type_id(), 92);
        assert_eq!(StemKind::All.group_name(), "All");
        assert_eq!(StemKind::Two.task(), "two");
    }

    #[test]
    fn test_wav_response_url_spellings() {
        let r: WavFileResponse =
            serde_json::from_str(r#"{"wav_file_url": "https://a/x.wav"}"#).unwrap();
        assert_eq!(r.resolve_url(), Some("https://a/x.wav"));

        let r: WavFileResponse = serde_json::from_str(r#"{"url": "https://a/y.wav"}"#).unwrap();
        assert_eq!(r.resolve_url(), Some("https://a/y.wav"));

        let r: WavFileResponse = serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert_eq!(r.resolve_url(), None);
    }

    #[test]
    fn test_vox_stem_id_nested_or_flat() {
        let r: VoxStemResponse =
            serde_json::from_str(r#"{"processed_clip": {"id": "vox-1"}}"#).unwrap();
        assert_eq!(r.vox_audio_id(), Some("vox-1"));

        let r: VoxStemResponse = serde_json::from_str(r#"{"id": "vox-2"}"#).unwrap();
        assert_eq!(r.vox_audio_id(), Some("vox-2"));

        let r: VoxStemResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(r.vox_audio_id(), None);
    }
}
