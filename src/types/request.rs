//! Request type definitions
//!
//! Caller-facing builder requests plus the exact wire payloads the upstream
//! generation endpoints expect. Payload field names mirror the upstream API
//! and must not be renamed.

use serde::{Deserialize, Serialize};

/// Generation mode flag carried in every submission payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationType {
    Text,
    Extend,
}

/// Metadata block nested in submission payloads
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata {
    pub create_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remix: Option<bool>,
}

impl GenerationMetadata {
    /// Metadata for a custom-mode submission with a fresh session token
    pub fn custom_session() -> Self {
        Self {
            create_mode: "custom".to_string(),
            create_session_token: Some(uuid::Uuid::new_v4().to_string()),
            is_remix: None,
        }
    }

    /// Metadata for a remix (stem) submission
    pub fn remix() -> Self {
        Self {
            create_mode: "custom".to_string(),
            create_session_token: None,
            is_remix: Some(true),
        }
    }
}

/// Wire payload for the standard submission endpoint.
///
/// `token` intentionally serializes as `null` when absent — the endpoint
/// distinguishes a missing challenge token from an omitted field.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratePayload {
    pub make_instrumental: bool,
    pub mv: String,
    pub prompt: String,
    pub generation_type: GenerationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_clip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpt_description_prompt: Option<String>,
}

/// Wire payload for the persona-variant submission endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PersonaGeneratePayload {
    pub token: Option<String>,
    pub task: String,
    pub generation_type: GenerationType,
    pub title: String,
    pub tags: String,
    pub negative_tags: String,
    pub mv: String,
    pub prompt: String,
    pub make_instrumental: bool,
    pub metadata: GenerationMetadata,
    pub override_fields: Vec<String>,
    pub persona_id: String,
    pub artist_clip_id: String,
    pub transaction_uuid: String,
}

/// Wire payload for stem generation (persona-variant endpoint, no challenge
/// token)
#[derive(Debug, Clone, Serialize)]
pub struct StemPayload {
    pub token: Option<String>,
    pub task: String,
    pub generation_type: GenerationType,
    pub title: String,
    pub tags: String,
    pub negative_tags: String,
    pub mv: String,
    pub prompt: String,
    pub make_instrumental: bool,
    pub metadata: GenerationMetadata,
    pub continue_clip_id: String,
    pub stem_type_id: u32,
    pub stem_type_group_name: String,
    pub stem_task: String,
    pub transaction_uuid: String,
}

/// Wire payload for persona creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatePersonaPayload {
    pub root_clip_id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub persona_type: String,
    pub clips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vox_audio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_start_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_end_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_input_styles: Option<String>,
}

/// Caller-facing request for custom (lyrics + metadata) generation
#[derive(Debug, Clone)]
pub struct CustomGenerateRequest {
    pub prompt: String,
    pub tags: String,
    pub title: String,
    pub make_instrumental: bool,
    pub model: Option<String>,
    pub wait: bool,
    pub negative_tags: Option<String>,
    pub persona_id: Option<String>,
    pub artist_clip_id: Option<String>,
}

impl CustomGenerateRequest {
    /// Create a new request with the required fields
    pub fn new(
        prompt: impl Into<String>,
        tags: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            tags: tags.into(),
            title: title.into(),
            make_instrumental: false,
            model: None,
            wait: false,
            negative_tags: None,
            persona_id: None,
            artist_clip_id: None,
        }
    }

    /// Generate an instrumental version
    pub fn with_instrumental(mut self, instrumental: bool) -> Self {
        self.make_instrumental = instrumental;
        self
    }

    /// Override the model version
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Poll the job to completion before returning
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Set style tags to avoid
    pub fn with_negative_tags(mut self, negative_tags: impl Into<String>) -> Self {
        self.negative_tags = Some(negative_tags.into());
        self
    }

    /// Sing with a persona; requires [`with_artist_clip_id`] as well
    ///
    /// [`with_artist_clip_id`]: Self::with_artist_clip_id
    pub fn with_persona_id(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    /// The clip the persona was created from
    pub fn with_artist_clip_id(mut self, artist_clip_id: impl Into<String>) -> Self {
        self.artist_clip_id = Some(artist_clip_id.into());
        self
    }
}

/// Caller-facing request for extending an existing clip
#[derive(Debug, Clone)]
pub struct ExtendRequest {
    pub clip_id: String,
    pub prompt: String,
    pub continue_at: f64,
    pub tags: Option<String>,
    pub negative_tags: Option<String>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub wait: bool,
}

impl ExtendRequest {
    /// Create a new request with the required fields
    pub fn new(clip_id: impl Into<String>, prompt: impl Into<String>, continue_at: f64) -> Self {
        Self {
            clip_id: clip_id.into(),
            prompt: prompt.into(),
            continue_at,
            tags: None,
            negative_tags: None,
            title: None,
            model: None,
            wait: false,
        }
    }

    /// Set style tags
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Set style tags to avoid
    pub fn with_negative_tags(mut self, negative_tags: impl Into<String>) -> Self {
        self.negative_tags = Some(negative_tags.into());
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Override the model version
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Poll the job to completion before returning
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}

/// Caller-facing request for persona creation
#[derive(Debug, Clone)]
pub struct CreatePersonaRequest {
    pub clip_id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub vox_audio_id: Option<String>,
    pub vocal_start_s: f64,
    pub vocal_end_s: f64,
    pub user_input_styles: Option<String>,
}

impl CreatePersonaRequest {
    /// Create a new request for the given source clip and persona name
    pub fn new(clip_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            name: name.into(),
            description: String::new(),
            is_public: false,
            vox_audio_id: None,
            vocal_start_s: 0.0,
            vocal_end_s: 30.0,
            user_input_styles: None,
        }
    }

    /// Set the persona description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Make the persona publicly visible
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Attach a previously extracted vox stem with its sample window
    pub fn with_vox_sample(
        mut self,
        vox_audio_id: impl Into<String>,
        start_s: f64,
        end_s: f64,
    ) -> Self {
        self.vox_audio_id = Some(vox_audio_id.into());
        self.vocal_start_s = start_s;
        self.vocal_end_s = end_s;
        self
    }

    /// Set style tags describing the voice
    pub fn with_styles(mut self, styles: impl Into<String>) -> Self {
        self.user_input_styles = Some(styles.into());
        self
    }
}
