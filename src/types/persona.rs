//! Persona (voice profile) types

use serde::{Deserialize, Serialize};

use crate::types::clip::ClipInfo;

/// One persona as the upstream list/detail endpoints return it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub root_clip_id: Option<String>,
    #[serde(default)]
    pub vox_audio_id: Option<String>,
    #[serde(default)]
    pub clip: Option<ClipInfo>,
    #[serde(default)]
    pub user_display_name: Option<String>,
    #[serde(default)]
    pub user_handle: Option<String>,
    #[serde(default)]
    pub user_image_url: Option<String>,
    #[serde(default)]
    pub persona_clips: Vec<PersonaClip>,
    #[serde(default)]
    pub is_trashed: bool,
    #[serde(default)]
    pub is_owned: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub clip_count: u32,
    #[serde(default)]
    pub upvote_count: u32,
}

/// Wrapper the detail endpoint uses for each clip attached to a persona
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaClip {
    #[serde(default)]
    pub clip: Option<ClipInfo>,
}

/// Envelope for `get-personas` (list)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaListResponse {
    #[serde(default)]
    pub personas: Vec<PersonaRecord>,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub current_page: u32,
}

/// Envelope for `get-persona` (single) — the record arrives nested
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaResponse {
    #[serde(default)]
    pub persona: PersonaRecord,
}

/// Envelope for `get-persona-paginated` (detail with clip pages)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaDetailResponse {
    #[serde(default)]
    pub persona: PersonaRecord,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub is_following: bool,
}

/// Flattened persona projection returned to callers
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersonaInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub root_clip_id: Option<String>,
    pub vox_audio_id: Option<String>,
    pub user_display_name: Option<String>,
    pub user_handle: Option<String>,
    pub is_public: bool,
    pub is_owned: bool,
    pub clip_count: u32,
    pub upvote_count: u32,
}

impl From<PersonaRecord> for PersonaInfo {
    fn from(record: PersonaRecord) -> Self {
        let image_url = record
            .clip
            .as_ref()
            .and_then(|c| c.image_url.clone())
            .or(record.user_image_url);
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            image_url,
            root_clip_id: record.root_clip_id,
            vox_audio_id: record.vox_audio_id,
            user_display_name: record.user_display_name,
            user_handle: record.user_handle,
            is_public: record.is_public,
            is_owned: record.is_owned,
            clip_count: record.clip_count,
            upvote_count: record.upvote_count,
        }
    }
}

/// One page of a persona listing, projected for callers
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersonaPage {
    pub personas: Vec<PersonaInfo>,
    pub total_results: u32,
    pub current_page: u32,
}

impl From<PersonaListResponse> for PersonaPage {
    fn from(raw: PersonaListResponse) -> Self {
        Self {
            personas: raw.personas.into_iter().map(PersonaInfo::from).collect(),
            total_results: raw.total_results,
            current_page: raw.current_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_persona_info_image_prefers_clip() {
        let record: PersonaRecord = serde_json::from_str(
            r#"{
                "id": "p-1",
                "name": "Voice",
                "clip": {"id": "c-1", "image_url": "https://img/clip.jpg"},
                "user_image_url": "https://img/user.jpg",
                "is_owned": true,
                "clip_count": 3
            }"#,
        )
        .unwrap();
        let info = PersonaInfo::from(record);
        assert_eq!(info.image_url.as_deref(), Some("https://img/clip.jpg"));
        assert!(info.is_owned);
        assert_eq!(info.clip_count, 3);
    }

    #[test]
    fn test_persona_info_image_falls_back_to_user() {
        let record: PersonaRecord = serde_json::from_str(
            r#"{"id": "p-2", "name": "Voice", "user_image_url": "https://img/user.jpg"}"#,
        )
        .unwrap();
        let info = PersonaInfo::from(record);
        assert_eq!(info.image_url.as_deref(), Some("https://img/user.jpg"));
    }

    #[test]
    fn test_persona_list_projection() {
        let raw: PersonaListResponse = serde_json::from_str(
            r#"{
                "personas": [{"id": "p-1", "name": "A"}, {"id": "p-2", "name": "B"}],
                "total_results": 2,
                "current_page": 1
            }"#,
        )
        .unwrap();
        let page = PersonaPage::from(raw);
        assert_eq!(page.personas.len(), 2);
        assert_eq!(page.personas[1].name, "B");
        assert_eq!(page.current_page, 1);
    }
}
