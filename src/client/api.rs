//! The generation protocol: submission, polling, stems, WAV, personas

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::browser::GenerationTokenProvider;
use crate::config::settings::DEFAULT_MODEL;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::session::SessionManager;
use crate::types::{
    AlignedLyricsResponse, AlignedWord, AudioInfo, BillingInfoResponse, CaptchaCheckResponse,
    ClipInfo, ClipStatus, ClipsResponse, CreatePersonaPayload, CreatePersonaRequest, CreditsInfo,
    CustomGenerateRequest, ExtendRequest, GeneratePayload, GenerationMetadata, GenerationType,
    PersonaDetailResponse, PersonaGeneratePayload, PersonaInfo, PersonaListResponse, PersonaPage,
    PersonaRecord, PersonaResponse, StemKind, StemPayload, StemWav, VoxStem, VoxStemResponse,
    WavFileResponse, WavResult,
};
use crate::utils::sleep_secs_between;

/// Internal description of one submission; every public generation
/// operation reduces to this.
struct Submission {
    prompt: String,
    is_custom: bool,
    tags: Option<String>,
    title: Option<String>,
    negative_tags: Option<String>,
    make_instrumental: bool,
    model: Option<String>,
    wait: bool,
    task: Option<String>,
    continue_clip_id: Option<String>,
    continue_at: Option<f64>,
    persona_id: Option<String>,
    artist_clip_id: Option<String>,
}

/// One fully-initialized client for one credential set.
///
/// Cached per serialized cookie string; a cache hit skips the session
/// bootstrap entirely.
pub struct SunoClient {
    settings: Arc<Settings>,
    session: SessionManager,
    token_provider: Arc<dyn GenerationTokenProvider>,
    cookie_key: String,
}

impl SunoClient {
    /// Build and bootstrap a client: resolve the session id and fetch the
    /// first bearer token.
    pub async fn connect(settings: Arc<Settings>, raw_cookie: &str) -> Result<Self> {
        let provider = Arc::new(crate::browser::BrowserEngine::new(settings.clone()));
        Self::connect_with_provider(settings, raw_cookie, provider).await
    }

    /// Bootstrap with an injected token provider (tests use scripted ones)
    pub async fn connect_with_provider(
        settings: Arc<Settings>,
        raw_cookie: &str,
        token_provider: Arc<dyn GenerationTokenProvider>,
    ) -> Result<Self> {
        let session = SessionManager::new(settings.clone(), raw_cookie)?;
        session.init().await?;
        session.renew(false).await?;
        Ok(Self {
            settings,
            session,
            token_provider,
            cookie_key: raw_cookie.to_string(),
        })
    }

    /// The raw cookie string this client was built from (instance cache key)
    pub fn cookie_key(&self) -> &str {
        &self.cookie_key
    }

    /// Renew the bearer token; `wait` adds the polling-loop pause
    pub async fn keep_alive(&self, wait: bool) -> Result<()> {
        self.session.renew(wait).await
    }

    // ------------------------------------------------------------------
    // Generation

    /// Description-driven generation: the upstream writes lyrics and style
    /// from a plain prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        make_instrumental: bool,
        model: Option<&str>,
        wait: bool,
    ) -> Result<Vec<AudioInfo>> {
        require_str(prompt, "prompt")?;
        optional_str(model, "model")?;
        info!(wait, "Generating audio from description");
        self.generate_songs(Submission {
            prompt: prompt.to_string(),
            is_custom: false,
            tags: None,
            title: None,
            negative_tags: None,
            make_instrumental,
            model: model.map(str::to_string),
            wait,
            task: None,
            continue_clip_id: None,
            continue_at: None,
            persona_id: None,
            artist_clip_id: None,
        })
        .await
    }

    /// Full-control generation with explicit lyrics and metadata.
    ///
    /// With a persona the request routes to the persona-variant endpoint
    /// and `artist_clip_id` becomes mandatory.
    pub async fn custom_generate(&self, request: CustomGenerateRequest) -> Result<Vec<AudioInfo>> {
        require_str(&request.prompt, "prompt")?;
        require_str(&request.tags, "tags")?;
        require_str(&request.title, "title")?;
        optional_str(request.model.as_deref(), "model")?;
        optional_str(request.persona_id.as_deref(), "persona_id")?;
        optional_str(request.artist_clip_id.as_deref(), "artist_clip_id")?;
        if request.persona_id.is_some() && request.artist_clip_id.is_none() {
            return Err(Error::validation(
                "artist_clip_id",
                "required when persona_id is set",
            ));
        }

        let task = request.persona_id.as_ref().map(|_| "vox".to_string());
        info!(persona = request.persona_id.is_some(), "Generating custom audio");
        self.generate_songs(Submission {
            prompt: request.prompt,
            is_custom: true,
            tags: Some(request.tags),
            title: Some(request.title),
            negative_tags: request.negative_tags,
            make_instrumental: request.make_instrumental,
            model: request.model,
            wait: request.wait,
            task,
            continue_clip_id: None,
            continue_at: None,
            persona_id: request.persona_id,
            artist_clip_id: request.artist_clip_id,
        })
        .await
    }

    /// Extend an existing clip from a given offset
    pub async fn extend(&self, request: ExtendRequest) -> Result<Vec<AudioInfo>> {
        require_str(&request.clip_id, "clip_id")?;
        require_str(&request.prompt, "prompt")?;
        require_offset(request.continue_at, "continue_at")?;
        optional_str(request.model.as_deref(), "model")?;

        info!(clip_id = %request.clip_id, at = request.continue_at, "Extending clip");
        self.generate_songs(Submission {
            prompt: request.prompt,
            is_custom: true,
            tags: request.tags,
            title: request.title,
            negative_tags: request.negative_tags,
            make_instrumental: false,
            model: request.model,
            wait: request.wait,
            task: Some("extend".to_string()),
            continue_clip_id: Some(request.clip_id),
            continue_at: Some(request.continue_at),
            persona_id: None,
            artist_clip_id: None,
        })
        .await
    }

    async fn generate_songs(&self, sub: Submission) -> Result<Vec<AudioInfo>> {
        self.keep_alive(false).await?;

        let use_web_endpoint =
            sub.task.as_deref() == Some("vox") && sub.persona_id.is_some() && sub.artist_clip_id.is_some();

        // The submission token comes out of the browser flow; the bearer it
        // captured is fresher than ours, so adopt it.
        let captured = self
            .token_provider
            .obtain_generation_token(&self.session.credentials_snapshot().await)
            .await?;
        self.session.adopt_bearer(captured.bearer).await;

        let (endpoint, body, headers) = if use_web_endpoint {
            let payload = PersonaGeneratePayload {
                token: captured.challenge_token,
                task: "vox".to_string(),
                generation_type: GenerationType::Text,
                title: sub.title.clone().unwrap_or_default(),
                tags: sub.tags.clone().unwrap_or_default(),
                negative_tags: sub.negative_tags.clone().unwrap_or_default(),
                mv: sub.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                prompt: sub.prompt.clone(),
                make_instrumental: sub.make_instrumental,
                metadata: GenerationMetadata::custom_session(),
                override_fields: vec!["prompt".to_string(), "tags".to_string()],
                persona_id: sub.persona_id.clone().unwrap_or_default(),
                artist_clip_id: sub.artist_clip_id.clone().unwrap_or_default(),
                transaction_uuid: uuid::Uuid::new_v4().to_string(),
            };
            (
                format!("{}/api/generate/v2-web/", self.settings.api.base_url),
                serde_json::to_value(payload)?,
                Some(self.browser_token_header()?),
            )
        } else {
            let generation_type = if sub.task.as_deref() == Some("extend") {
                GenerationType::Extend
            } else {
                GenerationType::Text
            };
            let mut payload = GeneratePayload {
                make_instrumental: sub.make_instrumental,
                mv: sub.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                prompt: String::new(),
                generation_type,
                continue_at: sub.continue_at,
                continue_clip_id: sub.continue_clip_id.clone(),
                task: sub.task.clone(),
                token: captured.challenge_token,
                tags: None,
                title: None,
                negative_tags: None,
                gpt_description_prompt: None,
            };
            if sub.is_custom {
                payload.prompt = sub.prompt.clone();
                payload.tags = sub.tags.clone();
                payload.title = sub.title.clone();
                payload.negative_tags = sub.negative_tags.clone();
            } else {
                payload.gpt_description_prompt = Some(sub.prompt.clone());
            }
            (
                format!("{}/api/generate/v2/", self.settings.api.base_url),
                serde_json::to_value(payload)?,
                None,
            )
        };

        let response: ClipsResponse = self
            .session
            .request_json(
                Method::POST,
                &endpoint,
                Some(&body),
                self.settings.timeouts.api_request,
                headers,
            )
            .await?;

        let ids: Vec<String> = response.clips.iter().map(|c| c.id.clone()).collect();
        debug!(clips = ids.len(), "Submission accepted");

        if sub.wait {
            self.poll_clips(&ids, true).await
        } else {
            Ok(response.clips.into_iter().map(AudioInfo::from).collect())
        }
    }

    /// Poll the feed until every clip is terminal or the budget elapses.
    ///
    /// Returns the last observed snapshot on deadline, never an error — the
    /// caller inspects per-clip status.
    async fn poll_clips(&self, ids: &[String], renew_between: bool) -> Result<Vec<AudioInfo>> {
        let started = Instant::now();
        let mut last_snapshot: Vec<AudioInfo> = Vec::new();
        let initial = self.settings.timeouts.audio_poll_initial_delay;
        sleep_secs_between(initial, initial).await;

        while started.elapsed() < self.settings.timeouts.audio_generation_max {
            let snapshot = self.fetch_feed(Some(ids), None).await?;
            // An empty snapshot means the feed has not indexed the clips
            // yet; treat it as still pending, not as vacuously terminal.
            let all_done = !snapshot.is_empty() && snapshot.iter().all(|a| a.status.is_success());
            let all_error =
                !snapshot.is_empty() && snapshot.iter().all(|a| a.status == ClipStatus::Error);
            if all_done || all_error {
                return Ok(snapshot);
            }
            last_snapshot = snapshot;
            sleep_secs_between(
                self.settings.timeouts.audio_poll_delay_min,
                self.settings.timeouts.audio_poll_delay_max,
            )
            .await;
            if renew_between {
                self.keep_alive(true).await?;
            }
        }
        warn!("Generation polling budget elapsed, returning last snapshot");
        Ok(last_snapshot)
    }

    // ------------------------------------------------------------------
    // Feed and status

    /// Clip status by id list, or the account feed when `ids` is `None`
    pub async fn get(
        &self,
        ids: Option<&[String]>,
        page: Option<u32>,
        skip_keep_alive: bool,
    ) -> Result<Vec<AudioInfo>> {
        if !skip_keep_alive {
            self.keep_alive(false).await?;
        }
        self.fetch_feed(ids, page).await
    }

    async fn fetch_feed(&self, ids: Option<&[String]>, page: Option<u32>) -> Result<Vec<AudioInfo>> {
        let mut url = url::Url::parse(&format!("{}/api/feed/v2", self.settings.api.base_url))
            .map_err(|e| Error::internal(format!("bad feed URL: {}", e)))?;
        if let Some(ids) = ids {
            url.query_pairs_mut().append_pair("ids", &ids.join(","));
        }
        if let Some(page) = page {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }

        let response: ClipsResponse = self
            .session
            .request_json::<ClipsResponse, ()>(
                Method::GET,
                url.as_str(),
                None,
                self.settings.timeouts.api_feed,
                None,
            )
            .await?;
        Ok(response.clips.into_iter().map(AudioInfo::from).collect())
    }

    /// Full raw clip detail
    pub async fn get_clip(&self, clip_id: &str) -> Result<ClipInfo> {
        require_str(clip_id, "clip_id")?;
        self.keep_alive(false).await?;
        self.session
            .request_json::<ClipInfo, ()>(
                Method::GET,
                &format!("{}/api/clip/{}", self.settings.api.base_url, clip_id),
                None,
                self.settings.timeouts.api_feed,
                None,
            )
            .await
    }

    /// Credit balance and usage
    pub async fn get_credits(&self) -> Result<CreditsInfo> {
        self.keep_alive(false).await?;
        let raw: BillingInfoResponse = self
            .session
            .request_json::<BillingInfoResponse, ()>(
                Method::GET,
                &format!("{}/api/billing/info/", self.settings.api.base_url),
                None,
                self.settings.timeouts.api_feed,
                None,
            )
            .await?;
        Ok(raw.into())
    }

    /// Word-level lyric timing for karaoke-style display
    pub async fn get_lyric_alignment(&self, song_id: &str) -> Result<Vec<AlignedWord>> {
        require_str(song_id, "song_id")?;
        self.keep_alive(false).await?;
        let response: AlignedLyricsResponse = self
            .session
            .request_json::<AlignedLyricsResponse, ()>(
                Method::GET,
                &format!(
                    "{}/api/gen/{}/aligned_lyrics/v2/",
                    self.settings.api.base_url, song_id
                ),
                None,
                self.settings.timeouts.api_feed,
                None,
            )
            .await?;
        Ok(response.aligned_words)
    }

    /// Ask the upstream whether generation currently requires a challenge
    pub async fn captcha_required(&self) -> Result<bool> {
        let response: CaptchaCheckResponse = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/c/check", self.settings.api.base_url),
                Some(&serde_json::json!({"ctype": "generation"})),
                self.settings.timeouts.api_request,
                None,
            )
            .await?;
        Ok(response.required)
    }

    /// Merge an extended clip with its source into one continuous track
    pub async fn concatenate(&self, clip_id: &str) -> Result<AudioInfo> {
        require_str(clip_id, "clip_id")?;
        self.keep_alive(false).await?;
        let clip: ClipInfo = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/generate/concat/v2/", self.settings.api.base_url),
                Some(&serde_json::json!({"clip_id": clip_id})),
                self.settings.timeouts.api_request,
                None,
            )
            .await?;
        Ok(clip.into())
    }

    // ------------------------------------------------------------------
    // Stems and WAV

    /// Split a finished song into stem tracks. No challenge token needed;
    /// the endpoint only wants the browser-identity header.
    pub async fn generate_stems(
        &self,
        song_id: &str,
        kind: StemKind,
        wait: bool,
    ) -> Result<Vec<AudioInfo>> {
        require_str(song_id, "song_id")?;
        self.keep_alive(false).await?;

        let source = self.fetch_feed(Some(&[song_id.to_string()]), None).await?;
        let source = source.first();
        let title = source
            .and_then(|c| c.title.clone())
            .unwrap_or_else(|| "Untitled".to_string());
        let model = source
            .and_then(|c| c.model_name.clone())
            .unwrap_or_else(|| "chirp-v3-5".to_string());
        let tags = source.and_then(|c| c.tags.clone()).unwrap_or_default();

        let payload = StemPayload {
            token: None,
            task: "gen_stem".to_string(),
            generation_type: GenerationType::Text,
            title,
            tags,
            negative_tags: String::new(),
            mv: model,
            prompt: String::new(),
            make_instrumental: true,
            metadata: GenerationMetadata::remix(),
            continue_clip_id: song_id.to_string(),
            stem_type_id: kind.type_id(),
            stem_type_group_name: kind.group_name().to_string(),
            stem_task: kind.task().to_string(),
            transaction_uuid: uuid::Uuid::new_v4().to_string(),
        };
        info!(song_id, kind = kind.task(), "Generating stems");

        let response: ClipsResponse = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/generate/v2-web/", self.settings.api.base_url),
                Some(&payload),
                self.settings.timeouts.api_request,
                Some(self.browser_token_header()?),
            )
            .await?;
        let ids: Vec<String> = response.clips.iter().map(|c| c.id.clone()).collect();

        let mut stems = if wait {
            // No keep-alive between polls here; stem jobs finish fast and
            // the renewals were rate-limited in practice
            self.poll_clips(&ids, false).await?
        } else {
            response.clips.into_iter().map(AudioInfo::from).collect()
        };
        for stem in &mut stems {
            stem.stem_from_id = Some(song_id.to_string());
        }
        Ok(stems)
    }

    /// Stems to completion, then WAV-convert every completed stem.
    ///
    /// Individual conversion failures are tolerated; the call fails only
    /// when zero stems convert.
    pub async fn download_stems_wav(&self, song_id: &str, kind: StemKind) -> Result<Vec<StemWav>> {
        require_str(song_id, "song_id")?;

        let stems = self.generate_stems(song_id, kind, true).await?;
        let completed: Vec<&AudioInfo> =
            stems.iter().filter(|s| s.status.is_success()).collect();
        if completed.is_empty() {
            return Err(Error::internal("no stems were successfully generated"));
        }

        info!(count = completed.len(), "Converting stems to WAV");
        let mut results = Vec::new();
        for stem in completed {
            match self.download_wav(&stem.id).await {
                Ok(wav) => results.push(StemWav {
                    id: stem.id.clone(),
                    title: stem.title.clone(),
                    wav_url: wav.wav_url.unwrap_or_default(),
                    audio_url: stem.audio_url.clone(),
                    stem_from_id: song_id.to_string(),
                }),
                Err(e) => {
                    warn!(stem_id = %stem.id, error = %e, "Stem WAV conversion failed")
                }
            }
        }
        if results.is_empty() {
            return Err(Error::internal("failed to convert any stems to WAV"));
        }
        Ok(results)
    }

    /// Kick off WAV conversion for a clip
    pub async fn convert_to_wav(&self, song_id: &str) -> Result<WavResult> {
        require_str(song_id, "song_id")?;
        self.keep_alive(false).await?;
        let response: WavFileResponse = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/gen/{}/convert_wav/", self.settings.api.base_url, song_id),
                Some(&serde_json::json!({})),
                self.settings.timeouts.api_feed,
                None,
            )
            .await?;
        Ok(WavResult {
            wav_url: response.resolve_url().map(str::to_string),
            status: response.status.or_else(|| Some("converting".to_string())),
        })
    }

    /// Fetch the WAV URL, polling until it appears when `wait` is set.
    ///
    /// Unlike generation polling there is no meaningful partial result, so
    /// an exhausted budget is a hard [`Error::Timeout`].
    pub async fn get_wav_file(&self, song_id: &str, wait: bool) -> Result<WavResult> {
        require_str(song_id, "song_id")?;
        self.keep_alive(false).await?;

        let url = format!("{}/api/gen/{}/wav_file/", self.settings.api.base_url, song_id);
        if !wait {
            let response: WavFileResponse = self
                .session
                .request_json::<WavFileResponse, ()>(
                    Method::GET,
                    &url,
                    None,
                    self.settings.timeouts.api_feed,
                    None,
                )
                .await?;
            return Ok(WavResult {
                wav_url: response.resolve_url().map(str::to_string),
                status: response.status,
            });
        }

        let started = Instant::now();
        while started.elapsed() < self.settings.timeouts.wav_wait_max {
            let response: WavFileResponse = self
                .session
                .request_json::<WavFileResponse, ()>(
                    Method::GET,
                    &url,
                    None,
                    self.settings.timeouts.api_feed,
                    None,
                )
                .await?;
            if let Some(wav_url) = response.resolve_url() {
                debug!(song_id, "WAV file ready");
                return Ok(WavResult {
                    wav_url: Some(wav_url.to_string()),
                    status: Some("complete".to_string()),
                });
            }
            tokio::time::sleep(self.settings.timeouts.wav_poll_interval).await;
        }
        Err(Error::timeout("WAV conversion did not finish in time"))
    }

    /// Initiate conversion and wait for the WAV URL
    pub async fn download_wav(&self, song_id: &str) -> Result<WavResult> {
        require_str(song_id, "song_id")?;
        self.convert_to_wav(song_id).await?;
        let result = self.get_wav_file(song_id, true).await?;
        if result.wav_url.is_none() {
            return Err(Error::timeout("no WAV URL was produced"));
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Personas

    /// Extract the vocal track of a clip for persona creation
    pub async fn extract_vox_stem(
        &self,
        clip_id: &str,
        vocal_start_s: f64,
        vocal_end_s: f64,
    ) -> Result<VoxStem> {
        require_str(clip_id, "clip_id")?;
        require_offset(vocal_start_s, "vocal_start_s")?;
        require_offset(vocal_end_s, "vocal_end_s")?;
        if vocal_end_s <= vocal_start_s {
            return Err(Error::validation(
                "vocal_end_s",
                "must be greater than vocal_start_s",
            ));
        }
        self.keep_alive(false).await?;

        info!(clip_id, vocal_start_s, vocal_end_s, "Extracting vox stem");
        let response: VoxStemResponse = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/clip/{}/vox-stem", self.settings.api.base_url, clip_id),
                Some(&serde_json::json!({
                    "vocal_start_s": vocal_start_s,
                    "vocal_end_s": vocal_end_s,
                })),
                self.settings.timeouts.api_persona,
                None,
            )
            .await?;
        let vox_audio_id = response
            .vox_audio_id()
            .ok_or_else(|| Error::internal("vox stem response carried no audio id"))?
            .to_string();
        Ok(VoxStem {
            vox_audio_id,
            clip_id: clip_id.to_string(),
        })
    }

    /// Create a voice persona from a clip. Vox sample fields are included
    /// only when an extracted vox-stem id is attached.
    pub async fn create_persona(&self, request: CreatePersonaRequest) -> Result<PersonaInfo> {
        require_str(&request.clip_id, "clip_id")?;
        require_str(&request.name, "name")?;
        self.keep_alive(false).await?;

        let payload = CreatePersonaPayload {
            root_clip_id: request.clip_id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            is_public: request.is_public,
            persona_type: "vox".to_string(),
            clips: vec![request.clip_id.clone()],
            vox_audio_id: request.vox_audio_id.clone(),
            vocal_start_s: request.vox_audio_id.as_ref().map(|_| request.vocal_start_s),
            vocal_end_s: request.vox_audio_id.as_ref().map(|_| request.vocal_end_s),
            user_input_styles: request.user_input_styles.clone(),
        };
        info!(clip_id = %request.clip_id, "Creating persona");

        // The record may arrive nested under "persona" or flat
        let value: serde_json::Value = self
            .session
            .request_json(
                Method::POST,
                &format!("{}/api/persona/create/", self.settings.api.base_url),
                Some(&payload),
                self.settings.timeouts.api_persona,
                None,
            )
            .await?;
        let record_value = value.get("persona").cloned().unwrap_or(value);
        let record: PersonaRecord = serde_json::from_value(record_value)?;

        let mut info = PersonaInfo::from(record);
        if info.root_clip_id.is_none() {
            info.root_clip_id = Some(request.clip_id);
        }
        if info.vox_audio_id.is_none() {
            info.vox_audio_id = request.vox_audio_id;
        }
        info.is_owned = true;
        Ok(info)
    }

    /// List the account's personas, paginated
    pub async fn get_personas(&self, page: u32) -> Result<PersonaPage> {
        self.keep_alive(false).await?;
        let raw: PersonaListResponse = self
            .session
            .request_json::<PersonaListResponse, ()>(
                Method::GET,
                &format!(
                    "{}/api/persona/get-personas/?page={}",
                    self.settings.api.base_url, page
                ),
                None,
                self.settings.timeouts.api_persona,
                None,
            )
            .await?;
        Ok(raw.into())
    }

    /// One persona by id
    pub async fn get_persona(&self, persona_id: &str) -> Result<PersonaInfo> {
        require_str(persona_id, "persona_id")?;
        self.keep_alive(false).await?;
        let raw: PersonaResponse = self
            .session
            .request_json::<PersonaResponse, ()>(
                Method::GET,
                &format!(
                    "{}/api/persona/get-persona/{}/",
                    self.settings.api.base_url, persona_id
                ),
                None,
                self.settings.timeouts.api_persona,
                None,
            )
            .await?;
        Ok(raw.persona.into())
    }

    /// Persona detail with one page of its clips
    pub async fn get_persona_paginated(
        &self,
        persona_id: &str,
        page: u32,
    ) -> Result<PersonaDetailResponse> {
        require_str(persona_id, "persona_id")?;
        self.keep_alive(false).await?;
        self.session
            .request_json::<PersonaDetailResponse, ()>(
                Method::GET,
                &format!(
                    "{}/api/persona/get-persona-paginated/{}/?page={}",
                    self.settings.api.base_url, persona_id, page
                ),
                None,
                self.settings.timeouts.api_persona,
                None,
            )
            .await
    }

    /// Trash a persona, or restore it with `undo`
    pub async fn delete_persona(&self, persona_id: &str, undo: bool) -> Result<()> {
        require_str(persona_id, "persona_id")?;
        self.keep_alive(false).await?;
        info!(persona_id, undo, "Updating persona trash state");
        let _: serde_json::Value = self
            .session
            .request_json(
                Method::PUT,
                &format!(
                    "{}/api/persona/trash-persona/{}/?undo={}&hide=false",
                    self.settings.api.base_url, persona_id, undo
                ),
                Some(&serde_json::json!({})),
                self.settings.timeouts.api_persona,
                None,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------

    /// Browser-identity header some endpoints require: a JSON envelope
    /// around a base64 timestamp.
    fn browser_token_header(&self) -> Result<HeaderMap> {
        let inner = serde_json::json!({"timestamp": chrono::Utc::now().timestamp_millis()});
        let token = BASE64.encode(inner.to_string());
        let value = serde_json::json!({"token": token}).to_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            "Browser-Token",
            HeaderValue::from_str(&value)
                .map_err(|e| Error::internal(format!("browser token header: {}", e)))?,
        );
        Ok(headers)
    }
}

fn require_str(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(name, "must be a non-empty string"));
    }
    Ok(())
}

fn optional_str(value: Option<&str>, name: &str) -> Result<()> {
    match value {
        Some(v) => require_str(v, name),
        None => Ok(()),
    }
}

fn require_offset(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(name, "must be a non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_str() {
        assert!(require_str("ok", "x").is_ok());
        let err = require_str("  ", "prompt").unwrap_err();
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn test_optional_str() {
        assert!(optional_str(None, "model").is_ok());
        assert!(optional_str(Some("chirp"), "model").is_ok());
        assert!(optional_str(Some(""), "model").is_err());
    }

    #[test]
    fn test_require_offset() {
        assert!(require_offset(0.0, "continue_at").is_ok());
        assert!(require_offset(42.5, "continue_at").is_ok());
        assert!(require_offset(-1.0, "continue_at").is_err());
        assert!(require_offset(f64::NAN, "continue_at").is_err());
    }
}
