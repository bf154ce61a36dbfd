//! Generation protocol integration tests
//!
//! Every test runs against a wiremock upstream with a stubbed token
//! provider, so the full HTTP flow is exercised without a browser.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use suno_client::{ClipStatus, CustomGenerateRequest, Error, ExtendRequest, StemKind};

use common::helpers;

#[tokio::test]
async fn test_generate_polls_feed_to_completion() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2/"))
        .and(header("Authorization", "Bearer captured-bearer"))
        .and(body_partial_json(json!({
            "gpt_description_prompt": "a dreamy synthwave track",
            "token": "P1_challenge",
            "mv": "chirp-crow",
            "generation_type": "TEXT"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("clip-1", "submitted", None),
                helpers::clip_json("clip-2", "submitted", None)
            ]
        })))
        .mount(&server)
        .await;

    // First poll sees the clips still in flight, the second sees them done
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "clip-1,clip-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("clip-1", "queued", None),
                helpers::clip_json("clip-2", "queued", None)
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("clip-1", "complete", Some("https://cdn.test/clip-1.mp3")),
                helpers::clip_json("clip-2", "complete", Some("https://cdn.test/clip-2.mp3"))
            ]
        })))
        .mount(&server)
        .await;

    let client = helpers::stub_client(&server).await;
    let clips = client
        .generate("a dreamy synthwave track", false, None, true)
        .await
        .unwrap();

    assert_eq!(clips.len(), 2);
    assert!(clips.iter().all(|c| c.status.is_success()));
    assert_eq!(
        clips[0].audio_url.as_deref(),
        Some("https://cdn.test/clip-1.mp3")
    );
}

#[tokio::test]
async fn test_extend_submits_without_waiting() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2/"))
        .and(body_partial_json(json!({
            "task": "extend",
            "generation_type": "EXTEND",
            "continue_clip_id": "clip-7",
            "continue_at": 42.5,
            "prompt": "more of the same"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("extended-1", "submitted", None)]
        })))
        .mount(&server)
        .await;

    let client = helpers::stub_client(&server).await;
    let clips = client
        .extend(ExtendRequest::new("clip-7", "more of the same", 42.5))
        .await
        .unwrap();

    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].id, "extended-1");
    assert_eq!(clips[0].status, ClipStatus::Submitted);
}

#[tokio::test]
async fn test_persona_generation_routes_to_web_endpoint() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2-web/"))
        .and(header_exists("Browser-Token"))
        .and(body_partial_json(json!({
            "task": "vox",
            "persona_id": "p-1",
            "artist_clip_id": "c-1",
            "override_fields": ["prompt", "tags"],
            "token": "P1_challenge"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("persona-1", "submitted", None)]
        })))
        .mount(&server)
        .await;

    let client = helpers::stub_client(&server).await;
    let request = CustomGenerateRequest::new("[Verse] la la la", "synthwave", "Persona Song")
        .with_persona_id("p-1")
        .with_artist_clip_id("c-1");
    let clips = client.custom_generate(request).await.unwrap();

    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].id, "persona-1");
}

#[tokio::test]
async fn test_persona_without_artist_clip_is_rejected() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    let client = helpers::stub_client(&server).await;
    let request = CustomGenerateRequest::new("[Verse] la la la", "synthwave", "Persona Song")
        .with_persona_id("p-1");
    let err = client.custom_generate(request).await.unwrap_err();

    assert!(matches!(err, Error::Validation(..)));
    assert!(err.to_string().contains("artist_clip_id"));
}

#[tokio::test]
async fn test_polling_budget_returns_last_snapshot() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("slow-1", "submitted", None)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("slow-1", "queued", None)]
        })))
        .mount(&server)
        .await;

    let mut settings = helpers::test_settings(&server);
    settings.timeouts.audio_generation_max = Duration::from_millis(300);
    let client = helpers::stub_client_with(&server, settings).await;

    // Deadline elapses while the clip is still queued; the caller gets the
    // last snapshot instead of an error
    let clips = client.generate("never finishes", false, None, true).await.unwrap();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].status, ClipStatus::Queued);
}

#[tokio::test]
async fn test_stems_wav_tolerates_partial_conversion_failure() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    // Source clip lookup feeding title and model into the stem payload
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "song-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("song-1", "complete", Some("https://cdn.test/song-1.mp3"))]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2-web/"))
        .and(header_exists("Browser-Token"))
        .and(body_partial_json(json!({
            "task": "gen_stem",
            "continue_clip_id": "song-1",
            "stem_type_group_name": "Two",
            "stem_task": "two",
            "make_instrumental": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("stem-1", "submitted", None),
                helpers::clip_json("stem-2", "submitted", None)
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "stem-1,stem-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("stem-1", "complete", Some("https://cdn.test/stem-1.mp3")),
                helpers::clip_json("stem-2", "complete", Some("https://cdn.test/stem-2.mp3"))
            ]
        })))
        .mount(&server)
        .await;

    // First stem converts, the second fails at the conversion kickoff
    Mock::given(method("POST"))
        .and(path("/api/gen/stem-1/convert_wav/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "converting"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gen/stem-1/wav_file/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wav_file_url": "https://cdn.test/stem-1.wav"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/gen/stem-2/convert_wav/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("conversion backend down"))
        .mount(&server)
        .await;

    let client = helpers::stub_client(&server).await;
    let stems = client.download_stems_wav("song-1", StemKind::Two).await.unwrap();

    assert_eq!(stems.len(), 1);
    assert_eq!(stems[0].id, "stem-1");
    assert_eq!(stems[0].wav_url, "https://cdn.test/stem-1.wav");
    assert_eq!(stems[0].stem_from_id, "song-1");
}

#[tokio::test]
async fn test_stems_wav_skips_errored_stem_entirely() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "song-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("song-4", "complete", Some("https://cdn.test/song-4.mp3"))]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2-web/"))
        .and(body_partial_json(json!({
            "task": "gen_stem",
            "continue_clip_id": "song-4",
            "stem_type_group_name": "All",
            "stem_task": "all"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("stem-a", "submitted", None),
                helpers::clip_json("stem-b", "submitted", None),
                helpers::clip_json("stem-c", "submitted", None),
                helpers::clip_json("stem-d", "submitted", None)
            ]
        })))
        .mount(&server)
        .await;

    // Three stems finish, one lands on a hard failure. The mix is never
    // uniformly terminal, so polling runs its budget out and hands the
    // caller the mixed snapshot.
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "stem-a,stem-b,stem-c,stem-d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [
                helpers::clip_json("stem-a", "complete", Some("https://cdn.test/stem-a.mp3")),
                helpers::clip_json("stem-b", "complete", Some("https://cdn.test/stem-b.mp3")),
                helpers::clip_json("stem-c", "complete", Some("https://cdn.test/stem-c.mp3")),
                helpers::clip_json("stem-d", "error", None)
            ]
        })))
        .mount(&server)
        .await;

    for stem in ["stem-a", "stem-b", "stem-c"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/gen/{stem}/convert_wav/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "converting"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/gen/{stem}/wav_file/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wav_file_url": format!("https://cdn.test/{stem}.wav")
            })))
            .mount(&server)
            .await;
    }

    let mut settings = helpers::test_settings(&server);
    settings.timeouts.audio_generation_max = Duration::from_millis(300);
    let client = helpers::stub_client_with(&server, settings).await;

    let stems = client.download_stems_wav("song-4", StemKind::All).await.unwrap();

    assert_eq!(stems.len(), 3);
    let ids: Vec<&str> = stems.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["stem-a", "stem-b", "stem-c"]);
    assert!(stems.iter().all(|s| s.wav_url.ends_with(".wav")));

    // The errored stem never reaches the conversion endpoint
    let conversions = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/gen/stem-d/convert_wav/")
        .count();
    assert_eq!(conversions, 0);
}

#[tokio::test]
async fn test_empty_feed_snapshot_keeps_polling() {
    let server = MockServer::start().await;
    helpers::mount_clerk(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/generate/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("late-1", "submitted", None)]
        })))
        .mount(&server)
        .await;

    // The feed has not indexed the clip yet on the first poll; an empty
    // snapshot must not be mistaken for completion
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .and(query_param("ids", "late-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clips": []})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feed/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [helpers::clip_json("late-1", "complete", Some("https://cdn.test/late-1.mp3"))]
        })))
        .mount(&server)
        .await;

    let client = helpers::stub_client(&server).await;
    let clips = client.generate("a slow-indexing track", false, None, true).await.unwrap();

    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].id, "late-1");
    assert!(clips[0].status.is_success());
}
