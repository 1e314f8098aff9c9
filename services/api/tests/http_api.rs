//! End-to-end tests for the REST surface: the real router, the SQLite store and
//! the filesystem artifact store, with the two AI services replaced by fakes.

use api_lib::{
    adapters::{DbAdapter, FsArtifactStore},
    config::Config,
    web::{router, state::AppState},
};
use async_trait::async_trait;
use excuse_core::ports::{
    CompletionRequest, HistoryStore, PortError, PortResult, SpeechSynthesisService,
    TextGenerationService,
};
use excuse_core::{
    BelievabilityScorer, ExcuseFilter, ExcuseGenerator, GeneratedExcuse, GenerationSettings,
    Language, Page, ProofDocument, ProofRenderer, ScoringPolicy, TemplateStore, VoiceClip,
    VoiceRenderer,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

const EXCUSE: &str = "I'm so sorry, my train was cancelled this morning and I could not reach the office in time for the meeting.";

//=========================================================================================
// Fakes
//=========================================================================================

/// Answers completions from a script, one entry per call.
struct ScriptedModel {
    replies: Mutex<VecDeque<PortResult<String>>>,
}

impl ScriptedModel {
    fn with(replies: Vec<PortResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl TextGenerationService for ScriptedModel {
    async fn complete(&self, _request: &CompletionRequest) -> PortResult<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(PortError::EmptyResponse))
    }
}

/// Speaks English and Spanish only.
struct FakeVoice;

#[async_trait]
impl SpeechSynthesisService for FakeVoice {
    fn supports(&self, language: Language) -> bool {
        matches!(language, Language::English | Language::Spanish)
    }

    async fn synthesize(&self, _text: &str, _language: Language) -> PortResult<Vec<u8>> {
        Ok(b"ID3-fake-audio".to_vec())
    }
}

/// Behaves like the real store except that the excuse vanishes before any
/// proof or clip row can reference it.
struct VanishingExcuses(Arc<DbAdapter>);

#[async_trait]
impl HistoryStore for VanishingExcuses {
    async fn create_excuse(&self, excuse: &GeneratedExcuse) -> PortResult<()> {
        self.0.create_excuse(excuse).await
    }
    async fn get_excuse(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse> {
        self.0.get_excuse(excuse_id).await
    }
    async fn list_excuses(&self, filter: &ExcuseFilter) -> PortResult<Page<GeneratedExcuse>> {
        self.0.list_excuses(filter).await
    }
    async fn toggle_favorite(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse> {
        self.0.toggle_favorite(excuse_id).await
    }
    async fn set_favorite(&self, excuse_id: Uuid, favorite: bool) -> PortResult<GeneratedExcuse> {
        self.0.set_favorite(excuse_id, favorite).await
    }
    async fn delete_excuse(&self, excuse_id: Uuid) -> PortResult<()> {
        self.0.delete_excuse(excuse_id).await
    }
    async fn save_proof(&self, proof: &ProofDocument) -> PortResult<()> {
        self.0.delete_excuse(proof.excuse_id).await?;
        self.0.save_proof(proof).await
    }
    async fn list_proofs(&self, excuse_id: Uuid) -> PortResult<Vec<ProofDocument>> {
        self.0.list_proofs(excuse_id).await
    }
    async fn delete_proof(&self, proof_id: Uuid) -> PortResult<()> {
        self.0.delete_proof(proof_id).await
    }
    async fn save_voice_clip(&self, clip: &VoiceClip) -> PortResult<()> {
        self.0.delete_excuse(clip.excuse_id).await?;
        self.0.save_voice_clip(clip).await
    }
    async fn list_voice_clips(&self, excuse_id: Uuid) -> PortResult<Vec<VoiceClip>> {
        self.0.list_voice_clips(excuse_id).await
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct TestApp {
    base: String,
    client: reqwest::Client,
    dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Files currently stored in an artifact directory.
    fn files_in(&self, name: &str) -> usize {
        match std::fs::read_dir(self.dir.path().join(name)) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    async fn generate(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/excuses"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn generate_ok(&self) -> Value {
        let response = self
            .generate(json!({"scenario": "work", "tone": "apologetic", "language": "en"}))
            .await;
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }
}

async fn spawn_app(model: Option<Arc<ScriptedModel>>) -> TestApp {
    spawn_app_with(model, false).await
}

async fn spawn_app_with(model: Option<Arc<ScriptedModel>>, vanishing: bool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let audio_dir = dir.path().join("audio").to_string_lossy().into_owned();
    let proof_dir = dir.path().join("proofs").to_string_lossy().into_owned();
    let config = Config::from_lookup(|key| match key {
        "AUDIO_DIR" => Some(audio_dir.clone()),
        "PROOF_DIR" => Some(proof_dir.clone()),
        _ => None,
    })
    .unwrap();

    let db = Arc::new(DbAdapter::in_memory().await.unwrap());
    db.run_migrations().await.unwrap();
    let artifacts = Arc::new(FsArtifactStore::new(&config.audio_dir, &config.proof_dir));

    let generator = model.map(|model| {
        Arc::new(ExcuseGenerator::new(
            model,
            db.clone(),
            BelievabilityScorer::new(ScoringPolicy::default()),
            GenerationSettings::default(),
        ))
    });
    let voice = VoiceRenderer::new(Arc::new(FakeVoice), artifacts.clone(), Duration::from_secs(5));
    let history: Arc<dyn HistoryStore> = if vanishing {
        Arc::new(VanishingExcuses(db))
    } else {
        db
    };

    let state = Arc::new(AppState {
        config: Arc::new(config),
        history,
        artifacts,
        proofs: Arc::new(ProofRenderer::new(Arc::new(TemplateStore::builtin()))),
        generator,
        voice: Some(Arc::new(voice)),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        dir,
    }
}

fn texts(n: usize) -> Arc<ScriptedModel> {
    ScriptedModel::with((0..n).map(|_| Ok(EXCUSE.to_string())).collect())
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app(None).await;
    let body: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn generated_excuse_is_scored_stored_and_listed() {
    let app = spawn_app(Some(texts(1))).await;

    let excuse = app.generate_ok().await;
    assert_eq!(excuse["text"], EXCUSE);
    assert_eq!(excuse["scenario"], "work");
    assert_eq!(excuse["is_favorite"], false);
    let score = excuse["believability_score"].as_u64().unwrap();
    assert!(score <= 100);

    let id = excuse["id"].as_str().unwrap();
    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/excuses/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], excuse["id"]);
    assert_eq!(fetched["text"], excuse["text"]);
    assert_eq!(fetched["believability_score"], score);

    let list: Value = app
        .client
        .get(app.url("/api/excuses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["id"], id);
}

#[tokio::test]
async fn unknown_codes_are_rejected_with_400() {
    let app = spawn_app(Some(texts(1))).await;
    for body in [
        json!({"scenario": "space", "tone": "casual", "language": "en"}),
        json!({"scenario": "work", "tone": "smug", "language": "en"}),
        json!({"scenario": "work", "tone": "casual", "language": "xx"}),
    ] {
        let response = app.generate(body).await;
        assert_eq!(response.status(), 400);
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["kind"], "invalid_input");
    }
}

#[tokio::test]
async fn rate_limit_is_passed_through_and_nothing_is_stored() {
    let model = ScriptedModel::with(vec![Err(PortError::RateLimited {
        retry_after_secs: Some(7),
    })]);
    let app = spawn_app(Some(model)).await;

    let response = app
        .generate(json!({"scenario": "school", "tone": "formal", "language": "en"}))
        .await;
    assert_eq!(response.status(), 429);
    assert_eq!(response.headers()["retry-after"], "7");
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["retry_after_secs"], 7);

    let list: Value = app
        .client
        .get(app.url("/api/excuses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn blank_completion_is_a_bad_gateway() {
    let app = spawn_app(Some(ScriptedModel::with(vec![Ok("  \"\"  ".to_string())]))).await;
    let response = app
        .generate(json!({"scenario": "work", "tone": "casual", "language": "en"}))
        .await;
    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn generation_without_a_model_is_unavailable() {
    let app = spawn_app(None).await;
    let response = app
        .generate(json!({"scenario": "work", "tone": "casual", "language": "en"}))
        .await;
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn toggling_favorite_twice_restores_the_flag() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    let url = app.url(&format!("/api/excuses/{id}/favorite"));

    let first: Value = app.client.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["is_favorite"], true);
    let second: Value = app.client.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["is_favorite"], false);

    for _ in 0..2 {
        let set: Value = app
            .client
            .put(&url)
            .json(&json!({"favorite": true}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(set["is_favorite"], true);
    }
}

#[tokio::test]
async fn listing_filters_by_favorite_and_paginates() {
    let app = spawn_app(Some(texts(3))).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(app.generate_ok().await["id"].as_str().unwrap().to_string());
    }
    app.client
        .post(app.url(&format!("/api/excuses/{}/favorite", ids[0])))
        .send()
        .await
        .unwrap();

    let favorites: Value = app
        .client
        .get(app.url("/api/excuses?favorite=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(favorites["total"], 1);
    assert_eq!(favorites["items"][0]["id"], ids[0].as_str());

    let page: Value = app
        .client
        .get(app.url("/api/excuses?page=2&per_page=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    // Newest first, so the last page holds the oldest excuse.
    assert_eq!(page["items"][0]["id"], ids[0].as_str());

    let response = app
        .client
        .get(app.url("/api/excuses?language=xx"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn proof_is_rendered_stored_and_downloadable() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .post(app.url(&format!("/api/excuses/{id}/proofs")))
        .json(&json!({
            "document_type": "email",
            "fields": {"name": "Alex", "date": "2024-01-01"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let proof: Value = response.json().await.unwrap();
    let text = proof["rendered_text"].as_str().unwrap();
    assert!(text.contains("Alex"));
    assert!(text.contains("2024-01-01"));
    assert!(text.contains(EXCUSE));
    assert_eq!(proof["language"], "en");

    let download = app
        .client
        .get(app.url(proof["download_url"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(download.text().await.unwrap(), text);

    let listed: Value = app
        .client
        .get(app.url(&format!("/api/excuses/{id}/proofs")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let proof_id = proof["id"].as_str().unwrap();
    let deleted = app
        .client
        .delete(app.url(&format!("/api/proofs/{proof_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);
}

#[tokio::test]
async fn proof_errors_map_to_client_statuses() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    let url = app.url(&format!("/api/excuses/{id}/proofs"));

    let missing = app
        .client
        .post(&url)
        .json(&json!({"document_type": "email", "fields": {"name": "Alex"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 422);
    let error: Value = missing.json().await.unwrap();
    assert_eq!(error["kind"], "missing_field");

    let unknown = app
        .client
        .post(&url)
        .json(&json!({"document_type": "invoice", "fields": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 400);

    let bad_language = app
        .client
        .post(&url)
        .json(&json!({"document_type": "email", "language": "xx", "fields": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_language.status(), 400);
}

#[tokio::test]
async fn template_fields_exclude_excuse_derived_placeholders() {
    let app = spawn_app(None).await;
    let body: Value = app
        .client
        .get(app.url("/api/templates/email/en"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["required_fields"], json!(["date", "name"]));
}

#[tokio::test]
async fn voice_clip_is_stored_and_served() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();

    // No body: the excuse's own language is used.
    let response = app
        .client
        .post(app.url(&format!("/api/excuses/{id}/voice")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let clip: Value = response.json().await.unwrap();
    assert_eq!(clip["language"], "en");

    let audio = app
        .client
        .get(app.url(clip["audio_url"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(audio.status(), 200);
    assert_eq!(audio.bytes().await.unwrap().as_ref(), b"ID3-fake-audio");

    let clips: Value = app
        .client
        .get(app.url(&format!("/api/excuses/{id}/voice")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clips.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn voice_in_an_unsupported_language_is_422() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    for language in ["de", "xx"] {
        let response = app
            .client
            .post(app.url(&format!("/api/excuses/{id}/voice")))
            .json(&json!({"language": language}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["kind"], "unsupported_language");
    }
}

#[tokio::test]
async fn deleting_an_excuse_removes_it_and_its_proofs() {
    let app = spawn_app(Some(texts(1))).await;
    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    app.client
        .post(app.url(&format!("/api/excuses/{id}/proofs")))
        .json(&json!({"document_type": "receipt", "fields": {"name": "Alex", "date": "2024-01-01"}}))
        .send()
        .await
        .unwrap();

    let deleted = app
        .client
        .delete(app.url(&format!("/api/excuses/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    for path in [format!("/api/excuses/{id}"), format!("/api/excuses/{id}/proofs")] {
        let response = app.client.get(app.url(&path)).send().await.unwrap();
        assert_eq!(response.status(), 404);
    }
    let again = app
        .client
        .delete(app.url(&format!("/api/excuses/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn failed_saves_leave_no_orphaned_files() {
    let app = spawn_app_with(Some(texts(2)), true).await;

    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    let proof = app
        .client
        .post(app.url(&format!("/api/excuses/{id}/proofs")))
        .json(&json!({"document_type": "email", "fields": {"name": "Alex", "date": "2024-01-01"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(proof.status(), 404);
    assert_eq!(app.files_in("proofs"), 0);

    let id = app.generate_ok().await["id"].as_str().unwrap().to_string();
    let voice = app
        .client
        .post(app.url(&format!("/api/excuses/{id}/voice")))
        .send()
        .await
        .unwrap();
    assert_eq!(voice.status(), 404);
    assert_eq!(app.files_in("audio"), 0);
}
