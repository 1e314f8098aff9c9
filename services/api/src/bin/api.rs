//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{tts, DbAdapter, FsArtifactStore, OpenAiExcuseAdapter, OpenAiTtsAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use excuse_core::{
    BelievabilityScorer, ExcuseGenerator, ProofRenderer, ScoringPolicy, TemplateStore,
    VoiceRenderer,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url, 5).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Load Templates & Scoring Policy ---
    let templates = match &config.templates_path {
        Some(path) => {
            info!(path = %path.display(), "Loading proof template overrides");
            TemplateStore::builtin_with_overrides(path)?
        }
        None => TemplateStore::builtin(),
    };
    let policy = match &config.scoring_policy_path {
        Some(path) => {
            info!(path = %path.display(), "Loading scoring policy");
            ScoringPolicy::from_json_file(path)?
        }
        None => ScoringPolicy::default(),
    };

    // --- 4. Initialize Service Adapters ---
    let artifacts = Arc::new(FsArtifactStore::new(&config.audio_dir, &config.proof_dir));
    let proofs = Arc::new(ProofRenderer::new(Arc::new(templates)));

    let (generator, voice) = match &config.openai_api_key {
        Some(api_key) => {
            let excuse_adapter = Arc::new(OpenAiExcuseAdapter::new(
                api_key.clone(),
                config.openai_api_base.clone(),
                config.excuse_model.clone(),
                config.temperature,
                config.request_timeout,
            )?);
            let generator = ExcuseGenerator::new(
                excuse_adapter,
                db_adapter.clone(),
                BelievabilityScorer::new(policy),
                config.generation_settings(),
            );

            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key.expose_secret())
                .with_api_base(config.openai_api_base.clone());
            let tts_adapter = Arc::new(OpenAiTtsAdapter::new(
                Client::with_config(openai_config),
                tts::speech_model(&config.tts_model)?,
                tts::voice(&config.tts_voice)?,
                config.tts_languages.clone(),
            ));
            let voice = VoiceRenderer::new(tts_adapter, artifacts.clone(), config.request_timeout);

            (Some(Arc::new(generator)), Some(Arc::new(voice)))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; excuse generation and voice are disabled");
            (None, None)
        }
    };

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        history: db_adapter,
        artifacts,
        proofs,
        generator,
        voice,
    });

    // --- 6. Create the Web Router ---
    let app = router(app_state);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
