//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here.

use claim_audit::adapters::ai::{MockAiAdapter, OpenAiAdapter};
use claim_audit::adapters::persistence::SqliteRepo;
use claim_audit::adapters::ui::tui::TuiInputPort;
use claim_audit::ports::{AiPort, AnalysisSink, ClaimSource, ImportSink, InputPort, ReviewSource};
use claim_audit::shared::config::AppConfig;
use claim_audit::usecases::{AnalysisService, ImportService};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    claim_audit::adapters::ui::init_ui();

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let data_path = cfg.data_dir_or_default();
    tokio::fs::create_dir_all(&data_path)
        .await
        .map_err(|e| anyhow::anyhow!("create data dir: {}", e))?;
    let data_dir_abs = data_path
        .canonicalize()
        .unwrap_or_else(|_| data_path.clone());
    info!(path = %data_dir_abs.display(), "data directory");

    // --- Persistence ---
    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let reviews: Arc<dyn ReviewSource> = Arc::clone(&sqlite_repo) as Arc<dyn ReviewSource>;
    let claims: Arc<dyn ClaimSource> = Arc::clone(&sqlite_repo) as Arc<dyn ClaimSource>;
    let sink: Arc<dyn AnalysisSink> = Arc::clone(&sqlite_repo) as Arc<dyn AnalysisSink>;
    let import_sink: Arc<dyn ImportSink> = Arc::clone(&sqlite_repo) as Arc<dyn ImportSink>;

    // --- AI adapter ---
    let ai_adapter: Arc<dyn AiPort> = if cfg.is_ai_configured() {
        info!(
            model = %cfg.ai_model_or_default(),
            url = %cfg.ai_api_url_or_default(),
            "AI analysis enabled with OpenAI adapter"
        );
        Arc::new(
            OpenAiAdapter::new(
                cfg.ai_api_url_or_default(),
                cfg.ai_api_key().unwrap_or_default(),
                cfg.ai_model_or_default(),
                cfg.ai_timeout_or_default(),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        )
    } else {
        warn!("CLAIM_AUDIT_AI_API_KEY not set, using mock AI adapter");
        Arc::new(MockAiAdapter::new())
    };

    // --- Services ---
    let settings = cfg.analysis_settings();
    info!(
        chunk_size = settings.chunk_policy.batch_size,
        chunk_threshold = settings.chunk_policy.single_chunk_threshold,
        max_concurrency = settings.max_concurrency,
        max_attempts = settings.retry.max_attempts,
        score_floor = settings.score_floor,
        "pipeline settings"
    );
    let analysis_service = Arc::new(AnalysisService::new(
        Arc::clone(&reviews),
        claims,
        ai_adapter,
        sink,
        settings,
        cfg.reports_dir(),
    ));
    let import_service = Arc::new(ImportService::new(import_sink));

    // --- Ctrl+C: cancel in-flight runs; the menu exits afterwards ---
    let shutdown = analysis_service.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight analysis");
            shutdown.cancel();
        }
    });

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        reviews,
        Arc::clone(&analysis_service),
        import_service,
    ));

    // --- Run (main menu -> Import / Analyze / Contradictions / Evaluate) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
