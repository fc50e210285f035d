//! Servidor web Axum com WebSocket para inspecionar o pipeline de correferência

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use coref_core::{
    corpus::{demo_document, demo_gold_mentions},
    pipeline::evaluate_report,
    tokenizer::{tokenize_with_mode, Token, TokenizerMode},
    Aligner, BCubed, ClusterAssignment, CorefPipeline, Document, EmptyPartnerPolicy, LexiconOracle, LogProgress,
    PipelineConfig, PipelineEvent,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Estado compartilhado da aplicação
struct AppState {
    pipeline: CorefPipeline,
}

#[derive(Deserialize)]
struct ProcessRequest {
    document: Document,
    /// Pares `(cadeia, menção)`; quando presentes, o relatório vem avaliado.
    #[serde(default)]
    gold: Vec<(String, String)>,
}

#[derive(Serialize)]
struct ProcessResponse {
    report: coref_core::DocumentReport,
    lines: Vec<String>,
    dataset: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluation: Option<coref_core::pipeline::DocumentEvaluation>,
}

/// Dois fluxos de tokens, ou um texto que é tokenizado dos dois jeitos.
#[derive(Deserialize)]
struct AlignRequest {
    #[serde(default)]
    primary: Vec<Token>,
    #[serde(default)]
    secondary: Vec<Token>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct EvaluateRequest {
    predicted: Vec<(String, String)>,
    gold: Vec<(String, String)>,
    #[serde(default)]
    policy: Option<EmptyPartnerPolicy>,
}

#[derive(Deserialize)]
struct BatchRequest {
    documents: Vec<Document>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("COREF_CONFIG") {
        Ok(path) => PipelineConfig::from_path(&path).map_err(|e| {
            error!(path = %path, "configuração inválida: {e}");
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?,
        Err(_) => PipelineConfig::default(),
    };
    let mut pipeline = CorefPipeline::new(config);
    if let Ok(path) = std::env::var("COREF_LEXICON") {
        let raw = std::fs::read_to_string(&path)?;
        let (lexicon, warnings) = LexiconOracle::from_tsv(&raw);
        if !warnings.is_empty() {
            warn!(path = %path, ignoradas = warnings.len(), "linhas do léxico ignoradas");
        }
        info!(path = %path, entradas = lexicon.len(), "léxico morfológico carregado");
        pipeline = pipeline.with_oracle(Arc::new(lexicon));
    }
    let state = Arc::new(AppState { pipeline });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/demo", get(demo_handler))
        .route("/process", post(process_handler))
        .route("/align", post(align_handler))
        .route("/evaluate", post(evaluate_handler))
        .route("/batch", post(batch_handler))
        .route("/ws", get(ws_handler))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    let addr = std::env::var("COREF_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor de correferência iniciado em http://{addr}");
    axum::serve(listener, app).await
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Lê o corpo JSON; qualquer falha vira 400 com a mensagem do serde.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| bad_request(format!("JSON inválido: {e}")))
}

/// Retorna a página principal HTML
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("templates/index.html"))
}

/// Documento de demonstração e suas menções de referência
async fn demo_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "document": demo_document(),
        "gold": demo_gold_mentions(),
    }))
}

/// Processa um documento (sem streaming)
async fn process_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ProcessRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.document.primary.is_empty() {
        return bad_request("Documento vazio");
    }

    let config = state.pipeline.config();
    match state.pipeline.process(&req.document) {
        Ok(report) => {
            let evaluation = (!req.gold.is_empty())
                .then(|| evaluate_report(&report, &req.gold, config.empty_partner_policy));
            Json(ProcessResponse {
                lines: report.render_records(config),
                dataset: report.dataset_rows(config),
                evaluation,
                report,
            })
            .into_response()
        }
        Err(err) => {
            warn!(doc = %req.document.id, error = %err, "documento rejeitado");
            bad_request(err.to_string())
        }
    }
}

/// Alinha dois fluxos de tokens
async fn align_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let mut req: AlignRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if let Some(text) = req.text.as_deref().filter(|t| !t.trim().is_empty()) {
        req.primary = tokenize_with_mode(text, TokenizerMode::Standard);
        req.secondary = tokenize_with_mode(text, TokenizerMode::SplitHyphens);
    }
    if req.primary.is_empty() {
        return bad_request("Fluxo primário vazio");
    }

    let alignment = Aligner::from_config(state.pipeline.config()).align(&req.primary, &req.secondary);
    Json(serde_json::json!({
        "primary": req.primary,
        "secondary": req.secondary,
        "alignment": alignment,
    }))
    .into_response()
}

/// Precisão, revocação e F1 de pares `(cluster, elemento)`
async fn evaluate_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: EvaluateRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.predicted.is_empty() && req.gold.is_empty() {
        return bad_request("Nenhuma atribuição informada");
    }

    let predicted = ClusterAssignment::from_pairs(req.predicted);
    let gold = ClusterAssignment::from_pairs(req.gold);
    let policy = req
        .policy
        .unwrap_or(state.pipeline.config().empty_partner_policy);
    Json(BCubed::new(&predicted, &gold).with_policy(policy).scores()).into_response()
}

/// Processa um lote de documentos em paralelo
async fn batch_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: BatchRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.documents.is_empty() {
        return bad_request("Lote vazio");
    }

    let state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || state.pipeline.run_batch(&req.documents, &LogProgress)).await;
    match result {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            error!("lote interrompido: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "lote interrompido" })),
            )
                .into_response()
        }
    }
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Recebe um documento em JSON (ou texto vazio para o documento de demonstração),
/// executa o pipeline e envia os eventos em sequência
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let document = if text.trim().is_empty() {
                    demo_document()
                } else {
                    match serde_json::from_str::<Document>(&text) {
                        Ok(doc) => doc,
                        Err(e) => {
                            let event = PipelineEvent::Error {
                                message: format!("JSON inválido: {e}"),
                            };
                            if send_event(&mut socket, &event).await.is_err() {
                                return;
                            }
                            continue;
                        }
                    }
                };

                info!(doc = %document.id, tokens = document.primary.len(), "processando via WebSocket");

                // O pipeline é síncrono: roda fora do runtime e os eventos são
                // coletados quando termina
                let (tx, rx) = std::sync::mpsc::channel::<PipelineEvent>();
                let worker = Arc::clone(&state);
                let handle = tokio::task::spawn_blocking(move || {
                    worker.pipeline.process_streaming(&document, tx);
                });
                handle.await.ok();

                let events: Vec<PipelineEvent> = rx.try_iter().collect();
                for event in &events {
                    if send_event(&mut socket, event).await.is_err() {
                        return; // cliente desconectou
                    }
                    // Pequena pausa para animação visual (passo a passo)
                    tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &PipelineEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("evento não serializável: {e}");
            Ok(())
        }
    }
}
