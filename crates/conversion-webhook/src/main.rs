use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod cert_reloader;
mod validator;

use cert_reloader::CertificateReloader;
use validator::SchemaConverter;

#[derive(Clone, Default)]
struct AppState {
    converter: SchemaConverter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversionReview {
    api_version: String,
    kind: String,
    request: ConversionRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversionRequest {
    uid: String,
    desired_api_version: String,
    objects: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversionReviewResponse {
    api_version: String,
    kind: String,
    response: ConversionResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversionResponse {
    uid: String,
    result: ConversionResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    converted_objects: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ConversionResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::aws_lc_rs::default_provider()).ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    loop {
        info!("starting provider schema conversion webhook");

        let state = AppState::default();

        let app = Router::new()
            .route("/convert", post(convert_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::new(state));

        static HEALTH_STARTED: std::sync::Once = std::sync::Once::new();
        HEALTH_STARTED.call_once(|| {
            tokio::spawn(async {
                let health_app = Router::new().route("/health", axum::routing::get(health_handler));
                let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
                info!("health server listening on 0.0.0.0:8080");
                axum::serve(listener, health_app).await.unwrap();
            });
        });

        let cert_reloader = CertificateReloader::new();
        cert_reloader.watch("/etc/certs").await?;

        let tls_config = load_tls_config().await?;

        info!("conversion webhook listening on 0.0.0.0:8443 (HTTPS) with certificate auto-reload");

        let server_handle = tokio::spawn(async move {
            axum_server::bind_rustls("0.0.0.0:8443".parse().unwrap(), tls_config)
                .serve(app.into_make_service())
                .await
        });

        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

            if cert_reloader.needs_restart() {
                info!("certificate rotation detected, restarting server");
                server_handle.abort();
                break;
            }

            if server_handle.is_finished() {
                match server_handle.await {
                    Ok(Ok(())) => {
                        info!("server exited normally");
                        return Ok(());
                    }
                    Ok(Err(e)) => {
                        warn!("server error: {e}");
                        break;
                    }
                    Err(_) => {
                        info!("server aborted for restart");
                        break;
                    }
                }
            }
        }

        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }
}

async fn load_tls_config() -> anyhow::Result<RustlsConfig> {
    Ok(RustlsConfig::from_pem_file("/etc/certs/tls.crt", "/etc/certs/tls.key").await?)
}

async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Json(review): Json<ConversionReview>,
) -> Result<Json<ConversionReviewResponse>, StatusCode> {
    let uid = review.request.uid.clone();
    let desired = review.request.desired_api_version.clone();

    let mut converted = Vec::with_capacity(review.request.objects.len());
    for object in review.request.objects {
        match state.converter.convert(&desired, object) {
            Ok(converted_object) => converted.push(converted_object),
            Err(e) => {
                warn!("conversion failed: {e}");
                return Ok(Json(ConversionReviewResponse {
                    api_version: review.api_version,
                    kind: review.kind,
                    response: ConversionResponse {
                        uid,
                        result: ConversionResult { status: "Failure", message: Some(e.to_string()) },
                        converted_objects: vec![],
                    },
                }));
            }
        }
    }

    Ok(Json(ConversionReviewResponse {
        api_version: review.api_version,
        kind: review.kind,
        response: ConversionResponse {
            uid,
            result: ConversionResult { status: "Success", message: None },
            converted_objects: converted,
        },
    }))
}

async fn health_handler() -> &'static str {
    "healthy"
}
