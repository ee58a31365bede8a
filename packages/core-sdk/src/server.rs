use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, get_service, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::shell::{self, AppState, Clients, Notice, QueryOutcome};
use crate::{db, telemetry};

#[derive(Clone)]
struct ServerState {
    config: Arc<AppConfig>,
    clients: Clients,
}

/**
 * \brief 启动本地 HTTP 服务，提供表单页面与 API。
 * \param addr 监听地址，如 "127.0.0.1:8501"
 */
pub async fn run(addr: &str, config: AppConfig) -> Result<()> {
    let clients = Clients::from_config(&config);
    let app = router(config, clients);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 构建路由；静态目录不存在时只提供 API。
 */
pub fn router(config: AppConfig, clients: Clients) -> Router {
    let static_service =
        get_service(ServeDir::new(config.ui_dir.clone()).append_index_html_on_directories(true));

    let state = ServerState {
        config: Arc::new(config),
        clients,
    };

    Router::new()
        .route("/api/credentials", get(get_credentials).post(save_credentials))
        .route("/api/search", post(search))
        .route("/api/health", get(health_check))
        .fallback_service(static_service)
        .with_state(state)
}

#[derive(Serialize, Debug)]
struct CredentialsView {
    /** \brief 遮蔽后的 API Key */
    api_key: String,
    endpoint_url: String,
    /** \brief 是否来自已保存记录（否则为默认值） */
    saved: bool,
}

#[derive(Deserialize, Debug)]
struct CredentialsInput {
    api_key: String,
    endpoint_url: String,
}

#[derive(Serialize, Debug)]
struct SaveResponse {
    notice: Notice,
}

#[derive(Deserialize, Debug)]
struct SearchRequest {
    query: String,
    /** \brief 未保存的表单值，缺省时使用最近保存的凭据。 */
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    endpoint_url: Option<String>,
}

fn internal_err<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn open_store(config: &AppConfig) -> Result<rusqlite::Connection, (StatusCode, String)> {
    let conn = db::open_db(&config.db_path).map_err(internal_err)?;
    db::migrate(&conn).map_err(internal_err)?;
    Ok(conn)
}

/**
 * \brief 读取预填值。
 */
async fn get_credentials(
    State(state): State<ServerState>,
) -> Result<Json<CredentialsView>, (StatusCode, String)> {
    let conn = open_store(&state.config)?;
    let latest = db::get_latest_credentials(&conn).map_err(internal_err)?;
    let view = match latest {
        Some(rec) => CredentialsView {
            api_key: telemetry::mask_secret(&rec.api_key),
            endpoint_url: rec.endpoint_url,
            saved: true,
        },
        None => {
            let defaults = AppState::defaults();
            CredentialsView {
                api_key: defaults.api_key,
                endpoint_url: defaults.endpoint_url,
                saved: false,
            }
        }
    };
    Ok(Json(view))
}

/**
 * \brief 保存 API Key 与部署地址。
 */
async fn save_credentials(
    State(state): State<ServerState>,
    Json(input): Json<CredentialsInput>,
) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    let conn = open_store(&state.config)?;
    let notice = shell::save_state(
        &conn,
        &AppState {
            api_key: input.api_key,
            endpoint_url: input.endpoint_url,
        },
    )
    .map_err(internal_err)?;
    Ok(Json(SaveResponse { notice }))
}

/**
 * \brief 执行一次查询；业务失败以 notices 返回，HTTP 状态保持 200。
 */
async fn search(
    State(state): State<ServerState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<QueryOutcome>, (StatusCode, String)> {
    let form = {
        let conn = open_store(&state.config)?;
        let mut form = shell::load_state(&conn).map_err(internal_err)?;
        if let Some(key) = req.api_key.filter(|k| !k.trim().is_empty()) {
            form.api_key = key;
        }
        if let Some(url) = req.endpoint_url.filter(|u| !u.trim().is_empty()) {
            form.endpoint_url = url;
        }
        form
    };
    let outcome = state.clients.run_query(&form, &req.query).await;
    Ok(Json(outcome))
}

/**
 * \brief 健康检查：确认凭据库可读。
 */
async fn health_check(
    State(state): State<ServerState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let conn = open_store(&state.config)?;
    match db::get_latest_credentials(&conn) {
        Ok(latest) => Ok(Json(serde_json::json!({
            "ok": true,
            "has_credentials": latest.is_some(),
            "token_url": state.clients.identity.token_url(),
        }))),
        Err(e) => Ok(Json(serde_json::json!({
            "ok": false,
            "error": e.to_string(),
        }))),
    }
}
