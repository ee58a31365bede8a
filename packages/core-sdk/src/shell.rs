use rusqlite::Connection;
use serde::Serialize;

use crate::auth::IdentityClient;
use crate::config::{AppConfig, DEFAULT_ENDPOINT_URL};
use crate::error::{SdkError, SdkResult};
use crate::models::SearchResult;
use crate::search::{self, QueryClient};
use crate::{db, render, telemetry};

/**
 * \brief 表单当前值，显式传入每个动作。
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub api_key: String,
    pub endpoint_url: String,
}

impl AppState {
    /**
     * \brief 未保存过凭据时的默认值：空 Key + 部署地址模板。
     */
    pub fn defaults() -> Self {
        Self {
            api_key: String::new(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/**
 * \brief 展示给用户的状态消息。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/**
 * \brief 一次查询动作的结果：消息列表 + 渲染文本（成功时）。
 */
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutcome {
    pub notices: Vec<Notice>,
    pub rendered: Option<String>,
    pub result: Option<SearchResult>,
}

impl QueryOutcome {
    pub fn is_ok(&self) -> bool {
        self.rendered.is_some()
    }

    fn failed(err: &SdkError) -> Self {
        let mut notices = vec![Notice::error(err.to_string())];
        if let Some(raw) = err.raw_body() {
            notices.push(Notice::info(format!("Raw response: {}", raw)));
        }
        Self {
            notices,
            ..Self::default()
        }
    }
}

/**
 * \brief 失败日志行：带上 HTTP 状态码（若有），不含回复体。
 */
fn failure_detail(err: &SdkError) -> String {
    match err.status() {
        Some(status) => format!("status={} {}", status, err),
        None => err.to_string(),
    }
}

/**
 * \brief 启动时读取最近一次保存的凭据，缺省回落到默认值。
 */
pub fn load_state(conn: &Connection) -> SdkResult<AppState> {
    Ok(db::get_latest_credentials(conn)?
        .map(|rec| AppState {
            api_key: rec.api_key,
            endpoint_url: rec.endpoint_url,
        })
        .unwrap_or_else(AppState::defaults))
}

/**
 * \brief 保存动作：两个字段都非空才写库。
 */
pub fn save_state(conn: &Connection, state: &AppState) -> SdkResult<Notice> {
    if state.api_key.trim().is_empty() || state.endpoint_url.trim().is_empty() {
        return Ok(Notice::warning(
            "Both API key and deployment URL are required to save.",
        ));
    }
    let id = db::save_credentials(conn, state.api_key.trim(), state.endpoint_url.trim())?;
    telemetry::log_event("shell.save", &format!("credentials saved id={}", id));
    Ok(Notice::success("API Key and URL saved!"))
}

/**
 * \brief 两个出站客户端的组合，不持有数据库连接，可在服务端跨请求共享。
 */
#[derive(Debug, Clone)]
pub struct Clients {
    pub identity: IdentityClient,
    pub query: QueryClient,
}

impl Clients {
    pub fn new(identity: IdentityClient, query: QueryClient) -> Self {
        Self { identity, query }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            identity: IdentityClient::with_client(http.clone(), config.token_url.clone()),
            query: QueryClient::with_client(http),
        }
    }

    /**
     * \brief 查询动作：空问题只警告；否则依次换令牌、查询、解码、渲染，任一步失败即停止。
     */
    pub async fn run_query(&self, state: &AppState, search_query: &str) -> QueryOutcome {
        let search_query = search_query.trim();
        if search_query.is_empty() {
            return QueryOutcome {
                notices: vec![Notice::warning(
                    "Please enter a search query before sending.",
                )],
                ..QueryOutcome::default()
            };
        }
        telemetry::log_event(
            "shell.query",
            &format!(
                "query_len={} endpoint={}",
                search_query.len(),
                state.endpoint_url
            ),
        );

        let token = match self.identity.exchange_token(&state.api_key).await {
            Ok(token) => token,
            Err(err) => {
                telemetry::log_error("shell.token", &failure_detail(&err));
                return QueryOutcome::failed(&err);
            }
        };

        let value = match self
            .query
            .query(search_query, &token, &state.endpoint_url)
            .await
        {
            Ok(value) => value,
            Err(err) => {
                telemetry::log_error("shell.search", &failure_detail(&err));
                return QueryOutcome::failed(&err);
            }
        };

        match search::decode(&value) {
            Ok(result) => QueryOutcome {
                notices: Vec::new(),
                rendered: Some(render::render(&result)),
                result: Some(result),
            },
            Err(err) => {
                telemetry::log_error("shell.decode", &failure_detail(&err));
                QueryOutcome::failed(&err)
            }
        }
    }
}

/**
 * \brief 交互外壳：数据库连接 + 出站客户端 + 当前表单状态。
 */
pub struct App {
    conn: Connection,
    clients: Clients,
    state: AppState,
}

impl App {
    /**
     * \brief 确保表结构存在，并用最近保存的凭据预填表单。
     */
    pub fn new(conn: Connection, clients: Clients) -> SdkResult<Self> {
        db::migrate(&conn)?;
        let state = load_state(&conn)?;
        Ok(Self {
            conn,
            clients,
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.state.api_key = api_key.into();
    }

    pub fn set_endpoint_url(&mut self, endpoint_url: impl Into<String>) {
        self.state.endpoint_url = endpoint_url.into();
    }

    pub fn save(&self) -> SdkResult<Notice> {
        save_state(&self.conn, &self.state)
    }

    pub async fn query(&self, search_query: &str) -> QueryOutcome {
        self.clients.run_query(&self.state, search_query).await
    }
}
