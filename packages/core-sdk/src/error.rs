use thiserror::Error;

/**
 * \brief SDK 层错误类型。
 * \details 所有错误都直接展示给用户，不做自动重试。
 */
#[derive(Debug, Error)]
pub enum SdkError {
    /** \brief 本地凭据库读写失败。 */
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /** \brief 未提供 API Key，未发起任何请求。 */
    #[error("API key is empty")]
    MissingApiKey,

    /** \brief IAM 返回非 200。 */
    #[error("Failed to retrieve token: {status} - {body}")]
    Auth { status: u16, body: String },

    /** \brief 部署推理接口返回非 200。 */
    #[error("Error fetching search results: {status} - {body}")]
    Request { status: u16, body: String },

    /** \brief 回复体无法解码为预期结构。 */
    #[error("Error parsing response: {reason}")]
    Parse { reason: String, raw: String },

    /** \brief 网络层失败（连接、TLS、读取响应体等）。 */
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SdkError {
    pub(crate) fn parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        SdkError::Parse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /**
     * \brief 返回 HTTP 状态码（若是 Auth/Request 错误）。
     */
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Auth { status, .. } | SdkError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /**
     * \brief 解析失败时返回原始回复体，便于排查。
     */
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            SdkError::Parse { raw, .. } if !raw.is_empty() => Some(raw),
            _ => None,
        }
    }
}

pub type SdkResult<T> = std::result::Result<T, SdkError>;
