use reqwest::header::ACCEPT;

use crate::error::{SdkError, SdkResult};
use crate::models::TokenResponse;

/** \brief IBM Cloud IAM 令牌地址。 */
pub const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/** \brief API Key 换令牌使用的 grant_type。 */
pub const GRANT_TYPE_APIKEY: &str = "urn:ibm:params:oauth:grant-type:apikey";

/**
 * \brief IAM 令牌交换客户端。每次查询都重新换取，不缓存、不重试。
 */
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    token_url: String,
}

impl IdentityClient {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), token_url)
    }

    pub fn with_client(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /**
     * \brief 用 API Key 换取 bearer token。
     * \details 空 Key 直接返回 MissingApiKey，不发请求；非 200 返回 Auth 错误。
     */
    pub async fn exchange_token(&self, api_key: &str) -> SdkResult<String> {
        Ok(self.exchange(api_key).await?.access_token)
    }

    /**
     * \brief 返回完整令牌响应（含可选字段）。
     */
    pub async fn exchange(&self, api_key: &str) -> SdkResult<TokenResponse> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SdkError::MissingApiKey);
        }

        let form = [("apikey", api_key), ("grant_type", GRANT_TYPE_APIKEY)];
        let resp = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(SdkError::Auth {
                status: status.as_u16(),
                body: text,
            });
        }
        let text = resp.text().await?;

        serde_json::from_str::<TokenResponse>(&text)
            .map_err(|e| SdkError::parse(format!("invalid token response: {}", e), text))
    }
}
