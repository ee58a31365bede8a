use serde::{Deserialize, Serialize};

/**
 * \brief 已保存的凭据行（API Key 与部署地址）。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /** \brief 自增主键，越大越新 */
    pub id: i64,
    /** \brief IBM Cloud API Key（明文存储，仅限本机单用户） */
    pub api_key: String,
    /** \brief 部署推理地址 */
    pub endpoint_url: String,
}

/**
 * \brief IAM 换取令牌的响应体，只有 access_token 是必需字段。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expiration: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/**
 * \brief 消息结构，与 Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

/**
 * \brief 单次查询的载荷：用户问题与本轮令牌。
 */
#[derive(Debug, Clone)]
pub struct QueryPayload {
    pub message: String,
    pub access_token: String,
}

/**
 * \brief 近似检索命中的文档片段。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityMatch {
    pub asset_name: String,
    pub score: f64,
    /** \brief 片段起点（原样保留为展示文本） */
    pub range_from: String,
    /** \brief 片段终点 */
    pub range_to: String,
}

/**
 * \brief 解码后的部署回复：生成文本 + 近似检索结果。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub generated_response: String,
    pub proximity_matches: Vec<ProximityMatch>,
}
