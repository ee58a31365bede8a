use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::error::{SdkError, SdkResult};
use crate::models::{Message, ProximityMatch, QueryPayload, SearchResult};

/**
 * \brief 部署推理接口客户端，单次阻塞往返，无超时、无重试、无流式。
 */
#[derive(Debug, Clone, Default)]
pub struct QueryClient {
    http: reqwest::Client,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /**
     * \brief 提交查询并返回原始 JSON 回复。
     * \param search_query 用户问题
     * \param token IAM bearer token
     * \param endpoint_url 部署推理地址
     */
    pub async fn query(
        &self,
        search_query: &str,
        token: &str,
        endpoint_url: &str,
    ) -> SdkResult<Value> {
        let payload = QueryPayload {
            message: search_query.to_string(),
            access_token: token.to_string(),
        };
        let body = build_payload(&payload);

        let resp = self
            .http
            .post(endpoint_url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", payload.access_token))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(SdkError::Request {
                status: status.as_u16(),
                body: text,
            });
        }
        let text = resp.text().await?;

        serde_json::from_str::<Value>(&text).map_err(|e| SdkError::parse(e.to_string(), text))
    }

    /**
     * \brief 查询并解码为 SearchResult。
     */
    pub async fn search(
        &self,
        search_query: &str,
        token: &str,
        endpoint_url: &str,
    ) -> SdkResult<SearchResult> {
        let value = self.query(search_query, token, endpoint_url).await?;
        decode(&value)
    }
}

/**
 * \brief 构造部署接口的 input_data 载荷：单轮 user 消息 + 令牌。
 */
pub fn build_payload(payload: &QueryPayload) -> Value {
    let messages = vec![Message {
        role: "user".to_string(),
        content: payload.message.clone(),
    }];
    json!({
        "input_data": [
            {
                "fields": ["Search", "access_token"],
                "values": [messages, [payload.access_token]]
            }
        ]
    })
}

/**
 * \brief 将回复解码为 SearchResult。
 * \details 期望 `predictions[0].values = [proximity_matches, generated_text]`，
 *          任何缺失或类型不符都返回 Parse 错误。
 */
pub fn decode(value: &Value) -> SdkResult<SearchResult> {
    let fail = |reason: &str| SdkError::parse(reason, value.to_string());

    let values = value
        .get("predictions")
        .and_then(|p| p.as_array())
        .ok_or_else(|| fail("missing predictions array"))?
        .first()
        .ok_or_else(|| fail("predictions array is empty"))?
        .get("values")
        .and_then(|v| v.as_array())
        .ok_or_else(|| fail("missing predictions[0].values"))?;

    if values.len() < 2 {
        return Err(fail("predictions[0].values must hold matches and generated text"));
    }

    let generated_response = values[1]
        .as_str()
        .ok_or_else(|| fail("generated text is not a string"))?
        .to_string();

    let proximity_matches = values[0]
        .as_array()
        .ok_or_else(|| fail("proximity results are not an array"))?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            decode_match(item).ok_or_else(|| fail(&format!("malformed proximity result #{}", i)))
        })
        .collect::<SdkResult<Vec<_>>>()?;

    Ok(SearchResult {
        generated_response,
        proximity_matches,
    })
}

fn decode_match(item: &Value) -> Option<ProximityMatch> {
    let metadata = item.get("metadata")?;
    Some(ProximityMatch {
        asset_name: display_text(metadata.get("asset_name")?)?,
        score: item.get("score")?.as_f64()?,
        range_from: display_text(metadata.get("from")?)?,
        range_to: display_text(metadata.get("to")?)?,
    })
}

fn display_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
