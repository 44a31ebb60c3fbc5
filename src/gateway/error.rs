use thiserror::Error;

/// 网关错误。需要 `Clone`：查询缓存会保存最近一次错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// 没有收到响应（连接失败、超时）
    #[error("网络错误: {0}")]
    Network(String),

    #[error("未找到: {0}")]
    NotFound(String),

    /// 服务端明确返回的错误
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    /// 服务端收到请求，但底层包管理器命令失败
    #[error("包管理器执行失败: {0}")]
    Manager(String),

    /// 客户端输入校验失败，请求未发出
    #[error("输入无效: {0}")]
    Validation(String),
}

impl GatewayError {
    pub fn api(message: impl Into<String>) -> Self {
        GatewayError::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Network(format!("请求超时: {e}"))
        } else if e.is_decode() {
            GatewayError::api(format!("响应解析失败: {e}"))
        } else if let Some(status) = e.status() {
            GatewayError::Api {
                status: Some(status.as_u16()),
                message: e.to_string(),
            }
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

/// 从错误响应体里提取服务端消息：FastAPI 的 `detail` 或 `error` 字段，否则原文
pub(super) fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for field in ["detail", "error", "message"] {
            match value.get(field) {
                Some(serde_json::Value::String(s)) => return Some(s.clone()),
                Some(other) if !other.is_null() => return Some(other.to_string()),
                _ => {}
            }
        }
    }
    Some(trimmed.to_string())
}
