//! 远程数据网关：package-audit HTTP API 的类型化异步客户端

pub mod error;
pub mod lockfile;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod mock;

pub use error::GatewayError;
pub use lockfile::LockfileSaver;
pub use types::{
    BatchUninstallReport, FailedUninstall, LockfileExport, Manager, Package, PackageList,
    RollbackReport, UninstallReceipt, Vulnerability, VulnerabilityReport,
};
pub use validate::{
    parse_batch_input, validate_manager_id, validate_package_name, validate_snapshot_id,
};

use crate::store::Settings;
use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use types::{BatchUninstallRequest, DiscoverResponse};

/// 只读请求在网络错误时重试一次
const READ_ATTEMPTS: usize = 2;
const RETRY_DELAY_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(server_url: &str, settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("package-audit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(settings.request_timeout.max(1)))
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            client,
            base_url: resolve_base_url(server_url, &settings.api_base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== 查询 =====

    pub async fn discover_managers(&self) -> Result<Vec<Manager>, GatewayError> {
        let url = self.endpoint(&["discover"])?;
        let response: DiscoverResponse = self.fetch_json("discover", Method::POST, url).await?;
        Ok(response.managers)
    }

    pub async fn list_packages(&self, manager_id: &str) -> Result<PackageList, GatewayError> {
        validate_manager_id(manager_id)?;
        let url = self.endpoint(&["managers", manager_id, "packages"])?;
        self.fetch_json("list_packages", Method::GET, url).await
    }

    pub async fn scan_vulnerabilities(
        &self,
        manager_id: &str,
    ) -> Result<VulnerabilityReport, GatewayError> {
        validate_manager_id(manager_id)?;
        let url = self.endpoint(&["advanced", manager_id, "vulnerabilities"])?;
        self.fetch_json("scan_vulnerabilities", Method::GET, url).await
    }

    pub async fn export_lockfile(&self, manager_id: &str) -> Result<LockfileExport, GatewayError> {
        validate_manager_id(manager_id)?;
        let url = self.endpoint(&["advanced", manager_id, "lockfile"])?;
        self.fetch_json("export_lockfile", Method::GET, url).await
    }

    /// 依赖树作为可打开的文档链接提供，这里不请求
    pub fn dependency_tree_url(&self, manager_id: &str) -> Result<String, GatewayError> {
        validate_manager_id(manager_id)?;
        Ok(self
            .endpoint(&["advanced", manager_id, "dependency-tree"])?
            .to_string())
    }

    // ===== 变更（不重试） =====

    pub async fn uninstall_package(
        &self,
        manager_id: &str,
        package_name: &str,
    ) -> Result<UninstallReceipt, GatewayError> {
        validate_manager_id(manager_id)?;
        validate_package_name(package_name)?;
        let url = self.endpoint(&["managers", manager_id, "packages", package_name])?;
        let resp = self.send(self.client.delete(url)).await?;

        // 合约只保证 2xx，响应体可能为空
        let body = resp.text().await?;
        let receipt: UninstallReceipt = if body.trim().is_empty() {
            UninstallReceipt::default()
        } else {
            parse_body(&body)?
        };

        if receipt.success == Some(false) {
            let stderr = receipt
                .command
                .as_ref()
                .and_then(|c| c.stderr.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("卸载命令返回失败");
            return Err(GatewayError::Manager(stderr.to_string()));
        }
        Ok(receipt)
    }

    pub async fn batch_uninstall(
        &self,
        manager_id: &str,
        package_names: &[String],
    ) -> Result<BatchUninstallReport, GatewayError> {
        validate_manager_id(manager_id)?;
        if package_names.is_empty() {
            return Err(GatewayError::Validation("没有输入要卸载的包".to_string()));
        }
        for name in package_names {
            validate_package_name(name)?;
        }
        let url = self.endpoint(&["advanced", manager_id, "batch-uninstall"])?;
        let request = BatchUninstallRequest {
            packages: package_names,
        };
        let resp = self.send(self.client.post(url).json(&request)).await?;

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(BatchUninstallReport {
                manager: manager_id.to_string(),
                total: package_names.len(),
                succeeded: package_names.to_vec(),
                ..Default::default()
            });
        }
        parse_body(&body)
    }

    /// 回滚到卸载前的快照：服务端只卸载快照之后新增的包，不会重装
    pub async fn rollback(
        &self,
        manager_id: &str,
        snapshot_id: &str,
    ) -> Result<RollbackReport, GatewayError> {
        validate_manager_id(manager_id)?;
        validate_snapshot_id(snapshot_id)?;
        let url = self.endpoint(&["advanced", manager_id, "rollback", snapshot_id])?;
        let resp = self.send(self.client.post(url)).await?;
        read_json(resp).await
    }

    // ===== 内部 =====

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        label: &str,
        method: Method,
        url: Url,
    ) -> Result<T, GatewayError> {
        with_retry(label, move || {
            let request = self.client.request(method.clone(), url.clone());
            async move {
                let resp = self.send(request).await?;
                read_json(resp).await
            }
        })
        .await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GatewayError::Validation(format!("API 地址无效 ({}): {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Validation(format!("API 地址无效: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Network(format!("请求超时: {e}"))
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error::server_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("请求失败")
                .to_string()
        });
        log::debug!("API 返回 {}: {}", status, message);

        if status == reqwest::StatusCode::NOT_FOUND {
            Err(GatewayError::NotFound(message))
        } else {
            Err(GatewayError::Api {
                status: Some(status.as_u16()),
                message,
            })
        }
    }
}

/// 相对路径（默认 `/api`）拼到服务端地址后；绝对地址直接使用
pub fn resolve_base_url(server_url: &str, api_base_url: &str) -> String {
    let api = api_base_url.trim();
    if api.starts_with("http://") || api.starts_with("https://") {
        return api.trim_end_matches('/').to_string();
    }
    let server = server_url.trim().trim_end_matches('/');
    let path = api.trim_matches('/');
    if path.is_empty() {
        server.to_string()
    } else {
        format!("{server}/{path}")
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
    let body = resp.text().await?;
    parse_body(&body)
}

/// 2xx 响应体里的 `error` 字段同样视为 API 错误
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::api(format!("响应解析失败: {e}")))?;
    if let Some(err) = value.get("error").filter(|v| !v.is_null()) {
        let message = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(GatewayError::api(message));
    }
    serde_json::from_value(value).map_err(|e| GatewayError::api(format!("响应解析失败: {e}")))
}

async fn with_retry<T, F, Fut>(label: &str, mut f: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Err(err) if err.is_network() && attempt < READ_ATTEMPTS => {
                log::debug!("{} 网络错误，重试: {}", label, err);
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
            result => return result,
        }
    }
}
