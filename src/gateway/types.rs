//! API 请求/响应数据类型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 服务端检测到的包管理器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// 已安装的包
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

/// `GET /managers/{id}/packages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageList {
    pub manager_id: String,
    pub manager_name: String,
    pub total: usize,
    pub packages: Vec<Package>,
}

impl PackageList {
    /// 按名字做不区分大小写的子串过滤
    pub fn filter<'a>(&'a self, keyword: &str) -> Vec<&'a Package> {
        let keyword = keyword.to_lowercase();
        self.packages
            .iter()
            .filter(|pkg| keyword.is_empty() || pkg.name.to_lowercase().contains(&keyword))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "unknown")]
    pub severity: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub affected_versions: Option<String>,
    #[serde(default)]
    pub fixed_in: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// `GET /advanced/{id}/vulnerabilities`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub scanned: Option<usize>,
    #[serde(default)]
    pub note: Option<String>,
}

/// `GET /advanced/{id}/lockfile`，`lockfile` 可能是纯文本也可能是 JSON 对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileExport {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub lockfile: Value,
}

fn default_format() -> String {
    "lockfile".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedUninstall {
    pub package: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /advanced/{id}/batch-uninstall`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchUninstallReport {
    pub manager: String,
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedUninstall>,
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOutput {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub returncode: Option<i32>,
}

/// `DELETE /managers/{id}/packages/{name}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UninstallReceipt {
    pub manager: String,
    pub package: String,
    pub success: Option<bool>,
    pub snapshot_id: Option<String>,
    pub command: Option<CommandOutput>,
}

/// `POST /advanced/{id}/rollback/{snapshot_id}`：只卸载快照之后新增的包
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackReport {
    pub snapshot_id: String,
    pub manager: String,
    pub uninstalled: Vec<String>,
    pub failed: Vec<FailedUninstall>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DiscoverResponse {
    pub managers: Vec<Manager>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchUninstallRequest<'a> {
    pub packages: &'a [String],
}
