//! 缓存键与缓存数据

use crate::gateway::{ApiClient, GatewayError, Manager, PackageList, VulnerabilityReport};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// (操作, 参数) 组成的缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Managers,
    Packages(String),
    Vulnerabilities(String),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Managers => write!(f, "managers"),
            QueryKey::Packages(id) => write!(f, "packages:{id}"),
            QueryKey::Vulnerabilities(id) => write!(f, "vulnerabilities:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Managers(Vec<Manager>),
    Packages(PackageList),
    Vulnerabilities(VulnerabilityReport),
}

impl QueryData {
    pub fn as_managers(&self) -> Option<&[Manager]> {
        match self {
            QueryData::Managers(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_packages(&self) -> Option<&PackageList> {
        match self {
            QueryData::Packages(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_vulnerabilities(&self) -> Option<&VulnerabilityReport> {
        match self {
            QueryData::Vulnerabilities(v) => Some(v),
            _ => None,
        }
    }
}

pub type QueryFuture = BoxFuture<'static, Result<QueryData, GatewayError>>;

/// 可重复调用的取数函数，失效后重新取数时复用
pub type Fetcher = Arc<dyn Fn() -> QueryFuture + Send + Sync>;

pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<QueryData, GatewayError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// 每个键对应的网关调用
pub fn fetcher_for(client: &ApiClient, key: &QueryKey) -> Fetcher {
    let client = client.clone();
    match key.clone() {
        QueryKey::Managers => fetcher(move || {
            let client = client.clone();
            async move { client.discover_managers().await.map(QueryData::Managers) }
        }),
        QueryKey::Packages(id) => fetcher(move || {
            let client = client.clone();
            let id = id.clone();
            async move { client.list_packages(&id).await.map(QueryData::Packages) }
        }),
        QueryKey::Vulnerabilities(id) => fetcher(move || {
            let client = client.clone();
            let id = id.clone();
            async move {
                client
                    .scan_vulnerabilities(&id)
                    .await
                    .map(QueryData::Vulnerabilities)
            }
        }),
    }
}
