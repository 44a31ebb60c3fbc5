//! 一次性的变更操作（卸载、批量卸载、回滚、导出锁文件）

use super::{QueryCache, QueryKey};
use crate::gateway::{
    BatchUninstallReport, GatewayError, LockfileExport, RollbackReport, UninstallReceipt,
};
use std::future::Future;
use std::time::{Duration, Instant};

/// 成功提示显示多久后自动消失
pub const SUCCESS_FLASH: Duration = Duration::from_secs(3);

pub type MutationId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Uninstall { manager_id: String, package: String },
    BatchUninstall { manager_id: String, packages: Vec<String> },
    Rollback { manager_id: String, snapshot_id: String },
    ExportLockfile { manager_id: String },
}

impl MutationKind {
    /// 成功后需要失效的键：只影响对应管理器的包列表
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            MutationKind::Uninstall { manager_id, .. }
            | MutationKind::BatchUninstall { manager_id, .. }
            | MutationKind::Rollback { manager_id, .. } => {
                vec![QueryKey::Packages(manager_id.clone())]
            }
            MutationKind::ExportLockfile { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationData {
    Uninstalled(UninstallReceipt),
    BatchUninstalled(BatchUninstallReport),
    RolledBack(RollbackReport),
    Lockfile(LockfileExport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationSettled {
    pub id: MutationId,
    pub kind: MutationKind,
    pub result: Result<MutationData, GatewayError>,
}

impl MutationSettled {
    pub fn invalidations(&self) -> Vec<QueryKey> {
        if self.result.is_ok() {
            self.kind.invalidates()
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// 视图持有的变更句柄，对应一个按钮/动作
#[derive(Debug, Default)]
pub struct Mutation {
    status: MutationStatus,
    pending: Option<MutationId>,
    error: Option<GatewayError>,
    succeeded_at: Option<Instant>,
}

impl Mutation {
    pub fn trigger<Fut>(&mut self, cache: &mut QueryCache, kind: MutationKind, fut: Fut)
    where
        Fut: Future<Output = Result<MutationData, GatewayError>> + Send + 'static,
    {
        let id = cache.mutate(kind, fut);
        self.pending = Some(id);
        self.status = MutationStatus::Pending;
        self.error = None;
        self.succeeded_at = None;
    }

    /// 请求发出前就被拒绝（例如没有选中管理器）
    pub fn reject(&mut self, error: GatewayError) {
        self.pending = None;
        self.status = MutationStatus::Error;
        self.error = Some(error);
        self.succeeded_at = None;
    }

    /// 结果属于本句柄时更新状态并返回 true
    pub fn settle(&mut self, settled: &MutationSettled) -> bool {
        if self.pending != Some(settled.id) {
            return false;
        }
        self.pending = None;
        match &settled.result {
            Ok(_) => {
                self.status = MutationStatus::Success;
                self.error = None;
                self.succeeded_at = Some(Instant::now());
            }
            Err(e) => {
                self.status = MutationStatus::Error;
                self.error = Some(e.clone());
            }
        }
        true
    }

    /// 成功提示到期后回到空闲
    pub fn tick(&mut self, now: Instant) {
        if self.status == MutationStatus::Success {
            if let Some(at) = self.succeeded_at {
                if now.duration_since(at) >= SUCCESS_FLASH {
                    self.status = MutationStatus::Idle;
                    self.succeeded_at = None;
                }
            }
        }
    }

    pub fn clear_error(&mut self) {
        if self.status == MutationStatus::Error {
            self.status = MutationStatus::Idle;
            self.error = None;
        }
    }

    pub fn status(&self) -> MutationStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }
}
