use super::input::InputBox;
use super::layout::copy_to_clipboard;
use super::theme::Palette;
use crate::cache::{
    fetcher_for, CacheEvent, Mutation, MutationData, MutationKind, MutationSettled,
    MutationStatus, QueryCache, QueryKey, Subscription, SUCCESS_FLASH,
};
use crate::config::Config;
use crate::gateway::{
    parse_batch_input, ApiClient, BatchUninstallReport, GatewayError, LockfileSaver, Manager,
    Package, RollbackReport, UninstallReceipt, VulnerabilityReport,
};
use crate::store::{Settings, SettingsPatch, SettingsStore, Tab};
use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// ========== 设置项 ==========

/// 设置页面项目类型
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsItem {
    /// 分组标题（不可选中）
    Section(String),
    /// 复选框开关项
    Toggle {
        label: String,
        key: &'static str,
        value: bool,
    },
    /// 循环切换的选项（主题）
    Choice {
        label: String,
        key: &'static str,
        value: String,
    },
    /// 文本编辑项
    TextEdit {
        label: String,
        key: &'static str,
        value: String,
    },
    /// 按下即执行的动作
    Action { label: String, key: &'static str },
}

impl SettingsItem {
    fn is_focusable(&self) -> bool {
        !matches!(self, SettingsItem::Section(_))
    }
}

/// 开关项对应的 patch
pub fn toggle_patch(key: &str, value: bool) -> Option<SettingsPatch> {
    let mut patch = SettingsPatch::default();
    match key {
        "compact_mode" => patch.compact_mode = Some(value),
        "show_icons" => patch.show_icons = Some(value),
        "confirm_before_uninstall" => patch.confirm_before_uninstall = Some(value),
        "auto_refresh" => patch.auto_refresh = Some(value),
        "enable_batch_operations" => patch.enable_batch_operations = Some(value),
        "enable_vulnerability_scanning" => patch.enable_vulnerability_scanning = Some(value),
        "enable_dependency_trees" => patch.enable_dependency_trees = Some(value),
        _ => return None,
    }
    Some(patch)
}

/// 文本项对应的 patch，数字项解析失败时返回提示
pub fn text_patch(key: &str, input: &str) -> Result<SettingsPatch, String> {
    let input = input.trim();
    let mut patch = SettingsPatch::default();
    match key {
        "refresh_interval" => {
            let secs = input
                .parse::<u32>()
                .map_err(|_| format!("刷新间隔需要是秒数: {input}"))?;
            patch.refresh_interval = Some(secs);
        }
        "request_timeout" => {
            let ms = input
                .parse::<u64>()
                .map_err(|_| format!("超时需要是毫秒数: {input}"))?;
            if ms == 0 {
                return Err("超时必须大于 0".to_string());
            }
            patch.request_timeout = Some(ms);
        }
        "api_base_url" => patch.api_base_url = Some(input.to_string()),
        _ => return Err(format!("未知设置项: {key}")),
    }
    Ok(patch)
}

// ========== 提示消息 ==========

/// 非变更操作的 footer 消息（设置、剪贴板）：成功的几秒后消失，错误的保留到下一次按键
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub at: Instant,
}

impl Notice {
    pub fn ok(text: impl std::fmt::Display) -> Self {
        Self {
            text: format!("✓ {text}"),
            at: Instant::now(),
        }
    }

    pub fn error(text: impl std::fmt::Display) -> Self {
        Self {
            text: format!("✗ {text}"),
            at: Instant::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.text.starts_with('✗')
    }
}

// ========== 子状态结构体 ==========

#[derive(Debug, Default)]
pub struct OverviewTabState {
    pub selected: usize,
}

#[derive(Debug, Default)]
pub struct PackagesTabState {
    pub search: InputBox,
    pub searching: bool,
    pub selected: usize,
    /// 等待 y/n 确认的包名
    pub confirm: Option<String>,
    pub uninstall: Mutation,
    /// 最近一次成功卸载的回执
    pub removed: Option<UninstallReceipt>,
}

/// 卸载前服务端记录的快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub manager_id: String,
    pub id: String,
}

#[derive(Debug, Default)]
pub struct OperationsTabState {
    pub batch_input: String,
    pub batch_cursor: usize,
    pub editing: bool,
    pub batch: Mutation,
    pub report: Option<BatchUninstallReport>,
    /// 最近一次卸载留下的快照，按 u 回滚
    pub snapshot: Option<Snapshot>,
    pub confirm_rollback: bool,
    pub rollback: Mutation,
    pub rollback_report: Option<RollbackReport>,
    pub export: Mutation,
    pub exported: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SecurityTabState {
    pub scroll: usize,
}

#[derive(Debug, Default)]
pub struct SettingsTabState {
    pub items: Vec<SettingsItem>,
    pub selected: usize,
    pub editing: bool,
    pub edit_buffer: String,
    pub edit_cursor: usize,
}

// ========== App ==========

pub struct App {
    pub config: Config,
    pub store: SettingsStore,
    pub cache: QueryCache,
    pub client: ApiClient,
    subscriptions: Vec<Subscription>,
    pub should_quit: bool,
    pub notice: Option<Notice>,
    last_refresh: Instant,
    // 子状态
    pub overview: OverviewTabState,
    pub packages: PackagesTabState,
    pub operations: OperationsTabState,
    pub security: SecurityTabState,
    pub settings_view: SettingsTabState,
}

impl App {
    pub fn new(
        config: Config,
        store: SettingsStore,
        events: mpsc::Sender<CacheEvent>,
    ) -> Result<Self> {
        let client = ApiClient::new(&config.server_url, store.settings())?;
        log::info!("API 地址: {}", client.base_url());
        Ok(Self {
            config,
            store,
            cache: QueryCache::new(events),
            client,
            subscriptions: Vec::new(),
            should_quit: false,
            notice: None,
            last_refresh: Instant::now(),
            overview: OverviewTabState::default(),
            packages: PackagesTabState::default(),
            operations: OperationsTabState::default(),
            security: SecurityTabState::default(),
            settings_view: SettingsTabState::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn palette(&self) -> Palette {
        Palette::for_theme(self.settings().theme)
    }

    pub fn active_tab(&self) -> Tab {
        self.store.ui().active_tab
    }

    // ===== 查询数据 =====

    pub fn managers(&self) -> Option<&[Manager]> {
        self.cache
            .state(&QueryKey::Managers)
            .data
            .and_then(|d| d.as_managers())
    }

    /// 选中项不在最新发现结果中时视为未选择
    pub fn selected_manager(&self) -> Option<&Manager> {
        self.store.ui().resolve_manager(self.managers()?)
    }

    pub fn selected_manager_id(&self) -> Option<String> {
        self.selected_manager().map(|m| m.id.clone())
    }

    pub fn visible_packages(&self) -> Vec<&Package> {
        let Some(id) = self.selected_manager_id() else {
            return Vec::new();
        };
        self.cache
            .state(&QueryKey::Packages(id))
            .data
            .and_then(|d| d.as_packages())
            .map(|list| list.filter(self.packages.search.content()))
            .unwrap_or_default()
    }

    /// 当前管理器已到达的扫描结果
    pub fn vulnerability_report(&self) -> Option<&VulnerabilityReport> {
        let id = self.selected_manager_id()?;
        self.cache
            .state(&QueryKey::Vulnerabilities(id))
            .data
            .and_then(|d| d.as_vulnerabilities())
    }

    pub fn dependency_tree_url(&self) -> Option<String> {
        if !self.settings().enable_dependency_trees {
            return None;
        }
        let id = self.selected_manager_id()?;
        self.client.dependency_tree_url(&id).ok()
    }

    // ===== 订阅 =====

    /// 当前标签页需要的缓存键
    pub fn desired_keys(&self) -> Vec<QueryKey> {
        let mut keys = vec![QueryKey::Managers];
        if let Some(id) = self.selected_manager_id() {
            match self.active_tab() {
                Tab::Packages => keys.push(QueryKey::Packages(id)),
                Tab::Security if self.settings().enable_vulnerability_scanning => {
                    keys.push(QueryKey::Vulnerabilities(id))
                }
                _ => {}
            }
        }
        keys
    }

    /// 按当前标签页增删订阅
    pub fn sync_subscriptions(&mut self) {
        let desired = self.desired_keys();
        let (keep, stale): (Vec<_>, Vec<_>) = std::mem::take(&mut self.subscriptions)
            .into_iter()
            .partition(|sub| desired.contains(sub.key()));
        for sub in stale {
            self.cache.unsubscribe(sub);
        }
        self.subscriptions = keep;

        for key in desired {
            if self.subscriptions.iter().any(|sub| sub.key() == &key) {
                continue;
            }
            let fetcher = fetcher_for(&self.client, &key);
            let sub = self.cache.subscribe(key, fetcher);
            self.subscriptions.push(sub);
        }
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        if self.active_tab() == tab {
            return;
        }
        log::debug!("切换到 {}", tab.id());
        self.store.set_active_tab(tab);
        self.last_refresh = Instant::now();
        self.packages.confirm = None;
        self.operations.confirm_rollback = false;
        if tab == Tab::Settings {
            self.open_settings();
        }
        self.sync_subscriptions();
    }

    pub fn select_manager(&mut self, manager_id: String) {
        log::debug!("选择包管理器 {}", manager_id);
        self.store.set_selected_manager(Some(manager_id));
        self.packages.selected = 0;
        self.packages.confirm = None;
        self.security.scroll = 0;
        self.operations.report = None;
        self.operations.rollback_report = None;
        self.operations.exported = None;
        self.last_refresh = Instant::now();
        self.sync_subscriptions();
    }

    /// 在已发现的管理器间循环切换
    pub fn cycle_manager(&mut self, forward: bool) {
        let Some(managers) = self.managers() else {
            return;
        };
        if managers.is_empty() {
            return;
        }
        let len = managers.len();
        let next = match self
            .selected_manager()
            .and_then(|m| managers.iter().position(|x| x.id == m.id))
        {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        let id = managers[next].id.clone();
        self.overview.selected = next;
        self.select_manager(id);
    }

    /// `r`：失效当前视图用到的键
    pub fn refresh_current(&mut self) {
        let id = self.selected_manager_id();
        let key = match (self.active_tab(), id) {
            (Tab::Packages, Some(id)) => QueryKey::Packages(id),
            (Tab::Security, Some(id)) => QueryKey::Vulnerabilities(id),
            _ => QueryKey::Managers,
        };
        log::debug!("手动刷新 {}", key);
        self.cache.invalidate(&key);
        self.last_refresh = Instant::now();
        self.sync_subscriptions();
    }

    // ===== 事件 =====

    pub fn handle_cache_event(&mut self, event: CacheEvent) {
        let is_query = matches!(event, CacheEvent::Query(_));
        if let Some(settled) = self.cache.handle(event) {
            self.on_mutation_settled(settled);
        }
        if is_query {
            // 管理器列表到达后才能解析选中项
            self.sync_subscriptions();
            self.clamp_selections();
        }
    }

    fn on_mutation_settled(&mut self, settled: MutationSettled) {
        for key in settled.invalidations() {
            self.cache.invalidate(&key);
        }
        let claimed = self.packages.uninstall.settle(&settled)
            || self.operations.batch.settle(&settled)
            || self.operations.rollback.settle(&settled)
            || self.operations.export.settle(&settled);
        if !claimed {
            log::debug!("变更 #{} 的结果已无人等待", settled.id);
            return;
        }

        // 成功与失败由各自的句柄呈现，这里只落地返回的数据
        let MutationSettled { kind, result, .. } = settled;
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                log::warn!("操作失败: {}", e);
                return;
            }
        };
        match (kind, data) {
            (
                MutationKind::Uninstall {
                    manager_id,
                    package,
                },
                MutationData::Uninstalled(mut receipt),
            ) => {
                log::info!("已卸载 {}", package);
                if receipt.package.is_empty() {
                    receipt.package = package;
                }
                if let Some(id) = &receipt.snapshot_id {
                    self.operations.snapshot = Some(Snapshot {
                        manager_id,
                        id: id.clone(),
                    });
                }
                self.packages.removed = Some(receipt);
            }
            (
                MutationKind::BatchUninstall { manager_id, .. },
                MutationData::BatchUninstalled(report),
            ) => {
                if let Some(id) = &report.snapshot_id {
                    self.operations.snapshot = Some(Snapshot {
                        manager_id,
                        id: id.clone(),
                    });
                }
                self.operations.report = Some(report);
                self.operations.batch_input.clear();
                self.operations.batch_cursor = 0;
            }
            (_, MutationData::RolledBack(report)) => {
                log::info!(
                    "已回滚到快照 {}，卸载 {} 个包",
                    report.snapshot_id,
                    report.uninstalled.len()
                );
                self.operations.rollback_report = Some(report);
            }
            (MutationKind::ExportLockfile { manager_id }, MutationData::Lockfile(export)) => {
                let artifact = export.artifact(&manager_id);
                let saver = LockfileSaver::new(self.config.export_dir.clone());
                match saver.save(&artifact) {
                    Ok(path) => self.operations.exported = Some(path),
                    Err(e) => {
                        log::error!("保存锁文件失败: {:#}", e);
                        self.notice = Some(Notice::error(format!("{:#}", e)));
                    }
                }
            }
            (kind, _) => log::debug!("{:?} 完成", kind),
        }
    }

    /// footer 消息：普通提示优先，其次是变更句柄的状态
    pub fn footer_message(&self) -> Option<String> {
        if let Some(notice) = &self.notice {
            return Some(notice.text.clone());
        }
        let ops = &self.operations;
        describe_mutation(&self.packages.uninstall, "正在卸载...", || {
            self.packages.removed.as_ref().map(|r| match &r.snapshot_id {
                Some(id) => format!("已卸载 {}（快照 {id}，操作页按 u 回滚）", r.package),
                None => format!("已卸载 {}", r.package),
            })
        })
        .or_else(|| {
            describe_mutation(&ops.batch, "正在批量卸载...", || {
                ops.report.as_ref().map(|r| {
                    format!(
                        "批量卸载完成: 成功 {} / 失败 {}",
                        r.succeeded.len(),
                        r.failed.len()
                    )
                })
            })
        })
        .or_else(|| {
            describe_mutation(&ops.rollback, "正在回滚...", || {
                ops.rollback_report.as_ref().map(|r| {
                    format!("已回滚到快照 {}: 卸载 {} 个包", r.snapshot_id, r.uninstalled.len())
                })
            })
        })
        .or_else(|| {
            describe_mutation(&ops.export, "正在导出锁文件...", || {
                ops.exported
                    .as_ref()
                    .map(|path| format!("已导出 {}", path.display()))
            })
        })
    }

    /// 每帧调用：成功提示到期、自动刷新
    pub fn tick(&mut self, now: Instant) {
        self.packages.uninstall.tick(now);
        self.operations.batch.tick(now);
        self.operations.rollback.tick(now);
        self.operations.export.tick(now);
        if let Some(notice) = &self.notice {
            if !notice.is_error() && now.duration_since(notice.at) >= SUCCESS_FLASH {
                self.notice = None;
            }
        }
        self.auto_refresh(now);
    }

    fn auto_refresh(&mut self, now: Instant) {
        let settings = self.settings();
        if !settings.auto_refresh || self.active_tab() != Tab::Packages {
            return;
        }
        let interval = Duration::from_secs(u64::from(settings.refresh_interval));
        if now.duration_since(self.last_refresh) < interval {
            return;
        }
        self.last_refresh = now;
        if let Some(id) = self.selected_manager_id() {
            let key = QueryKey::Packages(id);
            log::debug!("自动刷新 {}", key);
            self.cache.invalidate(&key);
        }
    }

    /// 任意按键后清掉错误提示
    pub fn clear_errors(&mut self) {
        if self.notice.as_ref().is_some_and(Notice::is_error) {
            self.notice = None;
        }
        self.packages.uninstall.clear_error();
        self.operations.batch.clear_error();
        self.operations.rollback.clear_error();
        self.operations.export.clear_error();
    }

    fn clamp_selections(&mut self) {
        let packages = self.visible_packages().len();
        self.packages.selected = self.packages.selected.min(packages.saturating_sub(1));
        let managers = self.managers().map(|m| m.len()).unwrap_or(0);
        self.overview.selected = self.overview.selected.min(managers.saturating_sub(1));
    }

    // ===== 变更操作 =====

    fn require_manager(&self) -> Result<String, GatewayError> {
        self.selected_manager_id()
            .ok_or_else(|| GatewayError::Validation("请先在概览中选择包管理器".to_string()))
    }

    /// 卸载高亮的包，按设置决定是否先确认
    pub fn request_uninstall(&mut self) {
        if self.packages.uninstall.is_pending() {
            return;
        }
        let Some(name) = self
            .visible_packages()
            .get(self.packages.selected)
            .map(|p| p.name.clone())
        else {
            return;
        };
        if self.settings().confirm_before_uninstall {
            self.packages.confirm = Some(name);
        } else {
            self.start_uninstall(name);
        }
    }

    pub fn answer_confirm(&mut self, yes: bool) {
        if let Some(name) = self.packages.confirm.take() {
            if yes {
                self.start_uninstall(name);
            }
        }
    }

    fn start_uninstall(&mut self, package: String) {
        let manager_id = match self.require_manager() {
            Ok(id) => id,
            Err(e) => {
                self.packages.uninstall.reject(e);
                return;
            }
        };
        log::info!("卸载 {} ({})", package, manager_id);
        let client = self.client.clone();
        let kind = MutationKind::Uninstall {
            manager_id: manager_id.clone(),
            package: package.clone(),
        };
        self.notice = None;
        self.packages.uninstall.trigger(&mut self.cache, kind, async move {
            client
                .uninstall_package(&manager_id, &package)
                .await
                .map(MutationData::Uninstalled)
        });
    }

    pub fn submit_batch(&mut self) {
        if !self.settings().enable_batch_operations || self.operations.batch.is_pending() {
            return;
        }
        let parsed = self
            .require_manager()
            .and_then(|id| Ok((id, parse_batch_input(&self.operations.batch_input)?)));
        let (manager_id, packages) = match parsed {
            Ok(v) => v,
            Err(e) => {
                self.operations.batch.reject(e);
                return;
            }
        };
        log::info!("批量卸载 {} 个包 ({})", packages.len(), manager_id);
        let client = self.client.clone();
        let kind = MutationKind::BatchUninstall {
            manager_id: manager_id.clone(),
            packages: packages.clone(),
        };
        self.notice = None;
        self.operations.editing = false;
        self.operations.report = None;
        self.operations.batch.trigger(&mut self.cache, kind, async move {
            client
                .batch_uninstall(&manager_id, &packages)
                .await
                .map(MutationData::BatchUninstalled)
        });
    }

    /// 回滚到最近的快照，按设置决定是否先确认
    pub fn request_rollback(&mut self) {
        if self.operations.snapshot.is_none() || self.operations.rollback.is_pending() {
            return;
        }
        if self.settings().confirm_before_uninstall {
            self.operations.confirm_rollback = true;
        } else {
            self.start_rollback();
        }
    }

    pub fn answer_rollback(&mut self, yes: bool) {
        if std::mem::take(&mut self.operations.confirm_rollback) && yes {
            self.start_rollback();
        }
    }

    fn start_rollback(&mut self) {
        let Some(Snapshot { manager_id, id }) = self.operations.snapshot.clone() else {
            return;
        };
        log::info!("回滚 {} 到快照 {}", manager_id, id);
        let client = self.client.clone();
        let kind = MutationKind::Rollback {
            manager_id: manager_id.clone(),
            snapshot_id: id.clone(),
        };
        self.notice = None;
        self.operations.rollback_report = None;
        self.operations.rollback.trigger(&mut self.cache, kind, async move {
            client
                .rollback(&manager_id, &id)
                .await
                .map(MutationData::RolledBack)
        });
    }

    pub fn export_lockfile(&mut self) {
        if self.operations.export.is_pending() {
            return;
        }
        let manager_id = match self.require_manager() {
            Ok(id) => id,
            Err(e) => {
                self.operations.export.reject(e);
                return;
            }
        };
        let client = self.client.clone();
        let kind = MutationKind::ExportLockfile {
            manager_id: manager_id.clone(),
        };
        self.notice = None;
        self.operations.exported = None;
        self.operations.export.trigger(&mut self.cache, kind, async move {
            client
                .export_lockfile(&manager_id)
                .await
                .map(MutationData::Lockfile)
        });
    }

    pub fn copy_dependency_tree_link(&mut self) {
        let Some(url) = self.dependency_tree_url() else {
            return;
        };
        if copy_to_clipboard(&url) {
            self.notice = Some(Notice::ok("依赖树链接已复制"));
        } else {
            self.notice = Some(Notice::error(format!("未找到剪贴板工具，请手动打开 {url}")));
        }
    }

    // ===== 设置页 =====

    pub fn open_settings(&mut self) {
        self.settings_view.selected = 0;
        self.settings_view.editing = false;
        self.build_settings_items();
    }

    /// 从当前设置构建设置项列表，保留选中位置
    pub fn build_settings_items(&mut self) {
        let s = self.settings().clone();
        let toggle = |label: &str, key: &'static str, value: bool| SettingsItem::Toggle {
            label: label.to_string(),
            key,
            value,
        };
        let text = |label: &str, key: &'static str, value: String| SettingsItem::TextEdit {
            label: label.to_string(),
            key,
            value,
        };
        self.settings_view.items = vec![
            SettingsItem::Section("显示".to_string()),
            SettingsItem::Choice {
                label: "主题".to_string(),
                key: "theme",
                value: s.theme.as_str().to_string(),
            },
            toggle("紧凑模式", "compact_mode", s.compact_mode),
            toggle("显示图标", "show_icons", s.show_icons),
            SettingsItem::Section("行为".to_string()),
            toggle("卸载前确认", "confirm_before_uninstall", s.confirm_before_uninstall),
            toggle("自动刷新软件包列表", "auto_refresh", s.auto_refresh),
            text("刷新间隔(秒)", "refresh_interval", s.refresh_interval.to_string()),
            SettingsItem::Section("API".to_string()),
            text("API 地址", "api_base_url", s.api_base_url.clone()),
            text("请求超时(毫秒)", "request_timeout", s.request_timeout.to_string()),
            SettingsItem::Section("功能".to_string()),
            toggle("批量操作", "enable_batch_operations", s.enable_batch_operations),
            toggle("漏洞扫描", "enable_vulnerability_scanning", s.enable_vulnerability_scanning),
            toggle("依赖树链接", "enable_dependency_trees", s.enable_dependency_trees),
            SettingsItem::Section("其他".to_string()),
            SettingsItem::Action {
                label: "恢复默认设置".to_string(),
                key: "reset",
            },
        ];
        let count = self.settings_focusable_count();
        self.settings_view.selected = self.settings_view.selected.min(count.saturating_sub(1));
    }

    /// 获取可聚焦项数量
    pub fn settings_focusable_count(&self) -> usize {
        self.settings_view
            .items
            .iter()
            .filter(|item| item.is_focusable())
            .count()
    }

    pub fn focused_setting(&self) -> Option<&SettingsItem> {
        self.settings_view
            .items
            .iter()
            .filter(|item| item.is_focusable())
            .nth(self.settings_view.selected)
    }

    /// Enter/Space：开关、切换、进入编辑或执行动作
    pub fn activate_setting(&mut self) {
        let Some(item) = self.focused_setting().cloned() else {
            return;
        };
        match item {
            SettingsItem::Toggle { key, value, .. } => {
                if let Some(patch) = toggle_patch(key, !value) {
                    self.apply_settings_patch(patch);
                }
            }
            SettingsItem::Choice { .. } => {
                let theme = self.settings().theme.next();
                self.apply_settings_patch(SettingsPatch {
                    theme: Some(theme),
                    ..Default::default()
                });
            }
            SettingsItem::TextEdit { value, .. } => {
                self.settings_view.edit_cursor = value.chars().count();
                self.settings_view.edit_buffer = value;
                self.settings_view.editing = true;
            }
            SettingsItem::Action { key: "reset", .. } => self.reset_settings(),
            SettingsItem::Action { .. } | SettingsItem::Section(_) => {}
        }
    }

    /// 确认编辑并写回设置
    pub fn confirm_settings_edit(&mut self) {
        let Some(SettingsItem::TextEdit { key, .. }) = self.focused_setting().cloned() else {
            self.settings_view.editing = false;
            return;
        };
        match text_patch(key, &self.settings_view.edit_buffer) {
            Ok(patch) => {
                self.settings_view.editing = false;
                self.apply_settings_patch(patch);
            }
            Err(msg) => self.notice = Some(Notice::error(msg)),
        }
    }

    pub fn reset_settings(&mut self) {
        let before = self.settings().clone();
        self.store.reset_settings();
        self.after_settings_change(&before);
        self.notice = Some(Notice::ok("已恢复默认设置"));
    }

    pub fn apply_settings_patch(&mut self, patch: SettingsPatch) {
        let before = self.settings().clone();
        self.store.update_settings(patch);
        self.after_settings_change(&before);
    }

    fn after_settings_change(&mut self, before: &Settings) {
        let after = self.settings().clone();
        if before.api_base_url != after.api_base_url
            || before.request_timeout != after.request_timeout
        {
            self.rebuild_client();
        }
        if before.auto_refresh != after.auto_refresh
            || before.refresh_interval != after.refresh_interval
        {
            self.last_refresh = Instant::now();
        }
        self.build_settings_items();
        self.sync_subscriptions();
    }

    /// API 地址或超时变化后重建客户端，旧缓存全部作废
    fn rebuild_client(&mut self) {
        match ApiClient::new(&self.config.server_url, self.settings()) {
            Ok(client) => {
                log::info!("API 地址: {}", client.base_url());
                self.client = client;
                self.subscriptions.clear();
                self.cache.clear();
            }
            Err(e) => {
                log::error!("重建 API 客户端失败: {:#}", e);
                self.notice = Some(Notice::error(format!("{:#}", e)));
            }
        }
    }
}

/// 单个变更句柄的 footer 文字
fn describe_mutation(
    handle: &Mutation,
    pending: &str,
    success: impl FnOnce() -> Option<String>,
) -> Option<String> {
    match handle.status() {
        MutationStatus::Idle => None,
        MutationStatus::Pending => Some(pending.to_string()),
        MutationStatus::Success => success().map(|text| format!("✓ {text}")),
        MutationStatus::Error => handle.error().map(|e| format!("✗ {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock;
    use crate::store::FileStorage;
    use std::path::Path;
    use tempfile::TempDir;

    fn test_app(server_url: &str, dir: &Path) -> (App, mpsc::Receiver<CacheEvent>) {
        let config = Config {
            server_url: server_url.to_string(),
            state_dir: dir.to_path_buf(),
            export_dir: dir.join("exports"),
        };
        let store = SettingsStore::open(Box::new(FileStorage::new(dir.to_path_buf())));
        let (tx, rx) = mpsc::channel(32);
        let mut app = App::new(config, store, tx).unwrap();
        app.sync_subscriptions();
        (app, rx)
    }

    async fn pump_until(
        app: &mut App,
        rx: &mut mpsc::Receiver<CacheEvent>,
        done: impl Fn(&App) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(app) {
                let event = rx.recv().await.expect("cache event");
                app.handle_cache_event(event);
            }
        })
        .await
        .expect("timed out waiting for cache events");
    }

    fn packages(id: &str) -> QueryKey {
        QueryKey::Packages(id.to_string())
    }

    fn vulns(id: &str) -> QueryKey {
        QueryKey::Vulnerabilities(id.to_string())
    }

    /// 选中 npm 并停在软件包页，列表已加载
    async fn on_npm_packages(app: &mut App, rx: &mut mpsc::Receiver<CacheEvent>) {
        pump_until(app, rx, |a| a.managers().is_some()).await;
        app.select_manager("npm".to_string());
        app.switch_tab(Tab::Packages);
        pump_until(app, rx, |a| {
            a.cache.state(&packages("npm")).data.is_some()
        })
        .await;
    }

    #[tokio::test]
    async fn subscriptions_follow_tab_and_selection() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        assert_eq!(app.cache.subscribers(&QueryKey::Managers), 1);

        on_npm_packages(&mut app, &mut rx).await;
        assert_eq!(app.cache.subscribers(&packages("npm")), 1);
        assert_eq!(app.visible_packages().len(), 1);

        app.switch_tab(Tab::Security);
        assert_eq!(app.cache.subscribers(&packages("npm")), 0);
        assert_eq!(app.cache.subscribers(&vulns("npm")), 1);

        app.apply_settings_patch(SettingsPatch {
            enable_vulnerability_scanning: Some(false),
            ..Default::default()
        });
        assert_eq!(app.cache.subscribers(&vulns("npm")), 0);

        app.switch_tab(Tab::Overview);
        assert_eq!(app.desired_keys(), vec![QueryKey::Managers]);
        assert_eq!(app.cache.subscribers(&QueryKey::Managers), 1);
    }

    #[tokio::test]
    async fn dangling_selection_is_treated_as_unselected() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;

        app.select_manager("winget".to_string());
        app.switch_tab(Tab::Packages);

        assert!(app.selected_manager().is_none());
        assert_eq!(app.desired_keys(), vec![QueryKey::Managers]);
        assert!(app.visible_packages().is_empty());

        app.request_uninstall();
        assert!(app.packages.confirm.is_none());
        app.export_lockfile();
        assert!(matches!(
            app.operations.export.error(),
            Some(GatewayError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn confirmed_uninstall_refetches_the_list() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        on_npm_packages(&mut app, &mut rx).await;

        app.request_uninstall();
        assert_eq!(app.packages.confirm.as_deref(), Some("left-pad"));
        app.answer_confirm(false);
        assert!(app.packages.confirm.is_none());
        assert!(!app.packages.uninstall.is_pending());

        app.request_uninstall();
        app.answer_confirm(true);
        assert!(app.packages.uninstall.is_pending());

        assert_eq!(app.footer_message().as_deref(), Some("正在卸载..."));

        pump_until(&mut app, &mut rx, |a| a.packages.uninstall.is_success()).await;
        assert!(app.cache.state(&packages("npm")).is_loading);
        assert_eq!(
            app.footer_message().as_deref(),
            Some("✓ 已卸载 left-pad（快照 snap-1，操作页按 u 回滚）")
        );
        assert_eq!(
            app.operations.snapshot,
            Some(Snapshot {
                manager_id: "npm".to_string(),
                id: "snap-1".to_string(),
            })
        );

        pump_until(&mut app, &mut rx, |a| {
            a.cache.state(&packages("npm")).data.is_some()
        })
        .await;
        assert!(app.visible_packages().is_empty());
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn failed_uninstall_shows_error_until_next_key() {
        let api = mock::spawn().await;
        api.add_package("npm", mock::FAILING_PACKAGE, "0.0.1");
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        app.store.update_settings(SettingsPatch {
            confirm_before_uninstall: Some(false),
            ..Default::default()
        });
        on_npm_packages(&mut app, &mut rx).await;

        for c in "locked".chars() {
            app.packages.search.insert(c);
        }
        assert_eq!(app.visible_packages().len(), 1);
        app.request_uninstall();
        pump_until(&mut app, &mut rx, |a| a.packages.uninstall.is_error()).await;

        assert_eq!(
            app.footer_message().as_deref(),
            Some("✗ 包管理器执行失败: EACCES: permission denied")
        );
        // 失败不触发失效
        assert!(!app.cache.state(&packages("npm")).is_loading);

        app.tick(Instant::now() + SUCCESS_FLASH * 2);
        assert!(app.footer_message().is_some());
        app.clear_errors();
        assert!(app.footer_message().is_none());
        assert!(!app.packages.uninstall.is_error());
    }

    #[tokio::test]
    async fn success_flash_clears_after_three_seconds() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        app.store.update_settings(SettingsPatch {
            confirm_before_uninstall: Some(false),
            ..Default::default()
        });
        on_npm_packages(&mut app, &mut rx).await;

        app.request_uninstall();
        pump_until(&mut app, &mut rx, |a| a.packages.uninstall.is_success()).await;
        assert!(app.footer_message().is_some());

        app.tick(Instant::now() + SUCCESS_FLASH);
        assert!(!app.packages.uninstall.is_success());
        assert!(app.footer_message().is_none());
    }

    #[tokio::test]
    async fn rollback_uses_the_latest_snapshot() {
        let api = mock::spawn().await;
        api.add_package("npm", "lodash", "4.17.21");
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        on_npm_packages(&mut app, &mut rx).await;

        // 没有快照时 u 什么也不做
        app.request_rollback();
        assert!(!app.operations.confirm_rollback);

        app.request_uninstall();
        app.answer_confirm(true);
        pump_until(&mut app, &mut rx, |a| a.packages.uninstall.is_success()).await;
        app.tick(Instant::now() + SUCCESS_FLASH);
        api.add_package("npm", "chalk", "5.3.0");

        app.switch_tab(Tab::Operations);
        app.request_rollback();
        assert!(app.operations.confirm_rollback);
        app.answer_rollback(false);
        assert!(!app.operations.rollback.is_pending());

        app.request_rollback();
        app.answer_rollback(true);
        assert!(app.operations.rollback.is_pending());
        pump_until(&mut app, &mut rx, |a| a.operations.rollback.is_success()).await;

        let report = app.operations.rollback_report.as_ref().unwrap();
        assert_eq!(report.snapshot_id, "snap-1");
        assert_eq!(report.uninstalled, vec!["chalk".to_string()]);
        assert_eq!(
            app.footer_message().as_deref(),
            Some("✓ 已回滚到快照 snap-1: 卸载 1 个包")
        );

        // 回滚失效了包列表，回到软件包页重新拉取
        app.switch_tab(Tab::Packages);
        pump_until(&mut app, &mut rx, |a| {
            a.cache.state(&packages("npm")).data.is_some()
        })
        .await;
        let names: Vec<&str> = app.visible_packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["lodash"]);
    }

    #[tokio::test]
    async fn search_filters_case_insensitively() {
        let api = mock::spawn().await;
        api.add_package("npm", "lodash", "4.17.21");
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        on_npm_packages(&mut app, &mut rx).await;

        assert_eq!(app.visible_packages().len(), 2);
        for c in "LOD".chars() {
            app.packages.search.insert(c);
        }
        let names: Vec<&str> = app.visible_packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["lodash"]);
    }

    #[tokio::test]
    async fn auto_refresh_only_runs_on_packages_tab() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        on_npm_packages(&mut app, &mut rx).await;

        let later = Instant::now() + Duration::from_secs(31);
        app.tick(later);
        assert!(!app.cache.state(&packages("npm")).is_loading);

        app.apply_settings_patch(SettingsPatch {
            auto_refresh: Some(true),
            ..Default::default()
        });
        app.tick(Instant::now());
        assert!(!app.cache.state(&packages("npm")).is_loading);
        app.tick(later);
        assert!(app.cache.state(&packages("npm")).is_loading);

        pump_until(&mut app, &mut rx, |a| {
            a.cache.state(&packages("npm")).data.is_some()
        })
        .await;
        app.switch_tab(Tab::Overview);
        app.tick(later + Duration::from_secs(60));
        assert!(!app.cache.state(&packages("npm")).is_loading);
    }

    #[tokio::test]
    async fn batch_input_is_validated_before_sending() {
        let api = mock::spawn().await;
        api.add_package("npm", "lodash", "4.17.21");
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;
        app.select_manager("npm".to_string());
        app.switch_tab(Tab::Operations);

        app.operations.batch_input = "left pad".to_string();
        app.submit_batch();
        assert!(matches!(
            app.operations.batch.error(),
            Some(GatewayError::Validation(_))
        ));

        app.operations.batch_input = "left-pad\n\n lodash \nleft-pad".to_string();
        app.submit_batch();
        assert!(app.operations.batch.is_pending());
        pump_until(&mut app, &mut rx, |a| a.operations.batch.is_success()).await;

        let report = app.operations.report.as_ref().unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, vec!["left-pad".to_string(), "lodash".to_string()]);
        assert!(app.operations.batch_input.is_empty());
    }

    #[tokio::test]
    async fn disabled_batch_operations_do_nothing() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;
        app.select_manager("npm".to_string());
        app.apply_settings_patch(SettingsPatch {
            enable_batch_operations: Some(false),
            ..Default::default()
        });

        app.operations.batch_input = "left-pad".to_string();
        app.submit_batch();
        assert_eq!(
            app.operations.batch.status(),
            crate::cache::MutationStatus::Idle
        );
    }

    #[tokio::test]
    async fn lockfile_export_is_saved_under_dated_dir() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;
        app.select_manager("npm".to_string());
        app.switch_tab(Tab::Operations);

        app.export_lockfile();
        pump_until(&mut app, &mut rx, |a| a.operations.export.is_success()).await;

        let path = app.operations.exported.clone().unwrap();
        assert!(path.starts_with(dir.path().join("exports")));
        assert_eq!(path.file_name().unwrap(), "npm-list.json");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("left-pad"));
        // 导出不失效任何查询
        assert!(!app.cache.state(&QueryKey::Managers).is_loading);
    }

    #[tokio::test]
    async fn settings_items_write_through_to_store() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&api.base_url, dir.path());
        app.switch_tab(Tab::Settings);
        assert_eq!(app.settings_focusable_count(), 12);

        // 第一项是主题
        app.activate_setting();
        assert_eq!(app.settings().theme, Settings::default().theme.next());

        app.settings_view.selected = 1;
        let before = app.settings().compact_mode;
        app.activate_setting();
        assert_eq!(app.settings().compact_mode, !before);
        assert!(matches!(
            app.focused_setting(),
            Some(SettingsItem::Toggle { key: "compact_mode", value, .. }) if *value == !before
        ));

        // 刷新间隔超出范围会被钳制
        app.settings_view.selected = 5;
        app.activate_setting();
        assert!(app.settings_view.editing);
        app.settings_view.edit_buffer = "2".to_string();
        app.confirm_settings_edit();
        assert!(!app.settings_view.editing);
        assert_eq!(app.settings().refresh_interval, 5);

        app.activate_setting();
        app.settings_view.edit_buffer = "soon".to_string();
        app.confirm_settings_edit();
        assert!(app.settings_view.editing);
        assert!(app.notice.as_ref().unwrap().is_error());

        // 重新打开后设置仍在
        let reopened = SettingsStore::open(Box::new(FileStorage::new(dir.path().to_path_buf())));
        assert_eq!(reopened.settings().refresh_interval, 5);
        assert_eq!(reopened.settings().compact_mode, !before);
    }

    #[tokio::test]
    async fn changing_api_base_rebuilds_client_and_cache() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;

        app.apply_settings_patch(text_patch("api_base_url", " /v2/api ").unwrap());
        assert_eq!(app.client.base_url(), format!("{}/v2/api", api.base_url));
        assert_eq!(app.cache.subscribers(&QueryKey::Managers), 1);
        assert!(app.cache.state(&QueryKey::Managers).is_loading);
        assert!(app.managers().is_none());
    }

    #[tokio::test]
    async fn reset_restores_defaults_but_keeps_selection() {
        let api = mock::spawn().await;
        let dir = TempDir::new().unwrap();
        let (mut app, mut rx) = test_app(&api.base_url, dir.path());
        pump_until(&mut app, &mut rx, |a| a.managers().is_some()).await;
        app.select_manager("npm".to_string());
        app.apply_settings_patch(SettingsPatch {
            show_icons: Some(false),
            ..Default::default()
        });

        app.reset_settings();
        assert_eq!(app.settings(), &Settings::default());
        assert_eq!(app.selected_manager_id().as_deref(), Some("npm"));
    }

    #[test]
    fn text_patches_parse_numbers() {
        assert_eq!(
            text_patch("request_timeout", "5000").unwrap().request_timeout,
            Some(5000)
        );
        assert!(text_patch("request_timeout", "0").is_err());
        assert!(text_patch("refresh_interval", "-1").is_err());
        assert!(toggle_patch("theme", true).is_none());
        assert_eq!(
            toggle_patch("show_icons", false).unwrap().show_icons,
            Some(false)
        );
    }
}
