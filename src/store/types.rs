//! 设置与界面选择状态的数据类型

use crate::gateway::Manager;
use serde::{Deserialize, Serialize};

/// 刷新间隔下限（秒）
pub const MIN_REFRESH_INTERVAL: u32 = 5;
/// 刷新间隔上限（秒）
pub const MAX_REFRESH_INTERVAL: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        }
    }

    /// 设置页里循环切换用
    pub fn next(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
            Theme::Auto => Theme::Light,
        }
    }
}

/// 持久化的用户偏好
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // 显示
    pub theme: Theme,
    pub compact_mode: bool,
    pub show_icons: bool,

    // 行为
    pub confirm_before_uninstall: bool,
    pub auto_refresh: bool,
    /// 秒
    pub refresh_interval: u32,

    // API
    pub api_base_url: String,
    /// 毫秒
    pub request_timeout: u64,

    // 功能开关
    pub enable_batch_operations: bool,
    pub enable_vulnerability_scanning: bool,
    pub enable_dependency_trees: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            compact_mode: false,
            show_icons: true,
            confirm_before_uninstall: true,
            auto_refresh: false,
            refresh_interval: 30,
            api_base_url: "/api".to_string(),
            request_timeout: 30_000,
            enable_batch_operations: true,
            enable_vulnerability_scanning: true,
            enable_dependency_trees: true,
        }
    }
}

/// `Settings` 的部分更新，`None` 表示保持原值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub compact_mode: Option<bool>,
    pub show_icons: Option<bool>,
    pub confirm_before_uninstall: Option<bool>,
    pub auto_refresh: Option<bool>,
    pub refresh_interval: Option<u32>,
    pub api_base_url: Option<String>,
    pub request_timeout: Option<u64>,
    pub enable_batch_operations: Option<bool>,
    pub enable_vulnerability_scanning: Option<bool>,
    pub enable_dependency_trees: Option<bool>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.theme {
            self.theme = v;
        }
        if let Some(v) = patch.compact_mode {
            self.compact_mode = v;
        }
        if let Some(v) = patch.show_icons {
            self.show_icons = v;
        }
        if let Some(v) = patch.confirm_before_uninstall {
            self.confirm_before_uninstall = v;
        }
        if let Some(v) = patch.auto_refresh {
            self.auto_refresh = v;
        }
        if let Some(v) = patch.refresh_interval {
            self.refresh_interval = v;
        }
        if let Some(v) = patch.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = patch.request_timeout {
            self.request_timeout = v;
        }
        if let Some(v) = patch.enable_batch_operations {
            self.enable_batch_operations = v;
        }
        if let Some(v) = patch.enable_vulnerability_scanning {
            self.enable_vulnerability_scanning = v;
        }
        if let Some(v) = patch.enable_dependency_trees {
            self.enable_dependency_trees = v;
        }
        self.refresh_interval = self
            .refresh_interval
            .clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Overview,
    Packages,
    Operations,
    Security,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Overview,
        Tab::Packages,
        Tab::Operations,
        Tab::Security,
        Tab::Settings,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::Packages => "packages",
            Tab::Operations => "operations",
            Tab::Security => "security",
            Tab::Settings => "settings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Overview => "概览",
            Tab::Packages => "软件包",
            Tab::Operations => "操作",
            Tab::Security => "安全",
            Tab::Settings => "设置",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// 界面选择状态，不持久化
#[derive(Debug, Clone, PartialEq)]
pub struct UiSelection {
    pub active_tab: Tab,
    /// 按 id 弱引用一个 Manager，可能已不在最新的发现结果中
    pub selected_manager: Option<String>,
}

impl Default for UiSelection {
    fn default() -> Self {
        Self {
            active_tab: Tab::Overview,
            selected_manager: None,
        }
    }
}

impl UiSelection {
    /// 在当前管理器列表中解析选中项；悬空引用返回 None
    pub fn resolve_manager<'a>(&self, managers: &'a [Manager]) -> Option<&'a Manager> {
        let id = self.selected_manager.as_deref()?;
        managers.iter().find(|m| m.id == id)
    }
}

/// `SettingsStore::state()` 的快照
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub settings: Settings,
    pub ui: UiSelection,
}
