//! 设置存储：用户偏好（持久化）+ 界面选择（仅内存）

pub mod storage;
pub mod types;

pub use storage::{FileStorage, SettingsStorage};
pub use types::{Settings, SettingsPatch, StoreState, Tab, Theme, UiSelection};

/// 持久化记录的固定名字
pub const SETTINGS_KEY: &str = "package-audit-settings";

pub struct SettingsStore {
    settings: Settings,
    ui: UiSelection,
    storage: Box<dyn SettingsStorage>,
}

impl SettingsStore {
    /// 从存储加载设置；记录不存在或损坏时使用默认值
    pub fn open(storage: Box<dyn SettingsStorage>) -> Self {
        let settings = match storage.load(SETTINGS_KEY) {
            Ok(Some(content)) => match toml::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    // 经过一次空 patch 以套用取值范围
                    settings.apply(SettingsPatch::default());
                    settings
                }
                Err(e) => {
                    log::warn!("设置记录无法解析，使用默认值: {}", e);
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("读取设置失败，使用默认值: {:#}", e);
                Settings::default()
            }
        };

        Self {
            settings,
            ui: UiSelection::default(),
            storage,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> StoreState {
        StoreState {
            settings: self.settings.clone(),
            ui: self.ui.clone(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ui(&self) -> &UiSelection {
        &self.ui
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        self.settings.apply(patch);
        self.persist();
    }

    /// 恢复默认设置，不影响界面选择状态
    pub fn reset_settings(&mut self) {
        self.settings = Settings::default();
        self.persist();
    }

    pub fn set_selected_manager(&mut self, manager_id: Option<String>) {
        self.ui.selected_manager = manager_id;
    }

    pub fn set_active_tab(&mut self, tab: Tab) {
        self.ui.active_tab = tab;
    }

    /// 只序列化 `Settings`；失败只记日志，不影响内存状态
    fn persist(&mut self) {
        let content = match toml::to_string_pretty(&self.settings) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("设置序列化失败: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.save(SETTINGS_KEY, &content) {
            log::warn!("保存设置失败: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// 内存存储，可模拟写入失败；记录通过 Rc 共享给测试检查
    #[derive(Clone, Default)]
    struct MemoryStorage {
        records: Rc<RefCell<HashMap<String, String>>>,
        fail_writes: bool,
        writes: Rc<RefCell<usize>>,
    }

    impl SettingsStorage for MemoryStorage {
        fn load(&self, key: &str) -> Result<Option<String>> {
            Ok(self.records.borrow().get(key).cloned())
        }

        fn save(&mut self, key: &str, value: &str) -> Result<()> {
            *self.writes.borrow_mut() += 1;
            if self.fail_writes {
                return Err(anyhow!("quota exceeded"));
            }
            self.records
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn store_with(storage: &MemoryStorage) -> SettingsStore {
        SettingsStore::open(Box::new(storage.clone()))
    }

    #[test]
    fn first_run_uses_defaults() {
        let store = store_with(&MemoryStorage::default());
        let state = store.state();
        assert_eq!(state.settings, Settings::default());
        assert_eq!(state.ui.active_tab, Tab::Overview);
        assert_eq!(state.ui.selected_manager, None);
    }

    #[test]
    fn updates_merge_in_call_order() {
        let mut store = store_with(&MemoryStorage::default());

        store.update_settings(SettingsPatch {
            theme: Some(Theme::Dark),
            refresh_interval: Some(60),
            ..Default::default()
        });
        store.update_settings(SettingsPatch {
            compact_mode: Some(true),
            refresh_interval: Some(120),
            ..Default::default()
        });

        let mut expected = Settings::default();
        expected.theme = Theme::Dark;
        expected.compact_mode = true;
        expected.refresh_interval = 120;
        assert_eq!(store.settings(), &expected);
    }

    #[test]
    fn refresh_interval_is_clamped() {
        let mut store = store_with(&MemoryStorage::default());
        store.update_settings(SettingsPatch {
            refresh_interval: Some(1),
            ..Default::default()
        });
        assert_eq!(store.settings().refresh_interval, 5);
        store.update_settings(SettingsPatch {
            refresh_interval: Some(10_000),
            ..Default::default()
        });
        assert_eq!(store.settings().refresh_interval, 300);
    }

    #[test]
    fn reset_restores_defaults_and_keeps_selection() {
        let mut store = store_with(&MemoryStorage::default());
        store.set_selected_manager(Some("npm".to_string()));
        store.set_active_tab(Tab::Packages);
        store.update_settings(SettingsPatch {
            theme: Some(Theme::Auto),
            confirm_before_uninstall: Some(false),
            enable_batch_operations: Some(false),
            api_base_url: Some("http://example.test/api".to_string()),
            ..Default::default()
        });

        store.reset_settings();

        let state = store.state();
        assert_eq!(state.settings, Settings::default());
        assert_eq!(state.ui.active_tab, Tab::Packages);
        assert_eq!(state.ui.selected_manager.as_deref(), Some("npm"));
    }

    #[test]
    fn every_update_persists_settings_only() {
        let storage = MemoryStorage::default();
        let mut store = store_with(&storage);
        store.set_selected_manager(Some("pip".to_string()));
        store.set_active_tab(Tab::Security);
        assert_eq!(*storage.writes.borrow(), 0);

        store.update_settings(SettingsPatch {
            show_icons: Some(false),
            ..Default::default()
        });
        assert_eq!(*storage.writes.borrow(), 1);

        let record = storage.records.borrow().get(SETTINGS_KEY).cloned().unwrap();
        assert!(record.contains("show_icons = false"));
        assert!(!record.contains("selected_manager"));
        assert!(!record.contains("active_tab"));
        assert!(!record.contains("pip"));
    }

    #[test]
    fn persisted_settings_survive_reopen() {
        let storage = MemoryStorage::default();
        {
            let mut store = store_with(&storage);
            store.set_selected_manager(Some("brew".to_string()));
            store.update_settings(SettingsPatch {
                theme: Some(Theme::Dark),
                request_timeout: Some(5_000),
                ..Default::default()
            });
        }

        let reopened = store_with(&storage);
        assert_eq!(reopened.settings().theme, Theme::Dark);
        assert_eq!(reopened.settings().request_timeout, 5_000);
        assert_eq!(reopened.ui().selected_manager, None);
    }

    #[test]
    fn failed_writes_are_swallowed() {
        let storage = MemoryStorage {
            fail_writes: true,
            ..Default::default()
        };
        let mut store = store_with(&storage);

        store.update_settings(SettingsPatch {
            auto_refresh: Some(true),
            ..Default::default()
        });

        assert!(store.settings().auto_refresh);
        assert_eq!(*storage.writes.borrow(), 1);
        assert!(storage.records.borrow().is_empty());
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults() {
        let storage = MemoryStorage::default();
        storage
            .records
            .borrow_mut()
            .insert(SETTINGS_KEY.to_string(), "theme = [".to_string());

        let store = store_with(&storage);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn partial_record_fills_missing_fields() {
        let storage = MemoryStorage::default();
        storage.records.borrow_mut().insert(
            SETTINGS_KEY.to_string(),
            "theme = \"dark\"\nrefresh_interval = 2\n".to_string(),
        );

        let store = store_with(&storage);
        assert_eq!(store.settings().theme, Theme::Dark);
        assert_eq!(store.settings().refresh_interval, 5);
        assert!(store.settings().show_icons);
    }

    #[test]
    fn tab_ids_are_distinct() {
        let ids: std::collections::HashSet<&str> = Tab::ALL.iter().map(|tab| tab.id()).collect();
        assert_eq!(ids.len(), Tab::ALL.len());
        assert_eq!(Tab::Operations.id(), "operations");
        assert_eq!(Tab::Settings.next(), Tab::Overview);
        assert_eq!(Tab::Overview.prev(), Tab::Settings);
    }
}
