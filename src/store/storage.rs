//! 设置记录的持久化后端

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// 按名字存取一份文本记录
pub trait SettingsStorage {
    /// 记录不存在时返回 `Ok(None)`
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

/// 每条记录一个 `{dir}/{key}.toml` 文件
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.toml"))
    }
}

impl SettingsStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取设置失败: {}", path.display()))?;
        Ok(Some(content))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("无法创建目录: {}", self.dir.display()))?;
        let path = self.record_path(key);
        // 先写临时文件再重命名，避免写到一半留下损坏的记录
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, value).with_context(|| format!("写入失败: {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("写入失败: {}", path.display()))?;
        Ok(())
    }
}
