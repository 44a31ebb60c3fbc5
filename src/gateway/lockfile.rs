use super::LockfileExport;
use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// 导出后要落盘的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockfileArtifact {
    pub filename: String,
    pub content: String,
}

impl LockfileExport {
    /// 根据 format 决定文件名和序列化方式
    pub fn artifact(&self, manager_id: &str) -> LockfileArtifact {
        match self.format.as_str() {
            "requirements.txt" => LockfileArtifact {
                filename: "requirements.txt".to_string(),
                content: match &self.lockfile {
                    Value::String(text) => text.clone(),
                    other => pretty(other),
                },
            },
            "npm-list-json" => LockfileArtifact {
                filename: "npm-list.json".to_string(),
                content: pretty(&self.lockfile),
            },
            _ => LockfileArtifact {
                filename: format!("{manager_id}-lockfile.json"),
                content: pretty(&self.lockfile),
            },
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub struct LockfileSaver {
    base_dir: PathBuf,
}

impl LockfileSaver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// 写入 `{base_dir}/YYYY-MM-DD/{filename}`，同日同名覆盖
    pub fn save(&self, artifact: &LockfileArtifact) -> Result<PathBuf> {
        let day = Local::now().format("%Y-%m-%d").to_string();
        let dir = self.base_dir.join(day);
        fs::create_dir_all(&dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;

        let filepath = dir.join(&artifact.filename);
        fs::write(&filepath, &artifact.content)
            .with_context(|| format!("写入失败: {}", filepath.display()))?;

        log::info!("锁文件已导出: {}", filepath.display());
        Ok(filepath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requirements_txt_is_written_verbatim() {
        let export: LockfileExport = serde_json::from_value(json!({
            "format": "requirements.txt",
            "lockfile": "flask==2.0\n"
        }))
        .unwrap();

        let artifact = export.artifact("pip");
        assert_eq!(artifact.filename, "requirements.txt");
        assert_eq!(artifact.content, "flask==2.0\n");
    }

    #[test]
    fn npm_list_json_is_pretty_printed() {
        let tree = json!({"name": "app", "dependencies": {"left-pad": {"version": "1.3.0"}}});
        let export = LockfileExport {
            format: "npm-list-json".to_string(),
            lockfile: tree.clone(),
        };

        let artifact = export.artifact("npm");
        assert_eq!(artifact.filename, "npm-list.json");
        assert_eq!(artifact.content, serde_json::to_string_pretty(&tree).unwrap());
        assert!(artifact.content.contains("\n  "));
    }

    #[test]
    fn unknown_format_is_named_after_the_manager() {
        let export: LockfileExport =
            serde_json::from_value(json!({"lockfile": {"formulae": ["wget"]}})).unwrap();
        assert_eq!(export.format, "lockfile");

        let artifact = export.artifact("brew");
        assert_eq!(artifact.filename, "brew-lockfile.json");
        let parsed: Value = serde_json::from_str(&artifact.content).unwrap();
        assert_eq!(parsed, json!({"formulae": ["wget"]}));
    }

    #[test]
    fn saver_writes_into_dated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let saver = LockfileSaver::new(dir.path().to_path_buf());
        let artifact = LockfileArtifact {
            filename: "requirements.txt".to_string(),
            content: "flask==2.0\n".to_string(),
        };

        let path = saver.save(&artifact).unwrap();

        assert_eq!(path.file_name().unwrap(), "requirements.txt");
        assert_eq!(path.parent().unwrap().parent().unwrap(), dir.path());
        assert_eq!(fs::read_to_string(&path).unwrap(), "flask==2.0\n");
    }
}
