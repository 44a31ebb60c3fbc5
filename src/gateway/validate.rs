//! 请求发出前的输入校验，规则与服务端保持一致

use super::GatewayError;

pub const MAX_PACKAGE_NAME_LENGTH: usize = 214;
pub const MAX_MANAGER_ID_LENGTH: usize = 50;

pub fn validate_package_name(name: &str) -> Result<(), GatewayError> {
    if name.is_empty() {
        return Err(GatewayError::Validation("包名不能为空".to_string()));
    }
    if name.chars().count() > MAX_PACKAGE_NAME_LENGTH {
        return Err(GatewayError::Validation(format!(
            "包名过长 (最多 {MAX_PACKAGE_NAME_LENGTH}): {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '/' | '_' | '.' | '-'))
    {
        return Err(GatewayError::Validation(format!("包名包含非法字符: {name}")));
    }
    if name.contains("..") {
        return Err(GatewayError::Validation(format!("包名不能包含 '..': {name}")));
    }
    Ok(())
}

pub fn validate_manager_id(id: &str) -> Result<(), GatewayError> {
    let mut chars = id.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        return Err(GatewayError::Validation(format!("无效的管理器 ID: {id}")));
    }
    if id.len() > MAX_MANAGER_ID_LENGTH {
        return Err(GatewayError::Validation(format!("管理器 ID 过长: {id}")));
    }
    Ok(())
}

pub const MAX_SNAPSHOT_ID_LENGTH: usize = 64;

/// 快照 id 作为路径段发送，只允许字母数字、`-` 和 `_`
pub fn validate_snapshot_id(id: &str) -> Result<(), GatewayError> {
    if id.is_empty() || id.len() > MAX_SNAPSHOT_ID_LENGTH {
        return Err(GatewayError::Validation(format!("无效的快照 ID: {id}")));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(GatewayError::Validation(format!("快照 ID 包含非法字符: {id}")));
    }
    Ok(())
}

/// 批量卸载输入：每行一个包名，忽略空行，去重并保持顺序
pub fn parse_batch_input(text: &str) -> Result<Vec<String>, GatewayError> {
    let mut names: Vec<String> = Vec::new();
    for line in text.lines() {
        let name = line.trim();
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        validate_package_name(name)?;
        names.push(name.to_string());
    }
    if names.is_empty() {
        return Err(GatewayError::Validation("没有输入要卸载的包".to_string()));
    }
    Ok(names)
}
