// 输入输出文件
//
// 纯文本：每行一句
// JSON manifest（.json）：每行一个 JSON 对象，字段顺序保持不变

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// 一条 manifest 记录
pub type ManifestEntry = Map<String, Value>;

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    PlainText,
    JsonManifest,
}

/// 按扩展名判断输入格式
pub fn detect_format(path: &Path) -> InputFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::JsonManifest,
        _ => InputFormat::PlainText,
    }
}

/// 读取纯文本（去掉行尾换行符，保留空行）
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取输入文件失败: {}", path.display()))?;
    Ok(content
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect())
}

/// 写出纯文本（每行一句，空输入得到空文件）
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    write_atomic(path, &content)
}

/// 读取 JSON manifest（跳过空行）
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取 manifest 失败: {}", path.display()))?;

    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: ManifestEntry = serde_json::from_str(line)
            .with_context(|| format!("解析 manifest 第 {} 行失败: {}", idx + 1, path.display()))?;
        entries.push(entry);
    }

    tracing::info!("读取 manifest: {} 条记录 ({})", entries.len(), path.display());
    Ok(entries)
}

pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut content = String::new();
    for entry in entries {
        content.push_str(&serde_json::to_string(entry)?);
        content.push('\n');
    }
    write_atomic(path, &content)
}

/// 取出每条记录的文本字段
pub fn manifest_texts(entries: &[ManifestEntry], field: &str) -> Result<Vec<String>> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| match entry.get(field) {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => bail!("第 {} 条记录的字段 {} 不是字符串: {}", idx + 1, field, other),
            None => bail!("第 {} 条记录缺少字段 {}", idx + 1, field),
        })
        .collect()
}

/// 写入输出字段（已存在时覆盖）
pub fn set_field(entries: &mut [ManifestEntry], field: &str, values: Vec<String>) {
    for (entry, value) in entries.iter_mut().zip(values) {
        entry.insert(field.to_string(), Value::String(value));
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .with_context(|| format!("写入临时文件失败: {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("写入输出文件失败: {}", path.display()))?;

    tracing::info!("已写入: {}", path.display());
    Ok(())
}
