//! 产物文件命名
//!
//! 文件名格式: `{slug}_{YYYYmmdd_HHMMSS}.{ext}`，冲突时追加 `_{n}`

use chrono::{DateTime, TimeZone};

/// 无法从 prompt 提取 slug 时的回退值
pub const FALLBACK_SLUG: &str = "generated_music";

/// 文件名配置
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// slug 最多保留的单词数
    pub max_words: usize,
    /// slug 最大字符数
    pub max_len: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_words: 5,
            max_len: 40,
        }
    }
}

/// 将 prompt 转换为文件名安全的 slug
///
/// 只保留 ASCII 字母数字，单词之间用 `_` 连接
pub fn slugify(prompt: &str, config: &NamingConfig) -> String {
    let mut slug = String::new();

    let words = prompt
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(config.max_words);

    for word in words {
        let candidate_len = slug.len() + word.len() + usize::from(!slug.is_empty());
        if candidate_len > config.max_len {
            break;
        }
        if !slug.is_empty() {
            slug.push('_');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// 生成产物文件名
///
/// `attempt` 为 0 时不带序号后缀
pub fn artifact_file_name<Tz: TimeZone>(
    slug: &str,
    at: &DateTime<Tz>,
    attempt: u32,
    extension: &str,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = at.format("%Y%m%d_%H%M%S");
    if attempt == 0 {
        format!("{}_{}.{}", slug, timestamp, extension)
    } else {
        format!("{}_{}_{}.{}", slug, timestamp, attempt + 1, extension)
    }
}
