use crate::config::HallucinationConfig;
use std::collections::BTreeMap;
use std::fmt;

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 空文本或过短
    TooShort,
    /// 以逗号或句号开头，解码异常
    LeadingPunctuation,
    /// 命中视频/字幕类幻觉词
    Denylisted(String),
    /// 同一个词反复出现
    Repetition { word: String, count: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort => write!(f, "文本过短"),
            Rejection::LeadingPunctuation => write!(f, "异常起始字符"),
            Rejection::Denylisted(phrase) => write!(f, "幻觉词: {phrase}"),
            Rejection::Repetition { word, count } => write!(f, "'{word}' 重复 {count} 次"),
        }
    }
}

/// 语音识别幻觉过滤器
pub struct HallucinationFilter<'a> {
    config: &'a HallucinationConfig,
}

impl<'a> HallucinationFilter<'a> {
    pub fn new(config: &'a HallucinationConfig) -> Self {
        Self { config }
    }

    /// 通过则返回 trim 后的文本
    pub fn filter<'t>(&self, text: &'t str) -> Result<&'t str, Rejection> {
        let verdict = self.check(text);
        if let Err(reason) = &verdict {
            log::debug!("幻觉过滤: {reason} ({text:?})");
        }
        verdict
    }

    fn check<'t>(&self, text: &'t str) -> Result<&'t str, Rejection> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.config.min_chars {
            return Err(Rejection::TooShort);
        }

        if trimmed.starts_with(',') || trimmed.starts_with('.') {
            return Err(Rejection::LeadingPunctuation);
        }

        let lower = trimmed.to_lowercase();
        if let Some(phrase) = self
            .config
            .denylist
            .iter()
            .find(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
        {
            return Err(Rejection::Denylisted(phrase.clone()));
        }

        if let Some((word, count)) = self.dominant_repetition(trimmed) {
            return Err(Rejection::Repetition { word, count });
        }

        Ok(trimmed)
    }

    fn dominant_repetition(&self, text: &str) -> Option<(String, usize)> {
        let spaced = text.replace([',', '.'], " ");
        let words: Vec<&str> = spaced.split_whitespace().collect();
        if words.len() < self.config.repeat_min_count {
            return None;
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for word in words.iter().copied() {
            *counts.entry(word).or_default() += 1;
        }
        let (word, count) = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))?;

        let ratio = count as f32 / words.len() as f32;
        if count >= self.config.repeat_min_count && ratio > self.config.repeat_ratio {
            Some((word.to_string(), count))
        } else {
            None
        }
    }
}
