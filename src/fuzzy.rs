use crate::aggregate::rank;
use crate::config::MatchingConfig;
use crate::jamo;
use crate::types::{MatchCandidate, MatchSource, SkillSpec};
use crate::voice_commands::Vocabulary;

const EXACT_SCORE: f32 = 0.95;
const CONTAINS_SCORE: f32 = 0.85;

/// 模糊匹配的规范化：小写，去掉空白和 . , ! ?
/// "매직미사일" 与 "매직 미사일" 规范化后相同
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | ',' | '!' | '?'))
        .collect()
}

/// 一个待比较的短语，`label` 是最终返回的指令名或技能名
#[derive(Debug, Clone)]
pub struct FuzzyTarget<'a> {
    pub label: &'a str,
    pub phrase: &'a str,
    pub system: bool,
    pub order: usize,
}

/// 技能名和别名
pub fn skill_targets(skills: &[SkillSpec]) -> Vec<FuzzyTarget<'_>> {
    skills
        .iter()
        .enumerate()
        .flat_map(|(order, skill)| {
            skill.phrases().map(move |phrase| FuzzyTarget {
                label: &skill.name,
                phrase,
                system: false,
                order,
            })
        })
        .collect()
}

/// 场景内可用指令的全部触发词
pub fn command_targets<'a>(vocabulary: &Vocabulary<'a>) -> Vec<FuzzyTarget<'a>> {
    vocabulary
        .triggers()
        .map(|t| FuzzyTarget {
            label: vocabulary.name_of(t.command),
            phrase: &t.phrase,
            system: true,
            order: t.command,
        })
        .collect()
}

/// 分层模糊匹配器：精确 → 包含 → 被包含 → 编辑距离+字母相似度
pub struct FuzzyMatcher<'c> {
    config: &'c MatchingConfig,
}

impl<'c> FuzzyMatcher<'c> {
    pub fn new(config: &'c MatchingConfig) -> Self {
        Self { config }
    }

    /// 对已规范化的两段文本打分
    pub fn score(&self, text: &str, target: &str) -> Option<(f32, MatchSource)> {
        if text.is_empty() || target.is_empty() {
            return None;
        }
        if text == target {
            return Some((EXACT_SCORE, MatchSource::Exact));
        }
        if text.contains(target) {
            return Some((CONTAINS_SCORE, MatchSource::Fuzzy));
        }

        let text_len = text.chars().count();
        let target_len = target.chars().count();
        if target.contains(text) {
            let ratio = text_len as f32 / target_len as f32;
            return Some(((CONTAINS_SCORE * ratio).min(CONTAINS_SCORE), MatchSource::Fuzzy));
        }

        let max_len = text_len.max(target_len);
        let char_similarity = 1.0 - strsim::levenshtein(text, target) as f32 / max_len as f32;
        let phonetic_similarity = jamo::similarity(text, target);
        let combined = self.config.char_weight * char_similarity
            + self.config.phonetic_weight * phonetic_similarity;
        let source = if phonetic_similarity > char_similarity {
            MatchSource::Phonetic
        } else {
            MatchSource::Fuzzy
        };
        Some((combined.clamp(0.0, 1.0), source))
    }

    /// 每个标签保留最高分短语，达到阈值的才成为候选
    pub fn match_text(&self, text: &str, targets: &[FuzzyTarget<'_>]) -> Vec<MatchCandidate> {
        let text = normalize(text);
        if text.is_empty() {
            return Vec::new();
        }

        let mut best: Vec<MatchCandidate> = Vec::new();
        for target in targets {
            let phrase = normalize(target.phrase);
            let Some((score, source)) = self.score(&text, &phrase) else {
                continue;
            };
            if score < self.config.fuzzy_threshold {
                continue;
            }
            let len = phrase.chars().count();
            let candidate = MatchCandidate::new(target.label, score, source)
                .system(target.system)
                .ranked(len, target.order);

            match best
                .iter_mut()
                .find(|c| c.label == target.label && c.system == target.system)
            {
                Some(existing) => {
                    let stronger = candidate.confidence > existing.confidence
                        || (candidate.confidence == existing.confidence
                            && candidate.trigger_len > existing.trigger_len);
                    if stronger {
                        *existing = candidate;
                    }
                }
                None => best.push(candidate),
            }
        }
        rank(best)
    }
}
