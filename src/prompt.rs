//! 语音识别解码提示词：把当前可用的指令和技能提前告诉识别引擎

use crate::types::SkillSpec;
use crate::voice_commands::Vocabulary;

/// 调用方给了场景关键词就直接用，否则取每条可用指令的首个触发词
pub fn decoding_prompt(
    vocabulary: &Vocabulary<'_>,
    skills: &[SkillSpec],
    context_keywords: Option<&str>,
) -> String {
    let keywords = match context_keywords.map(str::trim).filter(|k| !k.is_empty()) {
        Some(keywords) => keywords.to_string(),
        None => vocabulary
            .commands()
            .filter_map(|(_, c)| c.spec.triggers.first().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let mut prompt = format!("게임 음성 명령입니다. 시스템 명령: {keywords}");
    if !skills.is_empty() {
        let names: Vec<&str> = skills.iter().map(|s| s.name.as_str()).collect();
        prompt.push_str(&format!(". 스킬: {}", names.join(", ")));
    }
    prompt
}
