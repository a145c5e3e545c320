use crate::types::{
    clamp_confidence, ClassificationResult, MatchCandidate, ResolutionStage, MAX_CANDIDATES,
};
use std::cmp::Ordering;
use std::collections::HashSet;

/// 排序规则：置信度降序，其次触发词更长者，再次注册更早者
pub fn compare(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.trigger_len.cmp(&a.trigger_len))
        .then_with(|| a.order.cmp(&b.order))
        .then_with(|| b.system.cmp(&a.system))
        .then_with(|| a.label.cmp(&b.label))
}

/// 规范化置信度、排序，并按标签去重（保留最强的一条）
pub fn rank(mut candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    for candidate in &mut candidates {
        candidate.confidence = clamp_confidence(candidate.confidence);
    }
    candidates.sort_by(compare);

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert((c.label.clone(), c.system)));
    candidates
}

/// 合并各匹配器的候选，截取前 5 条，首位达到门槛才作为最终结果
pub fn aggregate(
    candidates: Vec<MatchCandidate>,
    acceptance_bar: f32,
    stage: ResolutionStage,
) -> ClassificationResult {
    let mut candidates = rank(candidates);
    candidates.truncate(MAX_CANDIDATES);

    let best = candidates
        .first()
        .filter(|c| c.confidence > 0.0 && c.confidence >= acceptance_bar)
        .cloned();
    let is_system_command = best.as_ref().is_some_and(|b| b.system);
    let stage = if best.is_some() {
        stage
    } else {
        ResolutionStage::NoMatch
    };

    ClassificationResult {
        best,
        candidates,
        is_system_command,
        stage,
    }
}

/// 所有阶段都未接受：结果为 Unknown，保留候选供排查
pub fn unresolved(candidates: Vec<MatchCandidate>) -> ClassificationResult {
    let mut candidates = rank(candidates);
    candidates.truncate(MAX_CANDIDATES);
    ClassificationResult {
        best: None,
        candidates,
        is_system_command: false,
        stage: ResolutionStage::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchSource;
    use pretty_assertions::assert_eq;

    fn candidate(label: &str, confidence: f32, len: usize, order: usize) -> MatchCandidate {
        MatchCandidate::new(label, confidence, MatchSource::Fuzzy).ranked(len, order)
    }

    fn labels(result: &ClassificationResult) -> Vec<&str> {
        result.candidates.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn sorts_by_confidence_then_length_then_order() {
        let result = aggregate(
            vec![
                candidate("c", 0.7, 2, 0),
                candidate("b", 0.9, 2, 5),
                candidate("a", 0.9, 4, 9),
                candidate("d", 0.9, 2, 1),
            ],
            0.5,
            ResolutionStage::Skill,
        );
        assert_eq!(labels(&result), vec!["a", "d", "b", "c"]);
        assert_eq!(result.label(), "a");
        assert_eq!(result.stage, ResolutionStage::Skill);
    }

    #[test]
    fn truncates_to_five() {
        let candidates = (0..8)
            .map(|i| candidate(&format!("s{i}"), 0.9 - i as f32 * 0.01, 1, i))
            .collect();
        let result = aggregate(candidates, 0.5, ResolutionStage::Skill);
        assert_eq!(result.candidates.len(), MAX_CANDIDATES);
        assert_eq!(result.label(), "s0");
    }

    #[test]
    fn below_bar_is_unknown_but_keeps_candidates() {
        let result = aggregate(
            vec![candidate("a", 0.55, 1, 0)],
            0.7,
            ResolutionStage::Menu,
        );
        assert!(result.is_unknown());
        assert_eq!(result.confidence(), 0.0);
        assert_eq!(labels(&result), vec!["a"]);
        assert_eq!(result.stage, ResolutionStage::NoMatch);
    }

    #[test]
    fn dedupes_by_label_keeping_strongest() {
        let result = aggregate(
            vec![candidate("a", 0.6, 1, 0), candidate("a", 0.8, 1, 0)],
            0.5,
            ResolutionStage::Skill,
        );
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.confidence(), 0.8);
    }

    #[test]
    fn unresolved_never_picks_best() {
        let result = unresolved(vec![candidate("a", 0.99, 1, 0)]);
        assert!(result.is_unknown());
        assert_eq!(result.confidence(), 0.0);
        assert_eq!(labels(&result), vec!["a"]);
    }

    #[test]
    fn empty_input_is_unknown() {
        let result = aggregate(Vec::new(), 0.5, ResolutionStage::Global);
        assert!(result.is_unknown());
        assert!(result.candidates.is_empty());
        assert!(!result.is_system_command);
    }
}
