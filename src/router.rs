use crate::aggregate::{aggregate, unresolved};
use crate::config::EngineSettings;
use crate::context::{ContextScope, ContextTag};
use crate::external::{ExternalClassifier, LabelHint};
use crate::fuzzy::{self, command_targets, skill_targets, FuzzyMatcher};
use crate::hallucination::HallucinationFilter;
use crate::types::{ClassificationResult, MatchCandidate, MatchSource, ResolutionStage, SkillSpec};
use crate::voice_commands::{CommandRegistry, VoiceCommandMatcher, Vocabulary};

/// 按场景决定指令范围和匹配顺序。
/// 系统指令永远优先于技能；场景只会收窄词表，不会扩大。
pub struct ContextRouter<'a> {
    registry: &'a CommandRegistry,
    settings: &'a EngineSettings,
    external: Option<&'a dyn ExternalClassifier>,
}

impl<'a> ContextRouter<'a> {
    pub fn new(registry: &'a CommandRegistry, settings: &'a EngineSettings) -> Self {
        Self {
            registry,
            settings,
            external: None,
        }
    }

    pub fn with_external(mut self, external: Option<&'a dyn ExternalClassifier>) -> Self {
        self.external = external;
        self
    }

    pub fn route(
        &self,
        context: Option<&str>,
        text: &str,
        skills: &[SkillSpec],
    ) -> ClassificationResult {
        let text = match HallucinationFilter::new(&self.settings.hallucination).filter(text) {
            Ok(text) => text,
            Err(reason) => {
                log::info!("识别文本被过滤: {reason}");
                return ClassificationResult::unknown(ResolutionStage::Rejected);
            }
        };

        let context = ContextTag::parse(context);
        let vocabulary = self.registry.vocabulary(&context);
        let acceptance = &self.settings.acceptance;
        let mut rejected: Vec<MatchCandidate> = Vec::new();

        // 关键词匹配始终在完整词表上进行，长触发词先于通用触发词
        let pattern_hits = VoiceCommandMatcher::new(&vocabulary).match_text(text);

        // 游戏中的移动/暂停等高频指令：首位命中属于快速通道集合才直接返回，不与技能名竞争
        if self.is_fast_path(&context) {
            let result = aggregate(
                pattern_hits.clone(),
                acceptance.fast_path,
                ResolutionStage::FastPath,
            );
            let fast = result.best.as_ref().is_some_and(|best| {
                self.settings
                    .fast_path
                    .commands
                    .iter()
                    .any(|name| *name == best.label)
            });
            if fast {
                log::info!("{context}: 快速通道指令 {} ({:.2})", result.label(), result.confidence());
                return result;
            }
        }

        let (bar, stage) = if context.is_menu() {
            (acceptance.menu, ResolutionStage::Menu)
        } else {
            (acceptance.global, ResolutionStage::Global)
        };
        let hits = self.fuzzy_fallback(text, &vocabulary, pattern_hits);
        let result = aggregate(hits.clone(), bar, stage);
        if !result.is_unknown() {
            log::info!("{context}: 系统指令 {} ({:.2})", result.label(), result.confidence());
            return result;
        }
        log::debug!("{context}: 系统指令未命中，候选 {}", hits.len());
        rejected.extend(hits);

        let skills = self.merge_aliases(skills);
        let matcher = FuzzyMatcher::new(&self.settings.matching);
        let hits = matcher.match_text(text, &skill_targets(&skills));
        let result = aggregate(
            hits.clone(),
            self.settings.matching.fuzzy_threshold,
            ResolutionStage::Skill,
        );
        if !result.is_unknown() {
            log::info!("{context}: 技能 {} ({:.2})", result.label(), result.confidence());
            return result;
        }
        rejected.extend(hits);

        if let Some(candidate) = self.consult_external(text, &vocabulary, &skills) {
            rejected.push(candidate);
            let mut result = aggregate(rejected, bar, ResolutionStage::External);
            // 外部分类器只能新增自己的结论，不能复活之前被拒的候选
            if result
                .best
                .as_ref()
                .is_some_and(|b| b.source == MatchSource::External)
            {
                log::info!("{context}: 外部分类 {} ({:.2})", result.label(), result.confidence());
                return result;
            }
            result.best = None;
            result.is_system_command = false;
            result.stage = ResolutionStage::NoMatch;
            return result;
        }

        log::debug!("{context}: 未匹配到指令或技能");
        unresolved(rejected)
    }

    fn is_fast_path(&self, context: &ContextTag) -> bool {
        self.settings
            .fast_path
            .contexts
            .iter()
            .filter_map(|raw| ContextScope::parse(raw))
            .any(|scope| scope.admits(context))
    }

    /// 关键词未命中且开启了模糊指令匹配时，对触发词做模糊匹配
    fn fuzzy_fallback(
        &self,
        text: &str,
        vocabulary: &Vocabulary<'_>,
        hits: Vec<MatchCandidate>,
    ) -> Vec<MatchCandidate> {
        if !hits.is_empty() || !self.settings.matching.fuzzy_system_commands {
            return hits;
        }
        FuzzyMatcher::new(&self.settings.matching).match_text(text, &command_targets(vocabulary))
    }

    /// 把配置里的别名表并入请求中的技能（按规范化后的技能名对应）
    fn merge_aliases(&self, skills: &[SkillSpec]) -> Vec<SkillSpec> {
        skills
            .iter()
            .map(|skill| {
                let mut skill = skill.clone();
                let key = fuzzy::normalize(&skill.name);
                for (name, aliases) in &self.settings.skill_aliases {
                    if fuzzy::normalize(name) == key {
                        for alias in aliases {
                            skill.push_alias(alias);
                        }
                    }
                }
                skill
            })
            .collect()
    }

    fn consult_external(
        &self,
        text: &str,
        vocabulary: &Vocabulary<'_>,
        skills: &[SkillSpec],
    ) -> Option<MatchCandidate> {
        let external = self.external?;

        let mut labels: Vec<LabelHint<'_>> = vocabulary
            .commands()
            .map(|(_, c)| LabelHint {
                name: &c.spec.name,
                description: &c.spec.description,
                examples: &c.spec.triggers,
                system: true,
            })
            .collect();
        labels.extend(skills.iter().map(|s| LabelHint {
            name: &s.name,
            description: "",
            examples: &s.aliases,
            system: false,
        }));

        let verdict = match external.classify(text, &labels) {
            Ok(Some(verdict)) => verdict,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("外部分类失败，忽略: {e}");
                return None;
            }
        };

        if vocabulary.contains(&verdict.label) {
            let index = self.registry.index_of(&verdict.label).unwrap_or(usize::MAX);
            return Some(
                MatchCandidate::new(&verdict.label, verdict.confidence, MatchSource::External)
                    .system(true)
                    .ranked(0, index),
            );
        }
        if let Some(order) = skills.iter().position(|s| s.name == verdict.label) {
            return Some(
                MatchCandidate::new(&verdict.label, verdict.confidence, MatchSource::External)
                    .ranked(0, order),
            );
        }
        log::warn!("外部分类返回未注册的标签，丢弃: {}", verdict.label);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::external::StaticClassifier;
    use crate::types::CommandSpec;
    use pretty_assertions::assert_eq;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(EngineConfig::default().commands).unwrap()
    }

    fn route(context: Option<&str>, text: &str, skills: &str) -> ClassificationResult {
        let registry = registry();
        let settings = EngineSettings::default();
        ContextRouter::new(&registry, &settings).route(
            context,
            text,
            &SkillSpec::parse_list(skills),
        )
    }

    #[test]
    fn rejected_text_short_circuits() {
        let result = route(None, "구독 좋아요 부탁드려요", "매직 미사일");
        assert_eq!(result.stage, ResolutionStage::Rejected);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn fast_path_resolves_movement() {
        let result = route(Some("InGame_Playing"), "왼쪽으로 가", "매직 미사일");
        assert_eq!(result.label(), "MoveLeft");
        assert_eq!(result.stage, ResolutionStage::FastPath);
        assert!(result.is_system_command);
        assert!(result
            .candidates
            .iter()
            .all(|c| c.source == MatchSource::Pattern));
    }

    #[test]
    fn fast_path_does_not_shadow_longer_triggers() {
        let result = route(Some("in-play"), "메인 메뉴로 가줘", "");
        assert_eq!(result.label(), "GoToMainMenu");
        assert_eq!(result.stage, ResolutionStage::Global);

        let result = route(Some("in-play"), "메뉴 닫", "");
        assert_eq!(result.label(), "CloseMenu");
        assert_eq!(result.stage, ResolutionStage::Global);

        let result = route(Some("in-play"), "설정 메뉴 열어", "");
        assert_eq!(result.label(), "OpenSettings");

        let result = route(Some("in-play"), "메뉴", "");
        assert_eq!(result.label(), "OpenMenu");
        assert_eq!(result.stage, ResolutionStage::FastPath);
    }

    #[test]
    fn in_play_skill_falls_through_fast_path() {
        let result = route(Some("in-play"), "토네이도", "매직 미사일, 토네이도");
        assert_eq!(result.label(), "토네이도");
        assert_eq!(result.stage, ResolutionStage::Skill);
        assert!(!result.is_system_command);
    }

    #[test]
    fn in_play_non_fast_command_uses_global_pass() {
        let result = route(Some("in-play"), "인벤토리 열어", "");
        assert_eq!(result.label(), "OpenInventory");
        assert_eq!(result.stage, ResolutionStage::Global);
    }

    #[test]
    fn menu_bar_is_stricter() {
        // 0.5 + 1/12：全局通过，菜单不通过
        let unscoped = route(None, "맵 좀 보여줄 수 있니", "");
        assert_eq!(unscoped.label(), "OpenMap");

        let menu = route(Some("Menu_MainMenu"), "맵 좀 보여줄 수 있니", "");
        assert!(menu.is_unknown());
        assert_eq!(menu.candidates[0].label, "OpenMap");
    }

    #[test]
    fn menu_scoped_command_only_in_menu() {
        let menu = route(Some("menu:chapterselect"), "챕터 3", "");
        assert_eq!(menu.label(), "SelectChapter3");
        assert_eq!(menu.stage, ResolutionStage::Menu);

        let in_play = route(Some("in-play"), "챕터 3", "");
        assert!(in_play.is_unknown());
    }

    #[test]
    fn system_command_beats_skill() {
        let result = route(None, "설정", "설정 마법");
        assert_eq!(result.label(), "OpenSettings");
        assert!(result.is_system_command);
    }

    #[test]
    fn configured_aliases_extend_request_skills() {
        let result = route(Some("in-play"), "회오리", "토네이도, 슬래시");
        assert_eq!(result.label(), "토네이도");
    }

    #[test]
    fn fuzzy_system_commands_are_opt_in() {
        let registry = CommandRegistry::new(vec![CommandSpec::new(
            "OpenInventory",
            "",
            &["인벤토리"],
        )])
        .unwrap();
        let mut settings = EngineSettings::default();

        let off = ContextRouter::new(&registry, &settings).route(None, "인벤토니", &[]);
        assert!(off.is_unknown());

        settings.matching.fuzzy_system_commands = true;
        let on = ContextRouter::new(&registry, &settings).route(None, "인벤토니", &[]);
        assert_eq!(on.label(), "OpenInventory");
        assert!(on.is_system_command);
    }

    #[test]
    fn external_classifier_runs_last() {
        let registry = registry();
        let settings = EngineSettings::default();
        let external = StaticClassifier::new()
            .answer("보물 상자 어디 있지", "OpenMap", 0.8)
            .answer("설정", "OpenStore", 0.99);
        let router = ContextRouter::new(&registry, &settings).with_external(Some(&external));

        let result = router.route(None, "보물 상자 어디 있지", &[]);
        assert_eq!(result.label(), "OpenMap");
        assert_eq!(result.stage, ResolutionStage::External);
        assert_eq!(result.best.as_ref().unwrap().source, MatchSource::External);
        assert!(result.is_system_command);

        // 关键词已命中时不会询问外部分类器
        let result = router.route(None, "설정", &[]);
        assert_eq!(result.label(), "OpenSettings");
    }

    #[test]
    fn external_cannot_expand_vocabulary() {
        let registry = registry();
        let settings = EngineSettings::default();
        let external = StaticClassifier::new()
            .answer("저쪽으로 가자", "MoveLeft", 0.9)
            .answer("아무거나", "FlyAway", 0.9);
        let router = ContextRouter::new(&registry, &settings).with_external(Some(&external));

        // MoveLeft 不在菜单场景的词表里
        assert!(router
            .route(Some("menu:main"), "저쪽으로 가자", &[])
            .is_unknown());
        assert!(router.route(None, "아무거나", &[]).is_unknown());
    }
}
