use crate::aggregate::rank;
use crate::context::{ContextScope, ContextTag};
use crate::error::{ConfigError, Result};
use crate::types::{CommandSpec, MatchCandidate, MatchSource};
use std::collections::HashSet;

/// 关键词匹配的置信度上限
pub const PATTERN_CEILING: f32 = 0.95;
const PATTERN_BASE: f32 = 0.5;

/// 关键词匹配的文本规范化：trim、小写、去掉 . , ! ?、合并空白
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!' | '?'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 已注册的指令
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub spec: CommandSpec,
    /// 空表示任意场景可用
    pub scopes: Vec<ContextScope>,
}

impl RegisteredCommand {
    fn available_in(&self, context: &ContextTag) -> bool {
        match context {
            ContextTag::Unscoped | ContextTag::Unknown(_) => true,
            _ => self.scopes.is_empty() || self.scopes.iter().any(|s| s.admits(context)),
        }
    }
}

/// 触发词表中的一项，`command` 为指令注册下标
#[derive(Debug, Clone)]
pub struct TriggerEntry {
    pub phrase: String,
    pub normalized: String,
    pub len: usize,
    pub command: usize,
}

/// 指令表快照。触发词按注册顺序排成显式列表：
/// 同分时先注册的指令胜出，同一指令内长触发词应排在前面。
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    triggers: Vec<TriggerEntry>,
}

impl CommandRegistry {
    pub fn new(specs: Vec<CommandSpec>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut commands = Vec::with_capacity(specs.len());
        let mut triggers = Vec::new();

        for (index, mut spec) in specs.into_iter().enumerate() {
            spec.name = spec.name.trim().to_string();
            if spec.name.is_empty() {
                return Err(ConfigError::EmptyCommandName(index));
            }
            if !names.insert(spec.name.clone()) {
                return Err(ConfigError::DuplicateCommand(spec.name));
            }

            let mut scopes = Vec::with_capacity(spec.contexts.len());
            for raw in &spec.contexts {
                let scope = ContextScope::parse(raw).ok_or_else(|| ConfigError::InvalidScope {
                    command: spec.name.clone(),
                    scope: raw.clone(),
                })?;
                scopes.push(scope);
            }

            for phrase in &spec.triggers {
                let normalized = normalize(phrase);
                if normalized.is_empty() {
                    return Err(ConfigError::EmptyTrigger {
                        command: spec.name.clone(),
                    });
                }
                triggers.push(TriggerEntry {
                    phrase: phrase.clone(),
                    len: normalized.chars().count(),
                    normalized,
                    command: index,
                });
            }

            commands.push(RegisteredCommand { spec, scopes });
        }

        log::debug!(
            "已注册 {} 条指令，{} 个触发词",
            commands.len(),
            triggers.len()
        );
        Ok(Self { commands, triggers })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[RegisteredCommand] {
        &self.commands
    }

    pub fn triggers(&self) -> &[TriggerEntry] {
        &self.triggers
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.commands.iter().position(|c| c.spec.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        self.index_of(name).map(|i| &self.commands[i])
    }

    /// 该场景下可用的指令子集
    pub fn vocabulary(&self, context: &ContextTag) -> Vocabulary<'_> {
        Vocabulary {
            registry: self,
            active: self
                .commands
                .iter()
                .map(|c| c.available_in(context))
                .collect(),
        }
    }
}

/// 场景收窄后的指令集合，只会缩小不会扩大
#[derive(Debug, Clone)]
pub struct Vocabulary<'a> {
    registry: &'a CommandRegistry,
    active: Vec<bool>,
}

impl<'a> Vocabulary<'a> {
    pub fn contains(&self, name: &str) -> bool {
        self.registry
            .index_of(name)
            .is_some_and(|i| self.active[i])
    }

    /// (注册下标, 指令)，按注册顺序
    pub fn commands(&self) -> impl Iterator<Item = (usize, &'a RegisteredCommand)> + '_ {
        self.registry
            .commands
            .iter()
            .enumerate()
            .filter(|(i, _)| self.active[*i])
    }

    pub fn triggers(&self) -> impl Iterator<Item = &'a TriggerEntry> + '_ {
        self.registry
            .triggers
            .iter()
            .filter(|t| self.active[t.command])
    }

    pub fn name_of(&self, index: usize) -> &'a str {
        &self.registry.commands[index].spec.name
    }
}

/// 关键词指令匹配器
pub struct VoiceCommandMatcher<'v, 'a> {
    vocabulary: &'v Vocabulary<'a>,
}

impl<'v, 'a> VoiceCommandMatcher<'v, 'a> {
    pub fn new(vocabulary: &'v Vocabulary<'a>) -> Self {
        Self { vocabulary }
    }

    /// 触发词是规范化文本的子串即命中，每条指令只保留得分最高的触发词
    pub fn match_text(&self, text: &str) -> Vec<MatchCandidate> {
        let normalized = normalize(text);
        let text_len = normalized.chars().count();
        if text_len == 0 {
            return Vec::new();
        }

        let mut best: Vec<Option<(f32, usize)>> = vec![None; self.vocabulary.registry.len()];
        for trigger in self.vocabulary.triggers() {
            if !normalized.contains(&trigger.normalized) {
                continue;
            }
            let confidence = if trigger.normalized == normalized {
                PATTERN_CEILING
            } else {
                (PATTERN_BASE + trigger.len as f32 / text_len as f32).min(PATTERN_CEILING)
            };
            let slot = &mut best[trigger.command];
            let better = match slot {
                None => true,
                Some((c, len)) => confidence > *c || (confidence == *c && trigger.len > *len),
            };
            if better {
                *slot = Some((confidence, trigger.len));
            }
        }

        let candidates = best
            .into_iter()
            .enumerate()
            .filter_map(|(index, hit)| {
                hit.map(|(confidence, len)| {
                    MatchCandidate::new(
                        self.vocabulary.name_of(index),
                        confidence,
                        MatchSource::Pattern,
                    )
                    .system(true)
                    .ranked(len, index)
                })
            })
            .collect();
        rank(candidates)
    }
}
