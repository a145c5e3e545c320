use serde::{Deserialize, Serialize};

/// 未识别时对外返回的标签
pub const UNKNOWN_LABEL: &str = "Unknown";

/// 候选列表最多保留的条数
pub const MAX_CANDIDATES: usize = 5;

/// 系统指令定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 触发词，按优先级排列（长的、具体的放前面）
    pub triggers: Vec<String>,
    /// 可用场景，空表示所有场景均可用
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

impl CommandSpec {
    pub fn new(name: &str, description: &str, triggers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            contexts: Vec::new(),
        }
    }

    pub fn in_contexts(mut self, contexts: &[&str]) -> Self {
        self.contexts = contexts.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// 调用方随请求提供的技能
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SkillSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        for alias in aliases {
            self.push_alias(alias);
        }
        self
    }

    /// 追加别名，忽略空串和重复项
    pub fn push_alias(&mut self, alias: &str) {
        let alias = alias.trim();
        if alias.is_empty() || alias == self.name || self.aliases.iter().any(|a| a == alias) {
            return;
        }
        self.aliases.push(alias.to_string());
    }

    /// 解析逗号分隔的技能列表，如 "매직 미사일, 매직 실드"
    pub fn parse_list(raw: &str) -> Vec<SkillSpec> {
        let mut skills: Vec<SkillSpec> = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !skills.iter().any(|s| s.name == name) {
                skills.push(SkillSpec::new(name));
            }
        }
        skills
    }

    /// 技能名及全部别名
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// 候选来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Exact,
    Pattern,
    Fuzzy,
    Phonetic,
    External,
}

/// 单个匹配候选
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub label: String,
    pub confidence: f32,
    pub source: MatchSource,
    /// 是否为系统指令（否则为技能）
    #[serde(skip)]
    pub system: bool,
    /// 命中触发词的字符数，用于同分排序
    #[serde(skip)]
    pub trigger_len: usize,
    /// 注册顺序，越小越优先
    #[serde(skip)]
    pub order: usize,
}

impl MatchCandidate {
    pub fn new(label: &str, confidence: f32, source: MatchSource) -> Self {
        Self {
            label: label.to_string(),
            confidence: clamp_confidence(confidence),
            source,
            system: false,
            trigger_len: 0,
            order: usize::MAX,
        }
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn ranked(mut self, trigger_len: usize, order: usize) -> Self {
        self.trigger_len = trigger_len;
        self.order = order;
        self
    }
}

/// 把置信度限制在 [0, 1]，NaN 视为 0
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 结果由哪个阶段产生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    /// 幻觉过滤拒绝
    Rejected,
    /// 游戏中快速通道
    FastPath,
    /// 菜单场景指令
    Menu,
    /// 全局指令
    Global,
    /// 技能匹配
    Skill,
    /// 外部分类器
    External,
    /// 全部未命中
    NoMatch,
}

/// 一次分类的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// None 表示 Unknown
    pub best: Option<MatchCandidate>,
    pub candidates: Vec<MatchCandidate>,
    pub is_system_command: bool,
    pub stage: ResolutionStage,
}

impl ClassificationResult {
    pub fn unknown(stage: ResolutionStage) -> Self {
        Self {
            best: None,
            candidates: Vec::new(),
            is_system_command: false,
            stage,
        }
    }

    pub fn label(&self) -> &str {
        self.best.as_ref().map_or(UNKNOWN_LABEL, |b| b.label.as_str())
    }

    pub fn confidence(&self) -> f32 {
        self.best.as_ref().map_or(0.0, |b| b.confidence)
    }

    pub fn is_unknown(&self) -> bool {
        self.best.is_none()
    }

    /// 转为对外输出的扁平结构
    pub fn to_output(&self) -> ClassificationOutput {
        ClassificationOutput {
            command_or_skill: self.label().to_string(),
            confidence: self.confidence(),
            candidates: self
                .candidates
                .iter()
                .map(|c| CandidateOutput {
                    name: c.label.clone(),
                    confidence: c.confidence,
                })
                .collect(),
            is_system_command: self.is_system_command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutput {
    pub name: String,
    pub confidence: f32,
}

/// 对外序列化格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub command_or_skill: String,
    pub confidence: f32,
    pub candidates: Vec<CandidateOutput>,
    pub is_system_command: bool,
}
