use crate::context::ContextScope;
use crate::error::{ConfigError, Result};
use crate::types::CommandSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub acceptance: AcceptanceConfig,
    #[serde(default)]
    pub hallucination: HallucinationConfig,
    #[serde(default)]
    pub fast_path: FastPathConfig,
    #[serde(default)]
    pub external: ExternalConfig,
    /// 技能名 → 额外别名，如 "매직 미사일" = ["미사일", "magic missile"]
    #[serde(default = "default_skill_aliases")]
    pub skill_aliases: BTreeMap<String, Vec<String>>,
    /// 系统指令表，顺序即优先级
    #[serde(default = "default_commands")]
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// 模糊匹配的最低分
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
    /// 字符编辑距离相似度权重
    #[serde(default = "default_char_weight")]
    pub char_weight: f32,
    /// 字母（자모）相似度权重
    #[serde(default = "default_phonetic_weight")]
    pub phonetic_weight: f32,
    /// 关键词未命中时是否对系统指令再做模糊匹配
    #[serde(default)]
    pub fuzzy_system_commands: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceConfig {
    /// 全局指令门槛
    #[serde(default = "default_global_bar")]
    pub global: f32,
    /// 菜单场景门槛，词表小、误判代价高
    #[serde(default = "default_menu_bar")]
    pub menu: f32,
    /// 游戏中快速通道门槛
    #[serde(default = "default_fast_path_bar")]
    pub fast_path: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationConfig {
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    /// trim 后的最少字符数
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// 同一个词至少出现几次才算重复
    #[serde(default = "default_repeat_min_count")]
    pub repeat_min_count: usize,
    /// 重复词占总词数的比例上限
    #[serde(default = "default_repeat_ratio")]
    pub repeat_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastPathConfig {
    /// 启用快速通道的场景
    #[serde(default = "default_fast_path_contexts")]
    pub contexts: Vec<String>,
    /// 快速通道只匹配这些指令
    #[serde(default = "default_fast_path_commands")]
    pub commands: Vec<String>,
}

/// 外部 LLM 分类器（OpenAI 兼容接口）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_external_url")]
    pub url: String,
    #[serde(default = "default_external_model")]
    pub model: String,
    /// 存放 API 密钥的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_external_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_external_max_tokens")]
    pub max_tokens: u32,
}

fn default_fuzzy_threshold() -> f32 {
    0.6
}
fn default_char_weight() -> f32 {
    0.7
}
fn default_phonetic_weight() -> f32 {
    0.3
}
fn default_global_bar() -> f32 {
    0.5
}
fn default_menu_bar() -> f32 {
    0.7
}
fn default_fast_path_bar() -> f32 {
    0.5
}
fn default_min_chars() -> usize {
    2
}
fn default_repeat_min_count() -> usize {
    3
}
fn default_repeat_ratio() -> f32 {
    0.4
}
fn default_external_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_external_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_external_timeout() -> u64 {
    5
}
fn default_external_max_tokens() -> u32 {
    100
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_denylist() -> Vec<String> {
    strings(&[
        "구독",
        "좋아요",
        "시청",
        "감사합니다",
        "채널",
        "영상",
        "편집",
        "자막",
        "subscribe",
        "thank you for watching",
        "thanks for watching",
        "music",
        "♪",
        "♫",
        "lyrics",
        "copyright",
        "all rights reserved",
        "subtitles",
        "captions",
    ])
}

fn default_fast_path_contexts() -> Vec<String> {
    strings(&["in-play"])
}

fn default_fast_path_commands() -> Vec<String> {
    strings(&[
        "MoveLeft",
        "MoveRight",
        "TurnLeft",
        "TurnRight",
        "Jump",
        "StopMove",
        "PauseGame",
        "OpenMenu",
    ])
}

fn default_skill_aliases() -> BTreeMap<String, Vec<String>> {
    [
        ("매직 미사일", &["매직미사일", "미사일", "magic missile"][..]),
        ("매직 실드", &["매직실드", "실드", "magic shield"][..]),
        ("토네이도", &["회오리", "tornado"][..]),
        ("슬래시", &["slash"][..]),
        ("익스플로전", &["폭발", "explosion"][..]),
        ("큐어 힐", &["큐어힐", "힐", "cure"][..]),
    ]
    .into_iter()
    .map(|(skill, aliases)| (skill.to_string(), strings(aliases)))
    .collect()
}

/// 默认指令表：长的、具体的触发词排在前面
pub fn default_commands() -> Vec<CommandSpec> {
    let mut commands = vec![
        CommandSpec::new(
            "GoToMainMenu",
            "메인 메뉴 화면으로 돌아갑니다",
            &["메인 메뉴", "메인메뉴", "메인으로", "main menu"],
        ),
        CommandSpec::new(
            "StartGame",
            "게임 모드 선택 화면으로 이동합니다",
            &["게임 시작", "게임시작", "플레이", "시작", "start", "play"],
        ),
        CommandSpec::new(
            "SelectStoryMode",
            "스토리 모드를 선택합니다",
            &["스토리 모드", "스토리모드", "스토리", "story"],
        )
        .in_contexts(&["menu"]),
        CommandSpec::new(
            "SelectEndlessMode",
            "무한 모드를 선택합니다",
            &["무한 모드", "무한모드", "엔드리스", "무한", "endless"],
        )
        .in_contexts(&["menu"]),
        CommandSpec::new(
            "GoBack",
            "이전 화면으로 돌아갑니다",
            &["뒤로가기", "뒤로", "이전", "취소", "back"],
        ),
        CommandSpec::new(
            "CloseSettings",
            "설정창을 닫고 게임으로 돌아갑니다",
            &["설정창 닫", "설정 닫", "옵션 닫", "close settings"],
        ),
        CommandSpec::new(
            "OpenSettings",
            "설정창, 옵션창을 엽니다",
            &["설정", "옵션", "세팅", "settings", "options"],
        ),
        CommandSpec::new("CloseMenu", "게임 메뉴를 닫습니다", &["메뉴 닫", "close menu"]),
        CommandSpec::new("OpenMenu", "게임 메뉴를 엽니다", &["메뉴", "menu"]),
        CommandSpec::new(
            "PauseGame",
            "게임을 일시정지합니다",
            &["일시정지", "퍼즈", "pause"],
        ),
        CommandSpec::new(
            "ResumeGame",
            "일시정지된 게임을 재개합니다",
            &["계속", "재개", "resume", "continue"],
        ),
        CommandSpec::new(
            "RestartGame",
            "게임을 재시작합니다",
            &["다시 시작", "재시작", "재도전", "restart"],
        ),
        CommandSpec::new(
            "QuitGame",
            "게임을 종료합니다",
            &["끝내기", "나가기", "종료", "quit", "exit"],
        ),
        CommandSpec::new(
            "CloseInventory",
            "인벤토리를 닫습니다",
            &["인벤토리 닫", "가방 닫", "close inventory"],
        ),
        CommandSpec::new(
            "OpenInventory",
            "인벤토리/가방을 엽니다",
            &["인벤토리", "가방", "소지품", "inventory"],
        ),
        CommandSpec::new("CloseMap", "지도를 닫습니다", &["지도 닫", "맵 닫", "close map"]),
        CommandSpec::new("OpenMap", "지도를 엽니다", &["지도", "맵", "map"]),
        CommandSpec::new("ShowHelp", "도움말을 표시합니다", &["도움말", "도와", "help"]),
        CommandSpec::new(
            "OpenStore",
            "상점을 엽니다",
            &["상점", "스토어", "store", "shop"],
        ),
        CommandSpec::new(
            "ShowAudioTab",
            "옵션에서 오디오 탭을 엽니다",
            &["오디오 탭", "오디오탭", "오디오"],
        )
        .in_contexts(&["menu:options"]),
        CommandSpec::new(
            "ShowGraphicsTab",
            "옵션에서 그래픽 탭을 엽니다",
            &["그래픽 탭", "그래픽탭", "그래픽"],
        )
        .in_contexts(&["menu:options"]),
        CommandSpec::new(
            "ShowLanguageTab",
            "옵션에서 언어 탭을 엽니다",
            &["언어 탭", "언어탭", "언어"],
        )
        .in_contexts(&["menu:options"]),
        CommandSpec::new(
            "ShowGameTab",
            "옵션에서 게임 탭을 엽니다",
            &["게임 탭", "게임탭"],
        )
        .in_contexts(&["menu:options"]),
        CommandSpec::new(
            "SelectTutorial",
            "튜토리얼을 시작합니다",
            &["튜토리얼", "챕터 0", "챕터0", "tutorial"],
        )
        .in_contexts(&["menu"]),
    ];

    // 章节号从大到小：“챕터 12” 必须排在 “챕터 1” 之前
    const CHAPTER_NAMES: [&str; 7] = ["교만", "탐욕", "색욕", "질투", "폭식", "분노", "나태"];
    for number in (1..=12).rev() {
        let mut triggers = vec![
            format!("챕터 {number}"),
            format!("챕터{number}"),
            format!("chapter {number}"),
        ];
        if let Some(name) = CHAPTER_NAMES.get(number - 1) {
            triggers.push(name.to_string());
        }
        commands.push(CommandSpec {
            name: format!("SelectChapter{number}"),
            description: format!("챕터 {number}을 선택합니다"),
            triggers,
            contexts: strings(&["menu"]),
        });
    }

    let in_play = ["in-play"];
    commands.extend([
        CommandSpec::new(
            "MoveLeft",
            "캐릭터를 왼쪽으로 이동합니다",
            &["왼쪽으로 이동", "왼쪽 이동", "왼쪽으로", "왼쪽"],
        )
        .in_contexts(&in_play),
        CommandSpec::new(
            "MoveRight",
            "캐릭터를 오른쪽으로 이동합니다",
            &["오른쪽으로 이동", "오른쪽 이동", "오른쪽으로", "오른쪽"],
        )
        .in_contexts(&in_play),
        CommandSpec::new("Jump", "캐릭터가 점프합니다", &["점프", "뛰어"]).in_contexts(&in_play),
        CommandSpec::new(
            "StopMove",
            "캐릭터 이동을 멈춥니다",
            &["이동 멈춰", "정지", "멈춰", "그만"],
        )
        .in_contexts(&in_play),
        CommandSpec::new(
            "TurnLeft",
            "캐릭터가 왼쪽으로 방향을 전환합니다",
            &["좌측으로 돌아"],
        )
        .in_contexts(&in_play),
        CommandSpec::new(
            "TurnRight",
            "캐릭터가 오른쪽으로 방향을 전환합니다",
            &["우측으로 돌아"],
        )
        .in_contexts(&in_play),
    ]);
    commands
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            char_weight: default_char_weight(),
            phonetic_weight: default_phonetic_weight(),
            fuzzy_system_commands: false,
        }
    }
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            global: default_global_bar(),
            menu: default_menu_bar(),
            fast_path: default_fast_path_bar(),
        }
    }
}

impl Default for HallucinationConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
            min_chars: default_min_chars(),
            repeat_min_count: default_repeat_min_count(),
            repeat_ratio: default_repeat_ratio(),
        }
    }
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            contexts: default_fast_path_contexts(),
            commands: default_fast_path_commands(),
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_external_url(),
            model: default_external_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_external_timeout(),
            max_tokens: default_external_max_tokens(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            acceptance: AcceptanceConfig::default(),
            hallucination: HallucinationConfig::default(),
            fast_path: FastPathConfig::default(),
            external: ExternalConfig::default(),
            skill_aliases: default_skill_aliases(),
            commands: default_commands(),
        }
    }
}

/// 分类时使用的可调参数，不含指令表
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub matching: MatchingConfig,
    pub acceptance: AcceptanceConfig,
    pub hallucination: HallucinationConfig,
    pub fast_path: FastPathConfig,
    pub skill_aliases: BTreeMap<String, Vec<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineConfig::default().settings()
    }
}

impl EngineSettings {
    /// 检查阈值与权重范围
    pub fn validate(&self) -> Result<()> {
        let ranged = [
            ("matching.fuzzy_threshold", self.matching.fuzzy_threshold),
            ("matching.char_weight", self.matching.char_weight),
            ("matching.phonetic_weight", self.matching.phonetic_weight),
            ("acceptance.global", self.acceptance.global),
            ("acceptance.menu", self.acceptance.menu),
            ("acceptance.fast_path", self.acceptance.fast_path),
            ("hallucination.repeat_ratio", self.hallucination.repeat_ratio),
        ];
        for (name, value) in ranged {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        let weight_sum = self.matching.char_weight + self.matching.phonetic_weight;
        if weight_sum <= 0.0 || weight_sum > 1.0 + 1e-4 {
            return Err(ConfigError::OutOfRange {
                name: "matching.char_weight + matching.phonetic_weight",
                value: weight_sum,
            });
        }
        for raw in &self.fast_path.contexts {
            if ContextScope::parse(raw).is_none() {
                return Err(ConfigError::InvalidScope {
                    command: "fast_path".to_string(),
                    scope: raw.clone(),
                });
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            matching: self.matching.clone(),
            acceptance: self.acceptance.clone(),
            hallucination: self.hallucination.clone(),
            fast_path: self.fast_path.clone(),
            skill_aliases: self.skill_aliases.clone(),
        }
    }
}

/// 获取配置文件路径
pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voice-intent");
    config_dir.join("config.toml")
}

/// 加载配置，文件不存在则创建默认配置
pub fn load_config() -> Result<EngineConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        log::info!("配置文件不存在，写入默认配置: {}", path.display());
        let config = EngineConfig::default();
        save_config_to(path, &config)?;
        Ok(config)
    }
}

/// 保存配置到文件
pub fn save_config(config: &EngineConfig) -> Result<()> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &EngineConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice_commands::CommandRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_commands_register_cleanly() {
        let registry = CommandRegistry::new(default_commands()).unwrap();
        for name in default_fast_path_commands() {
            assert!(registry.get(&name).is_some(), "missing {name}");
        }
        assert!(registry.get("SelectChapter12").is_some());
    }

    #[test]
    fn missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, EngineConfig::default());
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[matching]
fuzzy_threshold = 0.55

[acceptance]
menu = 0.8

[[commands]]
name = "Jump"
triggers = ["점프"]
contexts = ["in-play"]
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.matching.fuzzy_threshold, 0.55);
        assert_eq!(config.matching.char_weight, 0.7);
        assert_eq!(config.acceptance.menu, 0.8);
        assert_eq!(config.acceptance.global, 0.5);
        assert_eq!(config.commands.len(), 1);
        assert_eq!(config.commands[0].description, "");
        assert_eq!(config.hallucination, HallucinationConfig::default());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn default_location_follows_user_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        let expected = dir.path().join("voice-intent").join("config.toml");
        assert_eq!(config_path(), expected);

        let mut config = load_config().unwrap();
        assert!(expected.exists());
        assert_eq!(config, EngineConfig::default());

        config.acceptance.menu = 0.8;
        save_config(&config).unwrap();
        assert_eq!(load_config().unwrap().acceptance.menu, 0.8);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[matching\nfuzzy_threshold = ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut settings = EngineConfig::default().settings();
        assert!(settings.validate().is_ok());

        settings.acceptance.menu = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::OutOfRange { name: "acceptance.menu", .. })
        ));

        let mut settings = EngineConfig::default().settings();
        settings.matching.char_weight = 0.9;
        assert!(settings.validate().is_err());

        let mut settings = EngineConfig::default().settings();
        settings.matching.fuzzy_threshold = f32::NAN;
        assert!(settings.validate().is_err());

        let mut settings = EngineConfig::default().settings();
        settings.fast_path.contexts.push("lobby".to_string());
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidScope { scope, .. }) if scope == "lobby"
        ));
    }
}
