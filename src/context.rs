use std::fmt;

/// 调用方当前所处的场景
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextTag {
    /// 未提供场景，使用全局指令表
    Unscoped,
    /// 游戏进行中
    InPlay,
    /// 菜单界面，携带界面名（小写）
    Menu(String),
    /// 无法识别的标签，按 Unscoped 处理
    Unknown(String),
}

impl ContextTag {
    /// 接受 "in-play" / "InGame_Playing"、"menu:<screen>" / "Menu_<screen>"
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            None | Some("") => return ContextTag::Unscoped,
            Some(r) => r,
        };
        let lower = raw.to_lowercase();
        match lower.as_str() {
            "unscoped" | "global" => ContextTag::Unscoped,
            "in-play" | "ingame_playing" | "in_play" => ContextTag::InPlay,
            _ => match menu_screen(&lower) {
                Some(screen) => ContextTag::Menu(screen.to_string()),
                None => ContextTag::Unknown(raw.to_string()),
            },
        }
    }

    pub fn is_menu(&self) -> bool {
        matches!(self, ContextTag::Menu(_))
    }

    /// 规范写法，与 [`ContextScope`] 的标签一致
    pub fn key(&self) -> String {
        match self {
            ContextTag::Unscoped => "unscoped".to_string(),
            ContextTag::InPlay => "in-play".to_string(),
            ContextTag::Menu(screen) => format!("menu:{screen}"),
            ContextTag::Unknown(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn menu_screen(lower: &str) -> Option<&str> {
    lower
        .strip_prefix("menu:")
        .or_else(|| lower.strip_prefix("menu_"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 指令声明的可用场景
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextScope {
    InPlay,
    /// 任意菜单界面
    AnyMenu,
    Menu(String),
}

impl ContextScope {
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "in-play" | "ingame_playing" | "in_play" => Some(ContextScope::InPlay),
            "menu" | "menu:*" => Some(ContextScope::AnyMenu),
            _ => menu_screen(&lower).map(|s| ContextScope::Menu(s.to_string())),
        }
    }

    /// Unscoped/Unknown 由调用方处理（全局表不做限制）
    pub fn admits(&self, context: &ContextTag) -> bool {
        match (self, context) {
            (ContextScope::InPlay, ContextTag::InPlay) => true,
            (ContextScope::AnyMenu, ContextTag::Menu(_)) => true,
            (ContextScope::Menu(want), ContextTag::Menu(screen)) => want == screen,
            _ => false,
        }
    }
}
