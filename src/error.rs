use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// 配置错误：全部在注册阶段暴露，分类调用本身不会失败
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置失败: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("序列化配置失败: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("指令名称重复: {0}")]
    DuplicateCommand(String),

    #[error("指令名称为空 (第 {0} 条)")]
    EmptyCommandName(usize),

    #[error("指令 {command} 的触发词为空")]
    EmptyTrigger { command: String },

    #[error("指令 {command} 的场景标签无效: {scope}")]
    InvalidScope { command: String, scope: String },

    #[error("快速通道指令未注册: {0}")]
    UnknownFastPathCommand(String),

    #[error("配置项 {name} 超出范围: {value}")]
    OutOfRange { name: &'static str, value: f32 },
}

/// 外部分类器错误，路由器记录后忽略
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("外部分类请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("外部分类返回错误状态: {0}")]
    Status(reqwest::StatusCode),

    #[error("外部分类响应无内容")]
    EmptyResponse,

    #[error("解析外部分类响应失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("缺少 API 密钥环境变量: {0}")]
    MissingApiKey(String),
}
