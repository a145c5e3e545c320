mod aggregate;
mod config;
mod context;
mod engine;
mod error;
mod external;
mod fuzzy;
mod hallucination;
mod jamo;
mod llm;
mod prompt;
mod router;
mod types;
mod voice_commands;

pub use config::{
    config_path, default_commands, load_config, load_config_from, save_config, save_config_to,
    AcceptanceConfig, EngineConfig, EngineSettings, ExternalConfig, FastPathConfig,
    HallucinationConfig, MatchingConfig,
};
pub use context::{ContextScope, ContextTag};
pub use engine::{EngineSnapshot, IntentEngine};
pub use error::{ConfigError, ExternalError, Result};
pub use external::{ExternalClassifier, ExternalVerdict, LabelHint, StaticClassifier};
pub use hallucination::{HallucinationFilter, Rejection};
pub use llm::LlmClassifier;
pub use types::{
    CandidateOutput, ClassificationOutput, ClassificationResult, CommandSpec, MatchCandidate,
    MatchSource, ResolutionStage, SkillSpec, MAX_CANDIDATES, UNKNOWN_LABEL,
};
pub use voice_commands::{CommandRegistry, RegisteredCommand, Vocabulary};

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "voice-intent")]
#[command(about = "游戏语音指令与技能意图识别", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，默认使用用户配置目录
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 对一段识别文本做意图分类，输出 JSON
    Classify {
        text: String,

        /// 场景标签，如 in-play、menu:options、InGame_Playing
        #[arg(long)]
        context: Option<String>,

        /// 当前可用技能，逗号分隔
        #[arg(long, default_value = "")]
        skills: String,

        /// 附带结果阶段和每个候选的来源
        #[arg(long)]
        explain: bool,
    },

    /// 生成语音识别的解码提示词
    Prompt {
        #[arg(long)]
        context: Option<String>,

        #[arg(long, default_value = "")]
        skills: String,

        /// 场景关键词，覆盖指令表生成的关键词
        #[arg(long)]
        keywords: Option<String>,
    },

    /// 写出默认配置文件
    InitConfig {
        /// 已存在时覆盖
        #[arg(long)]
        force: bool,
    },
}

pub fn run() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = execute(cli) {
        log::error!("{e}");
        eprintln!("错误: {e}");
        std::process::exit(1);
    }
}

fn load(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
}

fn execute(cli: Cli) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let custom = cli.config.as_deref();

    match cli.command {
        Commands::Classify {
            text,
            context,
            skills,
            explain,
        } => {
            let engine = IntentEngine::from_config(&load(custom)?)?;
            let result = engine.classify(&text, context.as_deref(), &SkillSpec::parse_list(&skills));
            let json = if explain {
                serde_json::to_string_pretty(&serde_json::json!({
                    "result": result.to_output(),
                    "stage": result.stage,
                    "candidates": result.candidates,
                }))?
            } else {
                serde_json::to_string_pretty(&result.to_output())?
            };
            println!("{json}");
        }
        Commands::Prompt {
            context,
            skills,
            keywords,
        } => {
            let engine = IntentEngine::from_config(&load(custom)?)?;
            println!(
                "{}",
                engine.decoding_prompt(
                    context.as_deref(),
                    &SkillSpec::parse_list(&skills),
                    keywords.as_deref()
                )
            );
        }
        Commands::InitConfig { force } => {
            let path = custom.map_or_else(config_path, Path::to_path_buf);
            if path.exists() && !force {
                log::warn!("配置文件已存在: {}", path.display());
                println!("{}", path.display());
                return Ok(());
            }
            match custom {
                Some(path) => save_config_to(path, &EngineConfig::default())?,
                None => save_config(&EngineConfig::default())?,
            }
            log::info!("已写入默认配置: {}", path.display());
            println!("{}", path.display());
        }
    }
    Ok(())
}
