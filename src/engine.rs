use crate::config::{EngineConfig, EngineSettings};
use crate::context::ContextTag;
use crate::error::{ConfigError, Result};
use crate::external::ExternalClassifier;
use crate::llm::LlmClassifier;
use crate::prompt;
use crate::router::ContextRouter;
use crate::types::{ClassificationResult, CommandSpec, SkillSpec};
use crate::voice_commands::CommandRegistry;
use std::sync::{Arc, PoisonError, RwLock};

/// 指令表和参数的不可变快照，一次分类全程使用同一份
#[derive(Debug)]
pub struct EngineSnapshot {
    registry: CommandRegistry,
    settings: EngineSettings,
}

impl EngineSnapshot {
    fn build(commands: Vec<CommandSpec>, settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        let registry = CommandRegistry::new(commands)?;
        for name in &settings.fast_path.commands {
            if registry.get(name).is_none() {
                return Err(ConfigError::UnknownFastPathCommand(name.clone()));
            }
        }
        Ok(Self { registry, settings })
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

/// 意图引擎：多个线程可同时分类，更新指令表时整体替换快照
pub struct IntentEngine {
    snapshot: RwLock<Arc<EngineSnapshot>>,
    external: Option<Box<dyn ExternalClassifier>>,
}

impl IntentEngine {
    pub fn new(commands: Vec<CommandSpec>, settings: EngineSettings) -> Result<Self> {
        let snapshot = EngineSnapshot::build(commands, settings)?;
        log::info!(
            "意图引擎就绪: {} 条指令，{} 个触发词",
            snapshot.registry.len(),
            snapshot.registry.triggers().len()
        );
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            external: None,
        })
    }

    /// 按配置文件构建，启用外部分类器但初始化失败时只记录警告
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let engine = Self::new(config.commands.clone(), config.settings())?;
        if !config.external.enabled {
            return Ok(engine);
        }
        match LlmClassifier::new(config.external.clone()) {
            Ok(classifier) => {
                log::info!("已启用外部分类: {}", config.external.model);
                Ok(engine.with_external(Box::new(classifier)))
            }
            Err(e) => {
                log::warn!("外部分类器初始化失败，仅使用本地匹配: {e}");
                Ok(engine)
            }
        }
    }

    pub fn with_external(mut self, external: Box<dyn ExternalClassifier>) -> Self {
        self.external = Some(external);
        self
    }

    /// 当前快照；调用方持有期间不受替换影响
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 对一段识别文本做意图分类。不会失败，未匹配时返回 Unknown
    pub fn classify(
        &self,
        text: &str,
        context: Option<&str>,
        skills: &[SkillSpec],
    ) -> ClassificationResult {
        let snapshot = self.snapshot();
        ContextRouter::new(&snapshot.registry, &snapshot.settings)
            .with_external(self.external.as_deref())
            .route(context, text, skills)
    }

    /// 生成语音识别的解码提示词
    pub fn decoding_prompt(
        &self,
        context: Option<&str>,
        skills: &[SkillSpec],
        context_keywords: Option<&str>,
    ) -> String {
        let snapshot = self.snapshot();
        let vocabulary = snapshot.registry.vocabulary(&ContextTag::parse(context));
        prompt::decoding_prompt(&vocabulary, skills, context_keywords)
    }

    /// 整体替换指令表，校验失败时保留旧表
    pub fn replace_commands(&self, commands: Vec<CommandSpec>) -> Result<()> {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let next = EngineSnapshot::build(commands, guard.settings.clone())?;
        log::info!("指令表已更新: {} 条指令", next.registry.len());
        *guard = Arc::new(next);
        Ok(())
    }

    /// 整体替换参数，校验失败时保留旧参数
    pub fn replace_settings(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        settings.validate()?;
        for name in &settings.fast_path.commands {
            if guard.registry.get(name).is_none() {
                return Err(ConfigError::UnknownFastPathCommand(name.clone()));
            }
        }
        let registry = guard.registry.clone();
        log::info!("匹配参数已更新");
        *guard = Arc::new(EngineSnapshot { registry, settings });
        Ok(())
    }
}
