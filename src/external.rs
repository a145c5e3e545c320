use crate::error::ExternalError;

/// 提供给外部分类器的候选标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelHint<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// 示例触发词，最多取前几个
    pub examples: &'a [String],
    pub system: bool,
}

/// 外部分类器给出的判断
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalVerdict {
    pub label: String,
    pub confidence: f32,
}

/// 确定性流程全部未命中时才调用的外部分类器（如 LLM）。
/// 返回的标签必须属于 `labels`，否则会被路由器丢弃。
pub trait ExternalClassifier: Send + Sync {
    fn classify(
        &self,
        text: &str,
        labels: &[LabelHint<'_>],
    ) -> Result<Option<ExternalVerdict>, ExternalError>;
}

/// 按固定表返回结果，便于测试和离线调试
#[derive(Debug, Default)]
pub struct StaticClassifier {
    answers: Vec<(String, ExternalVerdict)>,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, text: &str, label: &str, confidence: f32) -> Self {
        self.answers.push((
            text.to_string(),
            ExternalVerdict {
                label: label.to_string(),
                confidence,
            },
        ));
        self
    }
}

impl ExternalClassifier for StaticClassifier {
    fn classify(
        &self,
        text: &str,
        _labels: &[LabelHint<'_>],
    ) -> Result<Option<ExternalVerdict>, ExternalError> {
        Ok(self
            .answers
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, verdict)| verdict.clone()))
    }
}
