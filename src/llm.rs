use crate::config::ExternalConfig;
use crate::error::ExternalError;
use crate::external::{ExternalClassifier, ExternalVerdict, LabelHint};
use crate::types::UNKNOWN_LABEL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const EXAMPLES_PER_LABEL: usize = 3;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    command: Option<String>,
    #[serde(default = "default_reply_confidence")]
    confidence: f32,
}

fn default_reply_confidence() -> f32 {
    0.5
}

/// 调用 OpenAI 兼容的 chat completions 接口做兜底分类
pub struct LlmClassifier {
    client: reqwest::blocking::Client,
    config: ExternalConfig,
    api_key: String,
}

impl LlmClassifier {
    pub fn new(config: ExternalConfig) -> Result<Self, ExternalError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExternalError::MissingApiKey(config.api_key_env.clone()))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

impl ExternalClassifier for LlmClassifier {
    fn classify(
        &self,
        text: &str,
        labels: &[LabelHint<'_>],
    ) -> Result<Option<ExternalVerdict>, ExternalError> {
        if labels.is_empty() {
            return Ok(None);
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(labels),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("음성 인식 결과: \"{text}\""),
                },
            ],
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        if !resp.status().is_success() {
            return Err(ExternalError::Status(resp.status()));
        }

        let body: ChatResponse = resp.json()?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ExternalError::EmptyResponse)?;
        parse_reply(&content)
    }
}

fn describe_label(label: &LabelHint<'_>) -> String {
    let examples: Vec<&str> = label
        .examples
        .iter()
        .take(EXAMPLES_PER_LABEL)
        .map(String::as_str)
        .collect();
    if examples.is_empty() {
        format!("- {}: {}", label.name, label.description)
    } else {
        format!(
            "- {}: {} (예: {})",
            label.name,
            label.description,
            examples.join(", ")
        )
    }
}

/// 列出可选标签的系统提示词，系统指令和技能分开列出
pub fn build_system_prompt(labels: &[LabelHint<'_>]) -> String {
    let section = |system: bool| {
        labels
            .iter()
            .filter(|label| label.system == system)
            .map(describe_label)
            .collect::<Vec<_>>()
            .join("\n")
    };
    let mut functions_desc = section(true);
    let skills_desc = section(false);
    if !skills_desc.is_empty() {
        functions_desc.push_str("\n\n사용 가능한 스킬:\n");
        functions_desc.push_str(&skills_desc);
    }

    format!(
        "당신은 게임 음성 명령 분류기입니다.
사용자의 음성 인식 결과를 보고 가장 적절한 명령어를 선택하세요.

사용 가능한 명령어:
{functions_desc}

규칙:
1. 반드시 위 명령어 또는 스킬 이름 중 하나만 JSON 형식으로 반환하세요.
2. 매칭되는 것이 없으면 \"{UNKNOWN_LABEL}\"을 반환하세요.
3. 응답 형식: {{\"command\": \"명령어이름\", \"confidence\": 0.0~1.0}}
4. confidence는 얼마나 확신하는지를 나타냅니다 (0.0 = 불확실, 1.0 = 확실)
5. 한국어와 영어 모두 지원합니다."
    )
}

/// 解析模型回复，兼容 ```json 代码块包裹
pub fn parse_reply(content: &str) -> Result<Option<ExternalVerdict>, ExternalError> {
    let mut body = content.trim();
    if body.contains("```") {
        body = body.split("```").nth(1).unwrap_or(body).trim();
        body = body.strip_prefix("json").unwrap_or(body).trim();
    }

    let reply: ClassifierReply = serde_json::from_str(body)?;
    Ok(reply
        .command
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && c != UNKNOWN_LABEL)
        .map(|label| ExternalVerdict {
            label,
            confidence: reply.confidence,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_json() {
        let verdict = parse_reply(r#"{"command": "OpenMap", "confidence": 0.8}"#).unwrap();
        assert_eq!(
            verdict,
            Some(ExternalVerdict {
                label: "OpenMap".to_string(),
                confidence: 0.8
            })
        );
    }

    #[test]
    fn parses_fenced_json_with_default_confidence() {
        let verdict = parse_reply("```json\n{\"command\": \"Jump\"}\n```").unwrap();
        assert_eq!(verdict.unwrap().confidence, 0.5);
    }

    #[test]
    fn unknown_command_is_none() {
        assert_eq!(
            parse_reply(r#"{"command": "Unknown", "confidence": 0.9}"#).unwrap(),
            None
        );
        assert_eq!(parse_reply(r#"{"confidence": 0.9}"#).unwrap(), None);
    }

    #[test]
    fn malformed_reply_is_decode_error() {
        assert!(matches!(
            parse_reply("죄송합니다"),
            Err(ExternalError::Decode(_))
        ));
    }

    #[test]
    fn system_prompt_lists_labels_with_examples() {
        let examples = vec![
            "지도".to_string(),
            "맵".to_string(),
            "map".to_string(),
            "지도 열어".to_string(),
        ];
        let prompt = build_system_prompt(&[
            LabelHint {
                name: "OpenMap",
                description: "지도를 엽니다",
                examples: &examples,
                system: true,
            },
            LabelHint {
                name: "토네이도",
                description: "",
                examples: &[],
                system: false,
            },
        ]);
        assert!(prompt.contains("- OpenMap: 지도를 엽니다 (예: 지도, 맵, map)"));
        assert!(!prompt.contains("지도 열어"));
        assert!(prompt.contains("사용 가능한 스킬:\n- 토네이도: "));

        let commands_at = prompt.find("- OpenMap").unwrap();
        let skills_at = prompt.find("사용 가능한 스킬:").unwrap();
        assert!(commands_at < skills_at);
    }

    #[test]
    fn system_prompt_without_skills_has_no_skill_section() {
        let prompt = build_system_prompt(&[LabelHint {
            name: "Jump",
            description: "캐릭터가 점프합니다",
            examples: &[],
            system: true,
        }]);
        assert!(prompt.contains("- Jump: 캐릭터가 점프합니다"));
        assert!(!prompt.contains("사용 가능한 스킬"));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = ExternalConfig {
            api_key_env: "VOICE_INTENT_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ExternalConfig::default()
        };
        assert!(matches!(
            LlmClassifier::new(config),
            Err(ExternalError::MissingApiKey(_))
        ));
    }
}
