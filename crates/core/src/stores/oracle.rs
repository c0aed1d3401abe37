use crate::error::SearchError;
use crate::traits::{Judgment, JudgmentCriterion, JudgmentOracle};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// Judgment oracle backed by an OpenAI-compatible chat endpoint.
///
/// The reply contract is strict JSON — `{"choice": <option number>}` or
/// `{"choice": "none"}` — but replies are parsed defensively: fenced code
/// blocks are stripped and a regex fallback extracts the option number.
/// Anything unparseable is `Undecided`, never a fabricated selection.
#[derive(Clone)]
pub struct ChatOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatOracle {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl JudgmentOracle for ChatOracle {
    async fn judge(
        &self,
        candidates: &[String],
        criterion: &JudgmentCriterion,
    ) -> Result<Judgment, SearchError> {
        if candidates.is_empty() {
            return Ok(Judgment::Undecided);
        }

        let prompt = build_prompt(candidates, criterion);
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&json!({
                "model": self.model,
                "temperature": 0.0,
                "messages": [{"role": "user", "content": prompt}]
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendUnavailable {
                backend: "oracle".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(reply = %content.chars().take(200).collect::<String>(), "oracle replied");

        Ok(parse_reply(content, candidates.len()))
    }
}

fn build_prompt(candidates: &[String], criterion: &JudgmentCriterion) -> String {
    let task = match criterion {
        JudgmentCriterion::ContentsStart => {
            "Pick the option that BEGINS the document's table of contents: a heading \
             followed by the listing of the document's parts with page numbers. An option \
             that merely mentions the contents — a footnote, a running header, a reference \
             page — does not qualify."
                .to_string()
        }
        JudgmentCriterion::SectionStart { title } => format!(
            "Pick the option that holds the section heading \"{title}\" followed by that \
             section's own body text. An option that only cites or refers to the heading \
             does not qualify."
        ),
    };

    let mut prompt = String::new();
    prompt.push_str(&task);
    prompt.push_str(
        "\n\nAnswer with strict JSON only: {\"choice\": <option number>} — or \
         {\"choice\": \"none\"} if no option qualifies. No other text.\n",
    );
    for (position, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("\nOption {}:\n{}\n", position + 1, candidate));
    }
    prompt
}

/// Maps a raw oracle reply to a zero-based selection, or `Undecided`.
fn parse_reply(raw: &str, total: usize) -> Judgment {
    let mut text = raw.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text).trim();

    let choice = match serde_json::from_str::<Value>(text) {
        Ok(parsed) => match parsed.pointer("/choice") {
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(value)) if value.eq_ignore_ascii_case("none") => {
                return Judgment::Undecided
            }
            Some(Value::String(value)) => value.trim().parse::<u64>().ok(),
            _ => None,
        },
        Err(_) => None,
    };

    let choice = choice.or_else(|| {
        // fallback for replies that wrap the JSON in prose
        let pattern = Regex::new(r#""choice"\s*:\s*"?(\d+)"#).ok()?;
        pattern
            .captures(raw)?
            .get(1)?
            .as_str()
            .parse::<u64>()
            .ok()
    });

    match choice {
        Some(number) if number >= 1 && (number as usize) <= total => {
            Judgment::Selected(number as usize - 1)
        }
        _ => Judgment::Undecided,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_reply_selects() {
        assert_eq!(parse_reply(r#"{"choice": 2}"#, 3), Judgment::Selected(1));
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let raw = "```json\n{\"choice\": 1}\n```";
        assert_eq!(parse_reply(raw, 3), Judgment::Selected(0));
    }

    #[test]
    fn none_reply_is_undecided() {
        assert_eq!(parse_reply(r#"{"choice": "none"}"#, 3), Judgment::Undecided);
    }

    #[test]
    fn prose_wrapped_reply_falls_back_to_regex() {
        let raw = "The best match is clear. {\"choice\": 3} as discussed.";
        assert_eq!(parse_reply(raw, 3), Judgment::Selected(2));
    }

    #[test]
    fn out_of_range_or_garbage_is_undecided() {
        assert_eq!(parse_reply(r#"{"choice": 9}"#, 3), Judgment::Undecided);
        assert_eq!(parse_reply(r#"{"choice": 0}"#, 3), Judgment::Undecided);
        assert_eq!(parse_reply("no idea", 3), Judgment::Undecided);
        assert_eq!(parse_reply("", 3), Judgment::Undecided);
    }

    #[test]
    fn prompt_numbers_options_from_one() {
        let prompt = build_prompt(
            &["第一个".to_string(), "第二个".to_string()],
            &JudgmentCriterion::SectionStart {
                title: "基金合同".to_string(),
            },
        );
        assert!(prompt.contains("Option 1:"));
        assert!(prompt.contains("Option 2:"));
        assert!(prompt.contains("基金合同"));
    }
}
