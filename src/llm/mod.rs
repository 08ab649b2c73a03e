//! Text-generation interface (SPEC_FULL.md §4.17, §6) and its thin
//! OpenAI-compatible adapter.

mod openai_compat;
pub use openai_compat::OpenAiCompatible;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ResearchError;

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { system_prompt: None, temperature: 0.3, max_tokens: 1024 }
    }
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature, ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub token_usage: Option<u32>,
    pub finish_reason: Option<FinishReason>,
}

/// Consumed by every agent in SPEC_FULL.md §4.7-§4.11; implementations wrap
/// an external chat-completion SDK and are deliberately thin (§1 Out of scope).
///
/// Kept to a single generic-free method so `dyn TextGeneration` stays object
/// safe; `generate_structured` below is a free function built on top of it.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn generate(&self, prompt: &str, opts: GenerationOptions) -> Result<GenerationOutcome, ResearchError>;
}

/// Returns `Ok(None)` when the model output could not be parsed into `T` —
/// callers treat this as "use the documented fallback", never as a hard error.
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &(dyn TextGeneration + Send + Sync),
    prompt: &str,
    opts: GenerationOptions,
) -> Result<Option<T>, ResearchError> {
    let (parsed, _tokens) = generate_structured_with_usage(generator, prompt, opts).await?;
    Ok(parsed)
}

/// Same as [`generate_structured`], but also surfaces the call's reported
/// token usage so callers that need to accumulate cost (SPEC_FULL.md §4.12,
/// §5) don't have to duplicate the generate-then-parse step.
pub async fn generate_structured_with_usage<T: DeserializeOwned>(
    generator: &(dyn TextGeneration + Send + Sync),
    prompt: &str,
    opts: GenerationOptions,
) -> Result<(Option<T>, u32), ResearchError> {
    let outcome = generator.generate(prompt, opts).await?;
    let tokens = outcome.token_usage.unwrap_or(0);
    Ok((extract_json::<T>(&outcome.text), tokens))
}

/// Permissive JSON extraction: strips code fences, then locates the first
/// balanced `{...}` or `[...]` span and attempts to deserialize it
/// (SPEC_FULL.md §6, §9 "Structured LLM I/O").
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let stripped = strip_code_fences(raw);
    let span = find_balanced_span(&stripped)?;
    serde_json::from_str(span).ok()
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches("json").trim_start();
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

fn find_balanced_span(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return s.get(start..=i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn extracts_json_from_code_fence() {
        let raw = "```json\n{\"x\": 1, \"y\": 2}\n```";
        let point: Point = extract_json(raw).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });
    }

    #[test]
    fn extracts_first_balanced_object_amid_prose() {
        let raw = "Sure, here you go: {\"x\": 3, \"y\": 4} -- hope that helps!";
        let point: Point = extract_json(raw).unwrap();
        assert_eq!(point, Point { x: 3, y: 4 });
    }

    #[test]
    fn returns_none_on_garbage() {
        let result: Option<Point> = extract_json("not json at all");
        assert!(result.is_none());
    }

    #[test]
    fn handles_nested_braces_in_strings() {
        let raw = "{\"x\": 1, \"y\": 2, \"note\": \"a { stray brace\"}";
        let point: Point = extract_json(raw).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });
    }
}
