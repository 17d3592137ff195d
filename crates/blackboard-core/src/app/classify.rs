//! Intent classification - 受信テキストを「依頼」か「雑談」に分ける
//!
//! 速いモデルに JSON だけを返すよう頼み、Markdown のコードフェンスを
//! 剥がしてからパースします。

use serde::Deserialize;

/// Model verdict for one message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub is_order: bool,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub casual_reply: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("classification response is not well-formed: {reason}")]
pub struct ParseError {
    pub reason: String,
    pub raw: String,
}

pub fn classification_prompt(requester_name: &str, text: &str) -> String {
    format!(
        "You are Alice, an operations manager.\n\
         The user {requester_name} says: \"{text}\".\n\
         Decide whether this is a work order (research, strategy) or casual chat.\n\
         \n\
         Reply with ONLY a JSON object in this format:\n\
         {{\n\
         \x20   \"is_order\": true/false,\n\
         \x20   \"topic\": \"the topic to research, or null\",\n\
         \x20   \"casual_reply\": \"your reply if this is chat, or null\"\n\
         }}"
    )
}

/// Parse the model output, tolerating ```json fences around it.
pub fn parse_classification(raw: &str) -> Result<Classification, ParseError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim()).map_err(|e| ParseError {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_order() {
        let raw = "```json\n{\"is_order\": true, \"topic\": \"market entry Peru\", \"casual_reply\": null}\n```";
        let parsed = parse_classification(raw).unwrap();

        assert!(parsed.is_order);
        assert_eq!(parsed.topic.as_deref(), Some("market entry Peru"));
        assert_eq!(parsed.casual_reply, None);
    }

    #[test]
    fn missing_fields_default_to_chat() {
        let parsed = parse_classification(r#"{"casual_reply": "hi!"}"#).unwrap();

        assert!(!parsed.is_order);
        assert_eq!(parsed.casual_reply.as_deref(), Some("hi!"));
    }

    #[test]
    fn prose_is_a_parse_error() {
        let err = parse_classification("Sure! I'd be happy to help.").unwrap_err();
        assert_eq!(err.raw, "Sure! I'd be happy to help.");
    }

    #[test]
    fn prompt_embeds_name_and_text() {
        let prompt = classification_prompt("Ana", "research Peru");
        assert!(prompt.contains("The user Ana says: \"research Peru\""));
        assert!(prompt.contains("\"is_order\""));
    }
}
