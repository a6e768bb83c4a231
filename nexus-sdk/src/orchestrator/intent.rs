//! Query intent and classifier output parsing.

use serde_json::Value;

/// What a query asks for. Decides the branch of the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Intent {
    Semantic,
    /// Time-range lookup; a missing bound degrades to a semantic lookup
    Temporal {
        start: Option<String>,
        end: Option<String>,
    },
    MostRecent,
    Code,
    Tools,
    #[default]
    Fallback,
}

impl Intent {
    /// Wire name used by the classifier (`tipo`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantica",
            Self::Temporal { .. } => "temporal",
            Self::MostRecent => "mais_recente",
            Self::Code => "codigo",
            Self::Tools => "tools",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed classifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub detail: Option<String>,
}

impl Classification {
    pub fn fallback(detail: impl Into<String>) -> Self {
        Self {
            intent: Intent::Fallback,
            detail: Some(detail.into()),
        }
    }
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Interpret the classifier's reply.
///
/// Anything that is not a JSON object with a string `tipo` becomes
/// [`Intent::Fallback`] with a diagnostic detail.
pub fn parse_classification(reply: &str) -> Classification {
    let value: Value = match serde_json::from_str(strip_code_fences(reply)) {
        Ok(value) => value,
        Err(_) => return Classification::fallback("Could not interpret the intent."),
    };
    let Some(object) = value.as_object() else {
        return Classification::fallback("Could not interpret the intent.");
    };
    let Some(tipo) = object.get("tipo").and_then(Value::as_str) else {
        return Classification::fallback("Could not interpret the intent.");
    };

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let detail = text("detalhes");

    let intent = match tipo.trim() {
        "semantica" => Intent::Semantic,
        "temporal" => Intent::Temporal {
            start: text("inicio"),
            end: text("fim"),
        },
        "mais_recente" => Intent::MostRecent,
        "codigo" => Intent::Code,
        "tools" => Intent::Tools,
        "fallback" => Intent::Fallback,
        other => return Classification::fallback(format!("Unknown intent '{other}'.")),
    };

    Classification { intent, detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_with_bounds() {
        let c = parse_classification(
            r#"{"tipo": "temporal", "inicio": "2024-03-09T00:00:00", "fim": "2024-03-09T23:59:59"}"#,
        );
        assert_eq!(
            c.intent,
            Intent::Temporal {
                start: Some("2024-03-09T00:00:00".into()),
                end: Some("2024-03-09T23:59:59".into()),
            }
        );
    }

    #[test]
    fn test_fenced_reply() {
        let c = parse_classification("```json\n{\"tipo\": \"codigo\"}\n```");
        assert_eq!(c.intent, Intent::Code);
    }

    #[test]
    fn test_malformed_replies_fall_back() {
        for reply in ["I think this is semantic", "[1, 2]", r#"{"type": "semantica"}"#, ""] {
            let c = parse_classification(reply);
            assert_eq!(c.intent, Intent::Fallback, "reply: {reply}");
            assert!(c.detail.is_some());
        }
    }

    #[test]
    fn test_unknown_tipo_falls_back() {
        let c = parse_classification(r#"{"tipo": "weather"}"#);
        assert_eq!(c.intent, Intent::Fallback);
        assert!(c.detail.unwrap().contains("weather"));
    }

    #[test]
    fn test_detail_is_kept() {
        let c = parse_classification(r#"{"tipo": "tools", "detalhes": "list a folder"}"#);
        assert_eq!(c.intent, Intent::Tools);
        assert_eq!(c.detail.as_deref(), Some("list a folder"));
    }
}
