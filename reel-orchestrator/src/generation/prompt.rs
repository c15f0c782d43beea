//! Prompt formatting, reply parsing and code screening

use reel_core::domain::render::{Quality, RenderConfig};
use serde::Deserialize;

use super::GenerationError;

pub const SYSTEM_PROMPT: &str = r#"You generate mathematical animation code for the Manim Community library. You are one layer of a multi-layered security system: the code you produce is screened again and executed in a sandbox, but you must still reject any request that looks even remotely unsafe.

# Analyse the request
Consider what the user is trying to accomplish, whether the result could be harmful or inappropriate, and whether it asks for behaviour that could execute arbitrary code, reach sensitive data or exhaust resources. Reject requests that describe prohibited behaviour even when they contain no code.

# Prohibited code
- File I/O: open(), os.path.*, os.makedirs() or any other read/write of files
- Subprocesses: subprocess.*, os.system()
- Network access: socket.*, urllib.*
- Dynamic execution: eval(), exec(), compile(), __import__()
- Imports of os, sys, subprocess, socket, urllib
- Reflection: getattr(), setattr(), hasattr(), globals(), locals()

# Prohibited content
Violence or promotion of harmful activities, hate speech or discrimination, misinformation or conspiracy theories, sexually explicit material, copyright infringement.

# Resource limits
Reject requests that imply unbounded computation, infinite loops or memory exhaustion.

# Code rules
Only `from manim import *` and numpy. One `class SceneName(Scene)` with a `construct` method. No `if __name__ == '__main__':` block. No file output of any kind. Check the code for syntax and semantic errors before answering; if it cannot be made correct, reject.

# Reply format
Reply with JSON only, in exactly one of these shapes:
{"status": "accepted", "code": "from manim import *\nclass MyScene(Scene):\n    def construct(self):\n        self.play(Write(Text('Hello')))"}
{"status": "rejected", "reason": "why the request was rejected"}

When unsure, reject."#;

/// Constructs refused in generated code, matched on identifier boundaries
const PROHIBITED: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import socket",
    "import urllib",
    "from os",
    "from sys",
    "from subprocess",
    "from socket",
    "from urllib",
    "subprocess.",
    "socket.",
    "urllib.",
    "os.system",
    "os.path",
    "os.makedirs",
    "open(",
    "eval(",
    "exec(",
    "compile(",
    "__import__",
    "getattr(",
    "setattr(",
    "hasattr(",
    "globals(",
    "locals(",
];

pub fn quality_instructions(quality: Option<Quality>) -> &'static str {
    match quality {
        Some(Quality::High) => {
            "Use high-quality animations with smooth transitions, detailed mathematical objects, and professional styling."
        }
        Some(Quality::Medium) => {
            "Create balanced animations with good visual appeal and moderate complexity."
        }
        Some(Quality::Low) => "Generate simple, quick animations focusing on core concepts.",
        None => "Create well-balanced animations with good visual quality.",
    }
}

/// User turn sent to the provider
pub fn user_prompt(prompt: &str, config: &RenderConfig) -> String {
    let duration = config
        .duration
        .map(|secs| {
            format!(
                "The animation should run for approximately {} seconds.",
                secs
            )
        })
        .unwrap_or_default();

    format!(
        "{}\n\n{}\n{}\n\nGenerate Manim code for this animation.",
        prompt,
        quality_instructions(config.quality),
        duration
    )
}

/// Prompt for a retry: the failing code and the render error, so the next
/// attempt can correct it
pub fn retry_prompt(original_prompt: &str, code: Option<&str>, error: &str) -> String {
    format!(
        "There is a problem with the generated code.\n\
         ORIGINAL REQUEST: {}\n\
         CODE:\n{}\n\
         ERROR_MESSAGE: {}\n\
         Fix the code so that it renders successfully.",
        original_prompt,
        code.unwrap_or("<none>"),
        error
    )
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parses the `{status, code|reason}` reply, tolerating a surrounding
/// markdown fence or stray prose around the JSON object.
pub fn parse_response(raw: &str) -> Result<String, GenerationError> {
    let body = strip_fence(raw.trim());

    let reply: ModelReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(first_err) => {
            let object = match (body.find('{'), body.rfind('}')) {
                (Some(start), Some(end)) if start < end => &body[start..=end],
                _ => return Err(GenerationError::Malformed(first_err.to_string())),
            };
            serde_json::from_str(object).map_err(|e| GenerationError::Malformed(e.to_string()))?
        }
    };

    match reply.status.as_str() {
        "accepted" => reply
            .code
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::Malformed("accepted reply without code".to_string())),
        "rejected" => Err(GenerationError::Rejected(
            reply
                .reason
                .unwrap_or_else(|| "no reason given".to_string()),
        )),
        other => Err(GenerationError::Malformed(format!(
            "unknown reply status '{}'",
            other
        ))),
    }
}

/// Normalizes accepted code and refuses prohibited constructs
pub fn sanitize_code(code: &str) -> Result<String, GenerationError> {
    let normalized = code.replace("\r\n", "\n");
    let cleaned = strip_fence(normalized.trim()).trim();

    if cleaned.is_empty() {
        return Err(GenerationError::Malformed("empty code".to_string()));
    }

    if let Some(hit) = PROHIBITED.iter().find(|needle| contains_construct(cleaned, needle)) {
        return Err(GenerationError::UnsafeCode(hit.to_string()));
    }

    Ok(cleaned.to_string())
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", "python") on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn contains_construct(code: &str, needle: &str) -> bool {
    let check_end = needle.chars().last().is_some_and(is_ident_char);

    code.match_indices(needle).any(|(idx, _)| {
        let before_ok = code[..idx].chars().next_back().is_none_or(|c| !is_ident_char(c) && c != '.');
        let after_ok = !check_end
            || code[idx + needle.len()..]
                .chars()
                .next()
                .is_none_or(|c| !is_ident_char(c));
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_includes_guidance() {
        let config = RenderConfig {
            quality: Some(Quality::High),
            duration: Some(8),
            resolution: None,
        };
        let text = user_prompt("draw a circle", &config);
        assert!(text.starts_with("draw a circle\n\n"));
        assert!(text.contains("high-quality animations"));
        assert!(text.contains("approximately 8 seconds"));
        assert!(text.ends_with("Generate Manim code for this animation."));
    }

    #[test]
    fn test_user_prompt_default_quality() {
        let text = user_prompt("x", &RenderConfig::default());
        assert!(text.contains("well-balanced animations"));
        assert!(!text.contains("approximately"));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let raw = "```json\n{\"status\":\"accepted\",\"code\":\"from manim import *\"}\n```";
        assert_eq!(parse_response(raw).unwrap(), "from manim import *");
    }

    #[test]
    fn test_parse_reply_with_prose() {
        let raw = "Here you go: {\"status\":\"accepted\",\"code\":\"x = 1\"} enjoy";
        assert_eq!(parse_response(raw).unwrap(), "x = 1");
    }

    #[test]
    fn test_parse_malformed_replies() {
        assert!(matches!(
            parse_response("not json"),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{"status":"accepted"}"#),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{"status":"maybe","code":"x"}"#),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejection() {
        let err = parse_response(r#"{"status":"rejected","reason":"violent content"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Rejected(reason) if reason == "violent content"));
    }

    #[test]
    fn test_sanitize_strips_fence_and_crlf() {
        let code = "```python\r\nfrom manim import *\r\nclass A(Scene):\r\n    pass\r\n```";
        assert_eq!(
            sanitize_code(code).unwrap(),
            "from manim import *\nclass A(Scene):\n    pass"
        );
    }

    #[test]
    fn test_sanitize_refuses_prohibited_constructs() {
        for code in [
            "import os\nclass A(Scene): pass",
            "x = eval('1+1')",
            "data = open('/etc/passwd').read()",
            "getattr(self, 'play')",
            "import subprocess",
        ] {
            assert!(
                matches!(sanitize_code(code), Err(GenerationError::UnsafeCode(_))),
                "accepted: {}",
                code
            );
        }
    }

    #[test]
    fn test_sanitize_allows_lookalikes() {
        for code in [
            "import osmium_free_name",
            "self.reopen(circle)",
            "self.play(Create(Circle()))",
            "value = self.my_eval(3)",
            "tracker.evaluate(2)",
        ] {
            assert!(sanitize_code(code).is_ok(), "refused: {}", code);
        }
    }

    #[test]
    fn test_retry_prompt_carries_context() {
        let text = retry_prompt("draw a circle", Some("class A(Scene): pass"), "NameError: Circl");
        assert!(text.contains("ORIGINAL REQUEST: draw a circle"));
        assert!(text.contains("class A(Scene): pass"));
        assert!(text.contains("NameError: Circl"));
    }
}
