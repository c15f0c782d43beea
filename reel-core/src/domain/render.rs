//! Generation and render option types

use serde::{Deserialize, Serialize};

/// Code-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::OpenAi => "openai",
            Backend::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Backend::OpenAi),
            "gemini" => Ok(Backend::Gemini),
            other => Err(format!("unsupported backend: {}", other)),
        }
    }
}

/// Requested render quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(format!("unsupported quality: {}", other)),
        }
    }
}

/// Requested output resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
    #[serde(rename = "4k")]
    UltraHd,
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "720p" => Ok(Resolution::Hd),
            "1080p" => Ok(Resolution::FullHd),
            "4k" => Ok(Resolution::UltraHd),
            other => Err(format!("unsupported resolution: {}", other)),
        }
    }
}

/// Optional quality hints forwarded to generation and rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    /// Target animation length in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// Complexity class of a generated scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_wire_names() {
        assert_eq!(serde_json::to_string(&Backend::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(serde_json::to_string(&Backend::Gemini).unwrap(), "\"gemini\"");
        assert_eq!("OpenAI".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert!("claude".parse::<Backend>().is_err());
    }

    #[test]
    fn test_render_config_from_partial_json() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"quality":"high","resolution":"4k"}"#).unwrap();
        assert_eq!(config.quality, Some(Quality::High));
        assert_eq!(config.duration, None);
        assert_eq!(config.resolution, Some(Resolution::UltraHd));

        let empty: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RenderConfig::default());
    }
}
