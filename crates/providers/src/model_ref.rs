//! Parsed model identifiers.
//!
//! Model ids are written `"<provider>:<model-name>"` in configuration and
//! in the model listing. Parsing happens once, at configuration-load time;
//! everything downstream dispatches on the tagged [`ProviderKind`] instead
//! of re-splitting strings per call.

use shared::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    LmStudio,
    Gemini,
}

impl ProviderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Local daemons expose no capability API, so multimodal support for
    /// them is guessed from the model name.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama | ProviderKind::LmStudio)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub kind: ProviderKind,
    pub name: String,
}

impl ModelRef {
    /// Parse `"<provider>:<model-name>"`. The model name may itself
    /// contain colons (`ollama:llama3.2:latest`); only the first colon
    /// separates the provider tag. An unknown tag is a configuration
    /// error, not a retryable one.
    pub fn parse(id: &str) -> Result<Self, ProviderError> {
        let (tag, name) = id
            .split_once(':')
            .ok_or_else(|| ProviderError::UnsupportedProvider(id.to_string()))?;
        let kind = match tag {
            "ollama" => ProviderKind::Ollama,
            "openai" => ProviderKind::OpenAi,
            "lmstudio" => ProviderKind::LmStudio,
            "gemini" => ProviderKind::Gemini,
            _ => return Err(ProviderError::UnsupportedProvider(id.to_string())),
        };
        if name.is_empty() {
            return Err(ProviderError::UnsupportedProvider(id.to_string()));
        }
        Ok(Self {
            kind,
            name: name.to_string(),
        })
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.kind.tag(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags() {
        let m = ModelRef::parse("ollama:llama3.2:latest").unwrap();
        assert_eq!(m.kind, ProviderKind::Ollama);
        assert_eq!(m.name, "llama3.2:latest");
        assert_eq!(m.id(), "ollama:llama3.2:latest");

        assert_eq!(
            ModelRef::parse("gemini:gemini-1.5-flash").unwrap().kind,
            ProviderKind::Gemini
        );
        assert_eq!(
            ModelRef::parse("lmstudio:qwen2.5-7b-instruct").unwrap().kind,
            ProviderKind::LmStudio
        );
    }

    // Convention: an unrecognized provider tag is a typed error raised at
    // parse time, never a synthetic response chunk.
    #[test]
    fn unknown_tag_is_a_typed_error() {
        let err = ModelRef::parse("unsupported:foo").unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedProvider(ref id) if id == "unsupported:foo"));
    }

    #[test]
    fn missing_separator_or_name_is_rejected() {
        assert!(ModelRef::parse("justamodel").is_err());
        assert!(ModelRef::parse("ollama:").is_err());
    }
}
