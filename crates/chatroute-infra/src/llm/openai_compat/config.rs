//! Well-known OpenAI-compatible endpoints.
//!
//! A provider configured as `openai_compatible` without a `base_url` gets
//! its endpoint from its id when the id names one of these services.

/// OpenAI: `https://api.openai.com/v1`
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Groq: `https://api.groq.com/openai/v1`
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Mistral AI: `https://api.mistral.ai/v1`
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// OpenRouter: `https://openrouter.ai/api/v1`
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Google Gemini through its OpenAI-compatible beta endpoint.
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default base URL for a provider id, if it names a known service.
pub fn default_base_url(provider_id: &str) -> Option<&'static str> {
    match provider_id.to_lowercase().as_str() {
        "openai" => Some(OPENAI_BASE_URL),
        "groq" => Some(GROQ_BASE_URL),
        "mistral" => Some(MISTRAL_BASE_URL),
        "openrouter" => Some(OPENROUTER_BASE_URL),
        "gemini" | "gemini-openai" => Some(GEMINI_OPENAI_BASE_URL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        assert_eq!(default_base_url("groq"), Some(GROQ_BASE_URL));
        assert_eq!(default_base_url("OpenRouter"), Some(OPENROUTER_BASE_URL));
        assert_eq!(default_base_url("my-gateway"), None);
    }
}
