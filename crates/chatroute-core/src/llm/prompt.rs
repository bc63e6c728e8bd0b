//! Instruction block sent with every upstream call.

use chatroute_types::config::RouterSettings;
use chatroute_types::llm::{AdapterRequest, ChatRequest};

use super::directive::ACTION_MARKER;

/// Builds the system instruction and the per-call generation limits.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    language: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl PromptBuilder {
    pub fn new(settings: &RouterSettings) -> Self {
        Self {
            persona: settings.persona.clone(),
            language: settings.language.clone(),
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
        }
    }

    /// Build the adapter request for `request`.
    ///
    /// `vocabulary` lists the action kinds allowed in the request's module;
    /// an empty slice lets the model suggest any `verb-target` kind.
    /// Per-provider limits override the router defaults when set.
    pub fn build(
        &self,
        request: &ChatRequest,
        vocabulary: &[String],
        max_output_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> AdapterRequest {
        AdapterRequest {
            system_instruction: self.system_instruction(request, vocabulary),
            message: request.message.clone(),
            max_output_tokens: max_output_tokens.unwrap_or(self.max_output_tokens),
            temperature: temperature.unwrap_or(self.temperature),
        }
    }

    fn system_instruction(&self, request: &ChatRequest, vocabulary: &[String]) -> String {
        let mut lines = vec![
            self.persona.clone(),
            format!("Responda sempre no idioma {}.", self.language),
        ];

        let module = request.context.module.trim();
        if !module.is_empty() {
            lines.push(format!("O usuário está no módulo \"{module}\" do sistema."));
        }

        if !request.context.extra.is_empty() {
            let extra = request
                .context
                .extra
                .iter()
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => format!("{key}: {s}"),
                    other => format!("{key}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("; ");
            lines.push(format!("Contexto da tela: {extra}."));
        }

        lines.push(String::new());
        lines.push(format!(
            "Se fizer sentido sugerir uma ação, termine a resposta com uma única linha no formato \
             \"{ACTION_MARKER} <verbo>-<alvo>-<descrição curta>\"."
        ));
        if vocabulary.is_empty() {
            lines.push(
                "Use verbos como create, query, update ou navigate e um alvo em uma palavra."
                    .to_string(),
            );
        } else {
            lines.push(format!(
                "Ações permitidas neste módulo: {}. Nunca sugira outras.",
                vocabulary.join(", ")
            ));
        }
        lines.push("Se nenhuma ação for útil, não inclua a linha.".to_string());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(&RouterSettings::default())
    }

    #[test]
    fn test_instruction_mentions_module_language_and_vocabulary() {
        let request = ChatRequest::new("Quero cadastrar um cliente", "clientes");
        let vocabulary = vec!["create-cliente".to_string(), "query-cliente".to_string()];

        let built = builder().build(&request, &vocabulary, None, None);

        assert_eq!(built.message, "Quero cadastrar um cliente");
        assert!(built.system_instruction.contains("pt-BR"));
        assert!(built.system_instruction.contains("\"clientes\""));
        assert!(built.system_instruction.contains("create-cliente, query-cliente"));
        assert!(built.system_instruction.contains(ACTION_MARKER));
        assert_eq!(built.max_output_tokens, 1024);
    }

    #[test]
    fn test_provider_limits_override_defaults() {
        let request = ChatRequest::new("oi", "home");
        let built = builder().build(&request, &[], Some(256), Some(0.2));
        assert_eq!(built.max_output_tokens, 256);
        assert_eq!(built.temperature, 0.2);
        assert!(built.system_instruction.contains("navigate"));
    }

    #[test]
    fn test_context_extra_is_rendered() {
        let mut request = ChatRequest::new("Quanto vendi hoje?", "vendas");
        request
            .context
            .extra
            .insert("periodo".to_string(), serde_json::json!("hoje"));
        request
            .context
            .extra
            .insert("filial".to_string(), serde_json::json!(3));

        let built = builder().build(&request, &[], None, None);
        assert!(built.system_instruction.contains("periodo: hoje"));
        assert!(built.system_instruction.contains("filial: 3"));
    }
}
