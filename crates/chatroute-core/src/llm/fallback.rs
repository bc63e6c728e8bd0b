//! Deterministic fallback replies, keyed by business module.
//!
//! Used when every credential of every provider has been tried or is cooling
//! down. Lookups are pure and never fail: unknown modules get the default
//! entry.

use std::collections::HashMap;

use chatroute_types::config::ModuleProfile;
use chatroute_types::llm::{ChatContext, ChatResponse, ResponseMetadata, SuggestedAction, FALLBACK_PROVIDER};

pub struct FallbackResponder {
    profiles: HashMap<String, ModuleProfile>,
    default: ModuleProfile,
}

fn profile(name: &str, reply: &str, actions: &[(&str, &str)], allowed: &[&str]) -> ModuleProfile {
    ModuleProfile {
        name: name.to_string(),
        fallback_reply: reply.to_string(),
        fallback_actions: actions
            .iter()
            .map(|(kind, title)| SuggestedAction::new(*kind, *title))
            .collect(),
        allowed_actions: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_profiles() -> Vec<ModuleProfile> {
    vec![
        profile(
            "home",
            "Olá! O assistente está indisponível no momento, mas você pode acessar os módulos pelo menu principal.",
            &[("navigate-clientes", "Abrir clientes"), ("query-relatorio", "Ver relatórios")],
            &[
                "navigate-clientes",
                "navigate-produtos",
                "navigate-estoque",
                "navigate-vendas",
                "navigate-financeiro",
                "navigate-agenda",
                "query-relatorio",
            ],
        ),
        profile(
            "clientes",
            "No momento não consigo responder, mas você pode cadastrar ou buscar clientes por aqui.",
            &[("create-cliente", "Cadastrar cliente"), ("query-cliente", "Buscar cliente")],
            &["create-cliente", "query-cliente", "update-cliente"],
        ),
        profile(
            "produtos",
            "No momento não consigo responder, mas você pode cadastrar ou consultar produtos por aqui.",
            &[("create-produto", "Cadastrar produto"), ("query-produto", "Buscar produto")],
            &["create-produto", "query-produto", "update-produto"],
        ),
        profile(
            "estoque",
            "No momento não consigo responder. Consulte os níveis de estoque diretamente na tabela.",
            &[("query-estoque", "Consultar estoque")],
            &["query-estoque", "update-estoque"],
        ),
        profile(
            "vendas",
            "No momento não consigo responder, mas você pode registrar uma venda ou ver o relatório do período.",
            &[("create-venda", "Registrar venda"), ("query-relatorio", "Relatório de vendas")],
            &["create-venda", "query-venda", "query-relatorio"],
        ),
        profile(
            "financeiro",
            "No momento não consigo responder. Os lançamentos e o fluxo de caixa continuam disponíveis neste módulo.",
            &[("query-lancamento", "Ver lançamentos")],
            &["create-lancamento", "query-lancamento", "query-relatorio"],
        ),
        profile(
            "relatorios",
            "No momento não consigo responder, mas os relatórios podem ser gerados normalmente.",
            &[("query-relatorio", "Gerar relatório")],
            &["query-relatorio"],
        ),
        profile(
            "agenda",
            "No momento não consigo responder. Você pode criar ou consultar compromissos pela agenda.",
            &[("create-compromisso", "Novo compromisso"), ("query-compromisso", "Ver compromissos")],
            &["create-compromisso", "query-compromisso"],
        ),
    ]
}

fn default_profile() -> ModuleProfile {
    profile(
        "default",
        "Desculpe, o assistente está temporariamente indisponível. Tente novamente em alguns instantes.",
        &[],
        &[],
    )
}

fn key(module: &str) -> String {
    module.trim().to_lowercase()
}

impl FallbackResponder {
    /// Responder with the built-in business modules.
    pub fn builtin() -> Self {
        Self::with_overrides(Vec::new())
    }

    /// Built-in table with configured entries replacing or adding modules.
    /// An entry named `default` replaces the default reply.
    pub fn with_overrides(overrides: Vec<ModuleProfile>) -> Self {
        let mut profiles: HashMap<String, ModuleProfile> = builtin_profiles()
            .into_iter()
            .map(|p| (key(&p.name), p))
            .collect();
        let mut default = default_profile();

        for entry in overrides {
            let name = key(&entry.name);
            if name == "default" {
                default = entry;
            } else {
                profiles.insert(name, entry);
            }
        }

        Self { profiles, default }
    }

    /// Profile for `module`, or the default profile. Case-insensitive.
    pub fn profile(&self, module: &str) -> &ModuleProfile {
        self.profiles.get(&key(module)).unwrap_or(&self.default)
    }

    pub fn is_known(&self, module: &str) -> bool {
        self.profiles.contains_key(&key(module))
    }

    /// Action kinds allowed in `module`. Empty means any kind.
    pub fn allowed_actions(&self, module: &str) -> &[String] {
        &self.profile(module).allowed_actions
    }

    /// Canned response for the request context.
    pub fn respond(&self, context: &ChatContext) -> ChatResponse {
        let profile = self.profile(&context.module);
        ChatResponse {
            message: profile.fallback_reply.clone(),
            actions: profile.fallback_actions.clone(),
            metadata: ResponseMetadata {
                provider: FALLBACK_PROVIDER.to_string(),
                tokens_used: None,
                model: None,
                cancelled: false,
            },
        }
    }

    /// Module names with a dedicated entry, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.values().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::builtin()
    }
}
