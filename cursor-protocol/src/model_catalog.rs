//! Static mapping from Cursor's short model ids to canonical ids and their
//! token limits. Mirrors the way `model_family` normalizes variant suffixes
//! ("is this o3 or o3-mini") to a shared entry, generalized to Cursor's
//! `-thinking`/`-high`/`-codex*` alias suffixes.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub context: u32,
    pub output: u32,
}

const DEFAULT_LIMITS: ModelLimits = ModelLimits {
    context: 128_000,
    output: 16_384,
};

const ALIAS_SUFFIXES: &[&str] = &["-thinking", "-high", "-codex-max", "-codex"];

/// Strips any recognized alias suffix, so `"sonnet-4.5-thinking"` and
/// `"sonnet-4.5"` resolve to the same catalog entry.
pub fn canonical_model_id(model_id: &str) -> &str {
    for suffix in ALIAS_SUFFIXES {
        if let Some(stripped) = model_id.strip_suffix(suffix) {
            return stripped;
        }
    }
    model_id
}

/// Returns the token limits for a (possibly aliased) model id, falling back
/// to a conservative default for anything the catalog doesn't recognize.
/// Never panics: an unknown model id is a routine event (Cursor ships new
/// models faster than this table gets updated), not a bug.
pub fn limits_for(model_id: &str) -> ModelLimits {
    match canonical_model_id(model_id) {
        "sonnet-4.5" | "sonnet-4" | "claude-sonnet-4.5" => ModelLimits {
            context: 200_000,
            output: 64_000,
        },
        "opus-4.1" | "opus-4" => ModelLimits {
            context: 200_000,
            output: 32_000,
        },
        "gpt-5.2" | "gpt-5.1" | "gpt-5" => ModelLimits {
            context: 272_000,
            output: 128_000,
        },
        "gpt-4.1" => ModelLimits {
            context: 1_047_576,
            output: 32_768,
        },
        "o3" | "o3-mini" => ModelLimits {
            context: 200_000,
            output: 100_000,
        },
        "gemini-2.5-pro" => ModelLimits {
            context: 1_048_576,
            output: 65_536,
        },
        _ => DEFAULT_LIMITS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsableModel {
    pub model_id: String,
    pub display_model_id: Option<String>,
    pub aliases: Vec<String>,
    pub display_name: Option<String>,
    pub display_name_short: Option<String>,
}

/// Mutable view onto the static table above, kept in a `HashMap` of
/// server-reported spellings (`displayModelId`, `aliases`) to the canonical
/// id whose static limits those spellings should resolve to. The static
/// `limits_for`/`canonical_model_id` table stays authoritative for context
/// and output limits; merging only teaches the catalog new names for ids it
/// already knows the limits for.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    alias_to_canonical: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a `GetUsableModels` response into the catalog, recording every
    /// alias and display id a server-reported model carries under its
    /// canonical `model_id`. Safe to call repeatedly (e.g. once per login or
    /// session start); later calls simply overwrite earlier alias mappings.
    pub fn merge_usable_models(&mut self, models: Vec<UsableModel>) {
        for model in models {
            for alias in model.aliases.iter().chain(model.display_model_id.iter()) {
                self.alias_to_canonical
                    .insert(alias.clone(), model.model_id.clone());
            }
        }
    }

    /// Resolves a model id through any merged server alias first, then
    /// falls back to the static suffix-stripping rules.
    pub fn canonical_model_id(&self, model_id: &str) -> String {
        if let Some(canonical) = self.alias_to_canonical.get(model_id) {
            return canonical.clone();
        }
        canonical_model_id(model_id).to_string()
    }

    pub fn limits_for(&self, model_id: &str) -> ModelLimits {
        limits_for(&self.canonical_model_id(model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alias_suffixes_collapse_to_the_base_entry() {
        assert_eq!(canonical_model_id("sonnet-4.5-thinking"), "sonnet-4.5");
        assert_eq!(canonical_model_id("gpt-5.2-high"), "gpt-5.2");
        assert_eq!(limits_for("sonnet-4.5-thinking"), limits_for("sonnet-4.5"));
    }

    #[test]
    fn unmapped_model_falls_back_to_default_limits() {
        assert_eq!(limits_for("some-future-model"), DEFAULT_LIMITS);
    }

    #[test]
    fn merged_alias_resolves_to_canonical_limits() {
        let mut catalog = Catalog::new();
        catalog.merge_usable_models(vec![UsableModel {
            model_id: "sonnet-4.5".to_string(),
            display_model_id: Some("claude-sonnet-4-5-20250929".to_string()),
            aliases: vec!["claude-4.5-sonnet".to_string()],
            display_name: Some("Claude Sonnet 4.5".to_string()),
            display_name_short: Some("Sonnet 4.5".to_string()),
        }]);

        assert_eq!(
            catalog.canonical_model_id("claude-4.5-sonnet"),
            "sonnet-4.5"
        );
        assert_eq!(
            catalog.limits_for("claude-sonnet-4-5-20250929"),
            limits_for("sonnet-4.5")
        );
    }

    #[test]
    fn catalog_falls_back_to_static_rules_when_nothing_merged() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.limits_for("sonnet-4.5-thinking"),
            limits_for("sonnet-4.5")
        );
    }
}
