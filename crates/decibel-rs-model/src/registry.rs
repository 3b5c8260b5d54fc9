//! The process-wide definition registry.
//!
//! Definitions are registered once per model qualified name and served as
//! shared references for the remainder of the process. The registry also
//! resolves definition options against deployment-level overrides, and in
//! debug mode verifies that each registered hierarchy mirrors its parent's.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use decibel_rs_core::error::{DecibelError, DecibelResult};
use decibel_rs_core::settings::Settings;

use crate::definition::{Definition, ModelKind};

/// Holds every registered [`Definition`], keyed by qualified name.
///
/// Constructed once at process start and passed by reference to every search
/// and model load; tests use isolated registries instead of hidden global
/// state. The interior lock keeps the registry shareable across threads even
/// though the execution model is single-threaded per request.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    debug: bool,
    deployment_options: HashMap<String, serde_json::Value>,
    definitions: RwLock<HashMap<String, Arc<Definition>>>,
}

impl DefinitionRegistry {
    /// Creates a registry configured from deployment settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            debug: settings.debug,
            deployment_options: settings.model_options.clone(),
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with an explicit debug flag and no deployment
    /// overrides.
    #[must_use]
    pub fn with_debug(debug: bool) -> Self {
        Self {
            debug,
            deployment_options: HashMap::new(),
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the registry runs development-time checks.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Registers a definition, replacing any existing registration for the
    /// same qualified name.
    ///
    /// In debug mode the inheritance hierarchy is verified against the
    /// registered parent: the parent must exist and its hierarchy must equal
    /// this definition's hierarchy minus its first entry.
    pub fn register(&self, definition: Definition) -> DecibelResult<Arc<Definition>> {
        if self.debug && definition.kind() == ModelKind::Standard {
            self.check_hierarchy(&definition)?;
        }
        let shared = Arc::new(definition);
        let mut map = self
            .definitions
            .write()
            .map_err(|_| poisoned(shared.qualified_name()))?;
        map.insert(shared.qualified_name().to_string(), Arc::clone(&shared));
        tracing::debug!(model = shared.qualified_name(), "definition registered");
        Ok(shared)
    }

    /// Loads the definition for a qualified name.
    pub fn load(&self, qualified_name: &str) -> DecibelResult<Arc<Definition>> {
        let map = self
            .definitions
            .read()
            .map_err(|_| poisoned(qualified_name))?;
        map.get(qualified_name)
            .cloned()
            .ok_or_else(|| DecibelError::UnknownDefinition(qualified_name.to_string()))
    }

    /// Removes a registration, optionally together with every definition
    /// that names it in its hierarchy.
    pub fn remove(&self, qualified_name: &str, include_descendants: bool) {
        if let Ok(mut map) = self.definitions.write() {
            map.remove(qualified_name);
            if include_descendants {
                map.retain(|_, def| {
                    !def.hierarchy().iter().any(|anc| anc == qualified_name)
                });
            }
        }
    }

    /// Resolves a definition option: static value first, then the
    /// deployment override, then the declared default.
    #[must_use]
    pub fn option(&self, definition: &Definition, name: &str) -> Option<serde_json::Value> {
        if let Some(value) = definition.static_option(name) {
            return Some(value.clone());
        }
        let key = format!("{}.{name}", definition.qualified_name());
        if let Some(value) = self.deployment_options.get(&key) {
            return Some(value.clone());
        }
        definition.option_default(name).cloned()
    }

    fn check_hierarchy(&self, definition: &Definition) -> DecibelResult<()> {
        let Some(parent_name) = definition.hierarchy().first() else {
            return Ok(());
        };
        let map = self
            .definitions
            .read()
            .map_err(|_| poisoned(definition.qualified_name()))?;
        let Some(parent) = map.get(parent_name) else {
            return Err(DecibelError::InvalidDefinitionHierarchy {
                qualified_name: definition.qualified_name().to_string(),
                message: format!("ancestor '{parent_name}' is not registered"),
            });
        };
        if parent.hierarchy() != &definition.hierarchy()[1..] {
            return Err(DecibelError::InvalidDefinitionHierarchy {
                qualified_name: definition.qualified_name().to_string(),
                message: format!(
                    "hierarchy {:?} does not mirror ancestor '{parent_name}' hierarchy {:?}",
                    definition.hierarchy(),
                    parent.hierarchy()
                ),
            });
        }
        Ok(())
    }
}

fn poisoned(qualified_name: &str) -> DecibelError {
    DecibelError::InvalidMethodCall(format!(
        "definition registry lock poisoned while accessing '{qualified_name}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Field, FieldKind};

    fn registry() -> DefinitionRegistry {
        DefinitionRegistry::with_debug(true)
    }

    #[test]
    fn test_register_and_load() {
        let registry = registry();
        let def = Definition::new("blog.Article", ModelKind::Standard).unwrap();
        registry.register(def).unwrap();
        let loaded = registry.load("blog.Article").unwrap();
        assert_eq!(loaded.qualified_name(), "blog.Article");
    }

    #[test]
    fn test_load_unknown_definition() {
        let registry = registry();
        let err = registry.load("blog.Missing").unwrap_err();
        assert!(matches!(err, DecibelError::UnknownDefinition(_)));
    }

    #[test]
    fn test_remove() {
        let registry = registry();
        registry
            .register(Definition::new("blog.Article", ModelKind::Standard).unwrap())
            .unwrap();
        registry.remove("blog.Article", false);
        assert!(registry.load("blog.Article").is_err());
    }

    #[test]
    fn test_remove_with_descendants() {
        let registry = registry();
        let content = Definition::new("app.Content", ModelKind::Standard).unwrap();
        let content = registry.register(content).unwrap();
        let mut article = Definition::new("blog.Article", ModelKind::Standard).unwrap();
        article.extend(&content).unwrap();
        registry.register(article).unwrap();

        registry.remove("app.Content", true);
        assert!(registry.load("app.Content").is_err());
        assert!(registry.load("blog.Article").is_err());
    }

    #[test]
    fn test_hierarchy_check_missing_ancestor() {
        let registry = registry();
        let parent = Definition::new("app.Content", ModelKind::Standard).unwrap();
        let mut child = Definition::new("blog.Article", ModelKind::Standard).unwrap();
        child.extend(&parent).unwrap();
        // Parent never registered.
        let err = registry.register(child).unwrap_err();
        assert!(matches!(
            err,
            DecibelError::InvalidDefinitionHierarchy { .. }
        ));
    }

    #[test]
    fn test_hierarchy_check_skipped_without_debug() {
        let registry = DefinitionRegistry::with_debug(false);
        let parent = Definition::new("app.Content", ModelKind::Standard).unwrap();
        let mut child = Definition::new("blog.Article", ModelKind::Standard).unwrap();
        child.extend(&parent).unwrap();
        assert!(registry.register(child).is_ok());
    }

    #[test]
    fn test_option_cascade() {
        let mut settings = Settings::default();
        settings.model_options.insert(
            "blog.Comment.parent_model".to_string(),
            serde_json::json!("blog.Article"),
        );
        let registry = DefinitionRegistry::new(&settings);

        let mut def = Definition::new("blog.Comment", ModelKind::Child).unwrap();
        def.add_field(Field::new("body", FieldKind::Text)).unwrap();
        def.declare_option("parent_model", serde_json::json!("decibel.Model"));

        // Deployment override beats the declared default.
        assert_eq!(
            registry.option(&def, "parent_model"),
            Some(serde_json::json!("blog.Article"))
        );

        // A static value beats the deployment override.
        def.set_option("parent_model", serde_json::json!("blog.Page"));
        assert_eq!(
            registry.option(&def, "parent_model"),
            Some(serde_json::json!("blog.Page"))
        );

        // Unknown options resolve to nothing.
        assert_eq!(registry.option(&def, "missing"), None);
    }
}
