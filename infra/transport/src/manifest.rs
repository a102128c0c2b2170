//! JSON module manifests.
//!
//! A file holds either one module object or an array of them (a bundle):
//!
//! ```json
//! { "id": "app/main", "deps": ["lib/math", "lib/log"], "params": 1, "value": { "port": 80 } }
//! ```
//!
//! `id` defaults to the requested identifier, `deps` to none, `params` to the number of
//! dependencies and `value` to `null`.

use modload::{Exports, Factory};
use serde::Deserialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Manifest {
    Bundle(Vec<ModuleManifest>),
    Single(ModuleManifest),
}

impl Manifest {
    pub(crate) fn into_modules(self) -> Vec<ModuleManifest> {
        match self {
            Self::Bundle(modules) => modules,
            Self::Single(module) => vec![module],
        }
    }
}

/// One module definition as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    /// Declared parameter count; dependencies past it are loaded but not passed.
    #[serde(default)]
    pub params: Option<usize>,
    #[serde(default)]
    pub value: Value,
}

impl ModuleManifest {
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.unwrap_or(self.deps.len())
    }

    /// Builds the module factory.
    ///
    /// The exports are a JSON object `{"id", "value", "deps"}` where `deps` maps every
    /// dependency handed to the factory to its own exports. Non-JSON exports show up
    /// as `null`.
    #[must_use]
    pub fn factory(&self, id: &str) -> Factory {
        let id = id.to_owned();
        let deps = self.deps.clone();
        let value = self.value.clone();

        Factory::new(self.arity(), move |args| {
            let received: Map<String, Value> = deps
                .iter()
                .zip(args)
                .map(|(dep, exports)| {
                    (dep.clone(), exports.downcast_ref::<Value>().cloned().unwrap_or(Value::Null))
                })
                .collect();
            Exports::new(json!({ "id": id, "value": value, "deps": received }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_bundle_forms() {
        let single: Manifest = serde_json::from_str(r#"{ "deps": ["a"] }"#).unwrap();
        assert_eq!(single.into_modules().len(), 1);

        let bundle: Manifest =
            serde_json::from_str(r#"[{ "id": "x" }, { "id": "y", "value": 3 }]"#).unwrap();
        let modules = bundle.into_modules();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].value, json!(3));
    }

    #[test]
    fn test_arity_defaults_to_dependency_count() {
        let module: ModuleManifest = serde_json::from_str(r#"{ "deps": ["a", "b"] }"#).unwrap();
        assert_eq!(module.arity(), 2);

        let module: ModuleManifest =
            serde_json::from_str(r#"{ "deps": ["a", "b"], "params": 0 }"#).unwrap();
        assert_eq!(module.arity(), 0);
    }
}
