use super::SharedScriptFactory;
use crate::ScriptError;
use ahash::AHashMap;
use libloading::Library;
use std::path::{Path, PathBuf};

/// Symbol every script engine module exports.
pub const REGISTER_FACTORY_SYMBOL: &[u8] = b"vrml_script_register_factory";

/// Signature of `REGISTER_FACTORY_SYMBOL`. Modules must be built against
/// the same version of this crate as the browser loading them.
#[allow(improper_ctypes_definitions)]
pub type RegisterFactoryFn = unsafe extern "C" fn(&mut ScriptEngineRegistrar);

/// Handed to a module's entry point. Registrations are staged here and
/// committed once the entry point returns.
type StagedFactory = (Vec<String>, Vec<String>, SharedScriptFactory);

#[derive(Default)]
pub struct ScriptEngineRegistrar {
    staged: Vec<StagedFactory>,
    error: Option<ScriptError>,
}

impl ScriptEngineRegistrar {
    pub fn register_factory(
        &mut self,
        media_types: &[&str],
        uri_schemes: &[&str],
        factory: SharedScriptFactory,
    ) -> Result<(), ScriptError> {
        let media_types: Vec<String> = media_types.iter().map(|m| normalize_media_type(m)).collect();
        let uri_schemes: Vec<String> = uri_schemes.iter().map(|s| s.to_ascii_lowercase()).collect();
        let claimed = self
            .staged
            .iter()
            .flat_map(|(m, s, _)| m.iter().chain(s))
            .find(|name| media_types.contains(name) || uri_schemes.contains(name))
            .cloned();
        if let Some(name) = claimed {
            let err = ScriptError::AlreadyClaimed(name);
            self.error = Some(err.clone());
            return Err(err);
        }
        self.staged.push((media_types, uri_schemes, factory));
        Ok(())
    }
}

/// Script engines by the media types and URI schemes they claim. A media
/// type or scheme belongs to one engine at most.
#[derive(Default)]
pub struct ScriptEngineRegistry {
    by_media_type: AHashMap<String, SharedScriptFactory>,
    by_scheme: AHashMap<String, SharedScriptFactory>,
    // Last, so factories created by a module drop before it unloads.
    modules: Vec<(PathBuf, Library)>,
}

impl ScriptEngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `media_types` and `uri_schemes` for `factory`. Nothing is
    /// registered if any of them is already taken.
    pub fn register_factory(
        &mut self,
        media_types: &[&str],
        uri_schemes: &[&str],
        factory: SharedScriptFactory,
    ) -> Result<(), ScriptError> {
        let media_types: Vec<String> = media_types.iter().map(|m| normalize_media_type(m)).collect();
        let uri_schemes: Vec<String> = uri_schemes.iter().map(|s| s.to_ascii_lowercase()).collect();
        self.commit(media_types, uri_schemes, factory)
    }

    /// The first of `media_types` or `uri_schemes` already claimed.
    fn claimed(&self, media_types: &[String], uri_schemes: &[String]) -> Option<String> {
        media_types
            .iter()
            .find(|m| self.by_media_type.contains_key(*m))
            .or_else(|| uri_schemes.iter().find(|s| self.by_scheme.contains_key(*s)))
            .cloned()
    }

    fn commit(
        &mut self,
        media_types: Vec<String>,
        uri_schemes: Vec<String>,
        factory: SharedScriptFactory,
    ) -> Result<(), ScriptError> {
        self.commit_all(vec![(media_types, uri_schemes, factory)])
    }

    /// Register every staged factory, or none of them if any name is taken.
    fn commit_all(&mut self, staged: Vec<StagedFactory>) -> Result<(), ScriptError> {
        for (media_types, uri_schemes, _) in &staged {
            if let Some(taken) = self.claimed(media_types, uri_schemes) {
                return Err(ScriptError::AlreadyClaimed(taken));
            }
        }
        for (media_types, uri_schemes, factory) in staged {
            for media_type in media_types {
                log::debug!("script engine registered for {media_type}");
                self.by_media_type.insert(media_type, factory.clone());
            }
            for scheme in uri_schemes {
                log::debug!("script engine registered for {scheme}:");
                self.by_scheme.insert(scheme, factory.clone());
            }
        }
        Ok(())
    }

    /// Load one engine module and run its entry point. The module stays
    /// loaded for as long as the registry, so its factories never outlive
    /// its code; a module that registers nothing is unloaded again.
    pub fn load_module(&mut self, path: &Path) -> Result<(), ScriptError> {
        let load_error = |reason: String| ScriptError::EngineLoad {
            path: path.display().to_string(),
            reason,
        };
        let library = unsafe { Library::new(path) }.map_err(|e| load_error(e.to_string()))?;
        let mut registrar = ScriptEngineRegistrar::default();
        unsafe {
            let register = library
                .get::<RegisterFactoryFn>(REGISTER_FACTORY_SYMBOL)
                .map_err(|e| load_error(e.to_string()))?;
            register(&mut registrar);
        }
        let staged = std::mem::take(&mut registrar.staged);
        if let Some(err) = registrar.error.take() {
            return Err(load_error(err.to_string()));
        }
        if staged.is_empty() {
            return Err(load_error("module registered no script engine".to_string()));
        }
        // Factories built by the module drop here, before `library` does.
        self.commit_all(staged).map_err(|e| load_error(e.to_string()))?;
        log::info!("loaded script engine module {}", path.display());
        self.modules.push((path.to_path_buf(), library));
        Ok(())
    }

    /// Load every module found in `search_path`. Modules that fail to load
    /// are skipped with a warning.
    pub fn discover(search_path: &[PathBuf]) -> Self {
        let mut registry = Self::new();
        for dir in search_path {
            let files = match vrml_io::module_files(dir) {
                Ok(files) => files,
                Err(e) => {
                    log::debug!("skipping script directory {}: {e}", dir.display());
                    continue;
                }
            };
            for file in files {
                if let Err(e) = registry.load_module(&file) {
                    log::warn!("{e}");
                }
            }
        }
        registry
    }

    pub fn factory_for_media_type(&self, media_type: &str) -> Option<SharedScriptFactory> {
        self.by_media_type.get(&normalize_media_type(media_type)).cloned()
    }

    pub fn factory_for_scheme(&self, scheme: &str) -> Option<SharedScriptFactory> {
        self.by_scheme.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn media_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.by_media_type.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn uri_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.by_scheme.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_paths(&self) -> Vec<&Path> {
        self.modules.iter().map(|(path, _)| path.as_path()).collect()
    }
}

/// `Text/JavaScript; charset=utf-8` and `text/javascript` are the same type.
fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Script, ScriptContext, ScriptFactory, ScriptNodeInfo};
    use std::sync::Arc;
    use vrml_field::FieldValue;
    use vrml_io::ResourceStream;

    struct Silent;

    impl Script for Silent {
        fn process_event(
            &mut self,
            _ctx: &mut ScriptContext<'_>,
            _event_in: &str,
            _value: &FieldValue,
            _timestamp: f64,
        ) -> Result<(), ScriptError> {
            Ok(())
        }
    }

    struct SilentFactory;

    impl ScriptFactory for SilentFactory {
        fn create_script(
            &self,
            _node: &ScriptNodeInfo,
            _source: Box<dyn ResourceStream>,
        ) -> Result<Box<dyn Script>, ScriptError> {
            Ok(Box::new(Silent))
        }
    }

    #[test]
    fn lookups_ignore_case_and_parameters() {
        let mut registry = ScriptEngineRegistry::new();
        registry
            .register_factory(&["text/x-silent"], &["Silent"], Arc::new(SilentFactory))
            .unwrap();
        assert!(registry.factory_for_media_type("Text/X-Silent; charset=utf-8").is_some());
        assert!(registry.factory_for_scheme("silent").is_some());
        assert!(registry.factory_for_media_type("text/javascript").is_none());
        assert_eq!(registry.uri_schemes(), vec!["silent".to_string()]);
    }

    #[test]
    fn conflicting_registration_changes_nothing() {
        let mut registry = ScriptEngineRegistry::new();
        registry
            .register_factory(&["text/x-a"], &["a"], Arc::new(SilentFactory))
            .unwrap();
        let err = registry
            .register_factory(&["text/x-b"], &["a"], Arc::new(SilentFactory))
            .unwrap_err();
        assert_eq!(err, ScriptError::AlreadyClaimed("a".to_string()));
        assert!(registry.factory_for_media_type("text/x-b").is_none());
        assert_eq!(registry.media_types(), vec!["text/x-a".to_string()]);
    }

    #[test]
    fn module_registrations_commit_together_or_not_at_all() {
        let mut registry = ScriptEngineRegistry::new();
        registry
            .register_factory(&["application/x-vrml-echo"], &[], Arc::new(SilentFactory))
            .unwrap();

        let mut registrar = ScriptEngineRegistrar::default();
        registrar
            .register_factory(&["text/x-new"], &["new"], Arc::new(SilentFactory))
            .unwrap();
        registrar
            .register_factory(&["application/x-vrml-echo"], &[], Arc::new(SilentFactory))
            .unwrap();
        assert_eq!(
            registry.commit_all(std::mem::take(&mut registrar.staged)),
            Err(ScriptError::AlreadyClaimed("application/x-vrml-echo".to_string()))
        );
        assert!(registry.factory_for_media_type("text/x-new").is_none());
        assert!(registry.factory_for_scheme("new").is_none());
        assert_eq!(registry.media_types(), vec!["application/x-vrml-echo".to_string()]);
    }

    #[test]
    fn registrar_rejects_a_name_staged_twice() {
        let mut registrar = ScriptEngineRegistrar::default();
        registrar
            .register_factory(&["text/x-a"], &[], Arc::new(SilentFactory))
            .unwrap();
        assert!(registrar
            .register_factory(&["TEXT/X-A"], &[], Arc::new(SilentFactory))
            .is_err());
        assert!(registrar.error.is_some());
    }

    #[test]
    fn loading_a_missing_module_fails() {
        let mut registry = ScriptEngineRegistry::new();
        let err = registry
            .load_module(Path::new("/nonexistent/libvrml_nothing.so"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::EngineLoad { .. }));
        assert_eq!(registry.module_count(), 0);
    }

    #[test]
    fn discover_skips_files_that_are_not_modules() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join(format!("bogus.{}", vrml_io::module_extension()));
        std::fs::write(&bogus, b"not a shared object").unwrap();
        let registry = ScriptEngineRegistry::discover(&[dir.path().to_path_buf()]);
        assert_eq!(registry.module_count(), 0);
        assert!(registry.media_types().is_empty());
    }
}
