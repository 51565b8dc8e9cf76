use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use vrml_core::{Browser, BrowserConfig, InitialValues, Interface, InterfaceSet, ScriptEngineRegistry};
use vrml_field::{FieldType, FieldValue};
use vrml_script_echo::{ECHO_MEDIA_TYPE, ECHO_SCHEME};

/// The cdylib cargo built for this crate, next to the test binary.
fn built_module() -> Option<PathBuf> {
    let name = format!(
        "{}vrml_script_echo.{}",
        std::env::consts::DLL_PREFIX,
        vrml_io::module_extension()
    );
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    [deps.to_path_buf(), deps.parent()?.to_path_buf()]
        .into_iter()
        .map(|dir| dir.join(&name))
        .find(|path| path.is_file())
}

/// A search path holding only the echo module.
fn module_dir() -> Option<tempfile::TempDir> {
    let Some(module) = built_module() else {
        eprintln!("echo module not built next to the test binary; skipping");
        return None;
    };
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(&module, dir.path().join(module.file_name().unwrap())).unwrap();
    Some(dir)
}

#[test]
fn discovery_loads_the_echo_module() {
    let _ = env_logger::builder().is_test(true).try_init();
    let Some(dir) = module_dir() else {
        return;
    };
    let registry = ScriptEngineRegistry::discover(&[dir.path().to_path_buf()]);
    assert_eq!(registry.media_types(), vec![ECHO_MEDIA_TYPE.to_string()]);
    assert_eq!(registry.uri_schemes(), vec![ECHO_SCHEME.to_string()]);
    assert!(registry.factory_for_scheme("ECHO").is_some());
}

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn browser_runs_a_script_from_a_discovered_module() {
    let _ = env_logger::builder().is_test(true).try_init();
    let Some(dir) = module_dir() else {
        return;
    };
    let mut config = BrowserConfig::default();
    config.scripts.discover = true;
    config.scripts.search_path = vec![dir.path().to_path_buf()];
    let out = Sink::default();
    let browser = Browser::builder()
        .config(config)
        .out(Box::new(out.clone()))
        .build()
        .unwrap();

    let interfaces = InterfaceSet::from_interfaces([
        Interface::event_in(FieldType::SFFloat, "set_value"),
        Interface::event_out(FieldType::SFFloat, "value_changed"),
    ])
    .unwrap();
    let mut values = InitialValues::new();
    values.insert(
        "url".into(),
        FieldValue::MFString(vec!["echo:print loaded; value -> value_changed".to_string()]),
    );
    let node = browser
        .node_class("Script")
        .unwrap()
        .create_type("Echo", &interfaces)
        .unwrap()
        .create_node(None, &values)
        .unwrap();
    browser.replace_world(vec![Arc::clone(&node)]).unwrap();
    assert_eq!(String::from_utf8_lossy(&out.0.lock().unwrap()), "loaded\n");

    browser.queue_event(1.0, FieldValue::SFFloat(0.75), node.id(), "set_value");
    browser.update(1.0);
    assert_eq!(node.event_out_value("value").unwrap(), FieldValue::SFFloat(0.75));
}
