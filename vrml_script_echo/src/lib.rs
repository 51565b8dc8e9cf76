//! A script engine small enough to read in one sitting, built as a module
//! the browser can discover on its script search path.
//!
//! An echo program is a list of lines:
//!
//! ```text
//! # comments start with a hash
//! print Hello from echo
//! set_value -> value_changed
//! ```
//!
//! `print` lines are written to the browser's output when the script is
//! initialized. `in -> out` lines send every event arriving at `in` on to
//! `out` unchanged. Inline programs (`echo:...`) separate lines with `;`.

use std::io::Read;
use std::sync::Arc;
use vrml_core::{
    Script, ScriptContext, ScriptEngineRegistrar, ScriptError, ScriptFactory, ScriptNodeInfo,
};
use vrml_field::FieldValue;
use vrml_io::ResourceStream;

pub const ECHO_MEDIA_TYPE: &str = "application/x-vrml-echo";
pub const ECHO_SCHEME: &str = "echo";

#[derive(Debug, Default, PartialEq)]
pub struct EchoProgram {
    prints: Vec<String>,
    forwards: Vec<(String, String)>,
}

impl EchoProgram {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut program = Self::default();
        for (index, line) in source.split(['\n', ';']).enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(text) = line.strip_prefix("print ").or((line == "print").then_some("")) {
                program.prints.push(text.trim().to_string());
                continue;
            }
            let Some((from, to)) = line.split_once("->") else {
                return Err(ScriptError::Engine(format!(
                    "echo line {}: expected `in -> out`, found \"{line}\"",
                    index + 1
                )));
            };
            program
                .forwards
                .push((from.trim().to_string(), to.trim().to_string()));
        }
        Ok(program)
    }

    /// eventOuts an event at `event_in` goes to. `in` may name the eventIn
    /// with or without its `set_` prefix.
    fn targets<'a>(&'a self, event_in: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let bare = event_in.strip_prefix("set_").unwrap_or(event_in);
        self.forwards
            .iter()
            .filter(move |(from, _)| from == event_in || from == bare)
            .map(|(_, to)| to.as_str())
    }
}

pub struct EchoScript {
    program: EchoProgram,
}

impl Script for EchoScript {
    fn initialize(&mut self, ctx: &mut ScriptContext<'_>, _timestamp: f64) -> Result<(), ScriptError> {
        for text in &self.program.prints {
            ctx.print(text);
        }
        Ok(())
    }

    fn process_event(
        &mut self,
        ctx: &mut ScriptContext<'_>,
        event_in: &str,
        value: &FieldValue,
        _timestamp: f64,
    ) -> Result<(), ScriptError> {
        let targets: Vec<String> = self.program.targets(event_in).map(str::to_string).collect();
        if targets.is_empty() {
            log::trace!("echo: nothing listens to {event_in}");
        }
        for target in targets {
            ctx.set_event_out(&target, value.clone())?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct EchoFactory;

impl ScriptFactory for EchoFactory {
    fn create_script(
        &self,
        node: &ScriptNodeInfo,
        mut source: Box<dyn ResourceStream>,
    ) -> Result<Box<dyn Script>, ScriptError> {
        let mut text = String::new();
        source
            .read_to_string(&mut text)
            .map_err(|e| ScriptError::Engine(format!("{}: {e}", source.url())))?;
        let program = EchoProgram::parse(&text)?;
        for (_, to) in &program.forwards {
            if node.interfaces.find_event_out(to).is_none() {
                return Err(ScriptError::NoSuchInterface(to.clone()));
            }
        }
        log::debug!(
            "echo script for node {} with {} forwards",
            node.node,
            program.forwards.len()
        );
        Ok(Box::new(EchoScript { program }))
    }
}

/// Entry point the browser looks up when it loads this module.
#[allow(improper_ctypes_definitions)]
#[unsafe(no_mangle)]
pub extern "C" fn vrml_script_register_factory(registrar: &mut ScriptEngineRegistrar) {
    if let Err(e) = registrar.register_factory(&[ECHO_MEDIA_TYPE], &[ECHO_SCHEME], Arc::new(EchoFactory)) {
        log::error!("echo engine could not register: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use vrml_core::{EventEmitter, Interface, InterfaceSet, NodeContext};
    use vrml_field::FieldType;
    use vrml_ids::NodeID;
    use vrml_io::MemoryStream;

    fn info() -> ScriptNodeInfo {
        ScriptNodeInfo {
            node: NodeID::from_parts(1, 0),
            interfaces: InterfaceSet::from_interfaces([
                Interface::event_in(FieldType::SFFloat, "set_value"),
                Interface::event_out(FieldType::SFFloat, "value_changed"),
            ])
            .unwrap(),
        }
    }

    #[test]
    fn parse_reads_prints_and_forwards() {
        let program = EchoProgram::parse("# demo\nprint hi there\nvalue -> value_changed; a->b").unwrap();
        assert_eq!(program.prints, vec!["hi there"]);
        assert_eq!(
            program.forwards,
            vec![
                ("value".to_string(), "value_changed".to_string()),
                ("a".to_string(), "b".to_string())
            ]
        );
        assert!(EchoProgram::parse("value value_changed").is_err());
    }

    #[test]
    fn forwards_match_with_or_without_set_prefix() {
        let program = EchoProgram::parse("value -> out\nset_other -> out2").unwrap();
        assert_eq!(program.targets("set_value").collect::<Vec<_>>(), vec!["out"]);
        assert_eq!(program.targets("value").collect::<Vec<_>>(), vec!["out"]);
        assert_eq!(program.targets("set_other").collect::<Vec<_>>(), vec!["out2"]);
        assert_eq!(program.targets("other").count(), 0);
    }

    #[test]
    fn factory_rejects_unknown_event_outs() {
        let source = MemoryStream::new("echo:x", "", b"value -> nowhere".to_vec());
        let err = EchoFactory.create_script(&info(), Box::new(source)).err();
        assert_eq!(err, Some(ScriptError::NoSuchInterface("nowhere".into())));
    }

    #[test]
    fn script_echoes_events() {
        let source = MemoryStream::new("echo:x", "", b"value -> value_changed".to_vec());
        let mut script = EchoFactory.create_script(&info(), Box::new(source)).unwrap();

        let mut fields = IndexMap::new();
        let mut event_outs = IndexMap::new();
        event_outs.insert(
            "value_changed".to_string(),
            EventEmitter::of_type(FieldType::SFFloat),
        );
        let mut node = NodeContext::new(NodeID::from_parts(1, 0), None);
        let mut ctx = ScriptContext::new(&mut fields, &mut event_outs, false, &mut node);
        script
            .process_event(&mut ctx, "set_value", &FieldValue::SFFloat(4.5), 1.0)
            .unwrap();
        assert_eq!(ctx.event_out("value"), Some(&FieldValue::SFFloat(4.5)));
        drop(ctx);
        assert!(event_outs["value_changed"].is_pending());
    }

    #[test]
    fn entry_point_claims_media_type_and_scheme() {
        let mut registrar = ScriptEngineRegistrar::default();
        vrml_script_register_factory(&mut registrar);
        assert_eq!(
            registrar.register_factory(&[], &["ECHO"], Arc::new(EchoFactory)),
            Err(ScriptError::AlreadyClaimed("echo".into()))
        );
    }
}
