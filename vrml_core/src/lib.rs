mod node_arena;
mod sync;

pub mod browser;
pub use browser::*;

pub mod capability;
pub use capability::*;

pub mod config;
pub use config::*;

pub mod dispatch;
pub use dispatch::*;

pub mod error;
pub use error::*;

pub mod event;
pub use event::*;

pub mod graph;
pub use graph::*;

pub mod interface;
pub use interface::*;

pub mod node;
pub use node::*;

pub mod node_type;
pub use node_type::*;

pub mod nodes;

pub mod parser;
pub use parser::*;

pub mod scene;
pub use scene::*;

pub mod scope;
pub use scope::*;

pub mod script;
pub use script::*;

pub mod table_node;
pub use table_node::*;

pub mod viewer;
pub use viewer::*;

pub mod worker;
pub use worker::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ScalarInterpolator, TimeSensor, Transform};
    use std::sync::Arc;
    use vrml_field::{FieldType, FieldValue, Vec3f};
    use vrml_ids::NodeID;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn scalar_node(graph: &Arc<NodeGraph>, key_value: Vec<f32>) -> Arc<Node> {
        let class = StandardNodeClass::<ScalarInterpolator>::new(graph).unwrap();
        let mut values = InitialValues::new();
        values.insert("key".into(), FieldValue::MFFloat(vec![0.0, 1.0]));
        values.insert("keyValue".into(), FieldValue::MFFloat(key_value));
        class
            .default_type()
            .unwrap()
            .create_node(None, &values)
            .unwrap()
    }

    #[test]
    fn exposed_field_answers_to_all_three_names() {
        let set = InterfaceSet::from_interfaces([
            Interface::exposed_field(FieldType::SFVec3f, "translation"),
            Interface::event_in(FieldType::MFNode, "addChildren"),
        ])
        .unwrap();

        for name in ["translation", "set_translation"] {
            assert_eq!(set.find_event_in(name).map(|i| i.id.as_str()), Some("translation"));
        }
        for name in ["translation", "translation_changed"] {
            assert_eq!(set.find_event_out(name).map(|i| i.id.as_str()), Some("translation"));
        }
        assert!(set.find_field("set_translation").is_none());
        assert!(set.find_event_out("addChildren").is_none());
    }

    #[test]
    fn conflicting_synonyms_are_rejected() {
        let mut set = InterfaceSet::new();
        set.add(Interface::exposed_field(FieldType::SFFloat, "speed"))
            .unwrap();
        assert_eq!(
            set.add(Interface::event_in(FieldType::SFFloat, "set_speed")),
            Err(InterfaceError::Duplicate("set_speed".into()))
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn interface_kind_parses_both_spellings() {
        assert_eq!("exposedField".parse::<InterfaceKind>(), Ok(InterfaceKind::ExposedField));
        assert_eq!("inputOutput".parse::<InterfaceKind>(), Ok(InterfaceKind::ExposedField));
        assert!("private".parse::<InterfaceKind>().is_err());
    }

    #[test]
    fn route_carries_values_between_nodes() {
        init_logging();
        let graph = NodeGraph::new();
        let a = scalar_node(&graph, vec![0.0, 1.0]);
        let b = scalar_node(&graph, vec![0.0, 10.0]);

        graph
            .add_route(a.id(), "value_changed", b.id(), "set_fraction")
            .unwrap();
        graph
            .deliver(a.id(), "set_fraction", &FieldValue::SFFloat(0.25), 1.0)
            .unwrap();
        graph.flush_pending(1.0);

        assert_eq!(b.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(2.5));
    }

    #[test]
    fn deleted_route_stops_delivery() {
        let graph = NodeGraph::new();
        let a = scalar_node(&graph, vec![0.0, 1.0]);
        let b = scalar_node(&graph, vec![0.0, 10.0]);
        graph
            .add_route(a.id(), "value_changed", b.id(), "set_fraction")
            .unwrap();
        graph
            .delete_route(a.id(), "value_changed", b.id(), "set_fraction")
            .unwrap();
        assert!(a.routes().is_empty());

        graph
            .deliver(a.id(), "set_fraction", &FieldValue::SFFloat(0.5), 1.0)
            .unwrap();
        graph.flush_pending(1.0);
        assert_eq!(b.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(0.0));

        // Never added, but both ends resolve.
        graph
            .delete_route(a.id(), "value_changed", b.id(), "set_fraction")
            .unwrap();
        assert!(matches!(
            graph.delete_route(a.id(), "no_such_out", b.id(), "set_fraction"),
            Err(NodeError::UnsupportedInterface { .. })
        ));
    }

    #[test]
    fn route_type_mismatch_is_rejected() {
        let graph = NodeGraph::new();
        let a = scalar_node(&graph, vec![0.0, 1.0]);
        let sensor = StandardNodeClass::<TimeSensor>::new(&graph)
            .unwrap()
            .default_type()
            .unwrap()
            .create_node(None, &InitialValues::new())
            .unwrap();

        assert_eq!(
            graph.add_route(a.id(), "value_changed", sensor.id(), "set_enabled"),
            Err(NodeError::FieldTypeMismatch {
                expected: FieldType::SFBool,
                found: FieldType::SFFloat,
            })
        );
        assert!(matches!(
            graph.add_route(a.id(), "value_changed", NodeID::from_parts(99, 0), "set_fraction"),
            Err(NodeError::NoSuchNode(_))
        ));
    }

    #[test]
    fn cyclic_routes_settle_within_one_timestamp() {
        let graph = NodeGraph::new();
        let a = scalar_node(&graph, vec![0.0, 1.0]);
        let b = scalar_node(&graph, vec![0.0, 1.0]);
        graph
            .add_route(a.id(), "value_changed", b.id(), "set_fraction")
            .unwrap();
        graph
            .add_route(b.id(), "value_changed", a.id(), "set_fraction")
            .unwrap();

        graph
            .deliver(a.id(), "set_fraction", &FieldValue::SFFloat(0.5), 2.0)
            .unwrap();
        graph.flush_pending(2.0);
        assert!(!graph.has_pending());
        assert_eq!(b.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(0.5));
    }

    #[test]
    fn types_only_expose_what_the_class_has() {
        let graph = NodeGraph::new();
        let class = StandardNodeClass::<Transform>::new(&graph).unwrap();
        let subset = InterfaceSet::from_interfaces([Interface::exposed_field(
            FieldType::SFVec3f,
            "translation",
        )])
        .unwrap();

        let narrow = class.create_type("Mover", &subset).unwrap();
        assert_eq!(narrow.class_id(), "Transform");
        assert_eq!(narrow.id(), "Mover");
        assert!(Arc::ptr_eq(&narrow, &class.create_type("Mover", &subset).unwrap()));

        let bogus = InterfaceSet::from_interfaces([Interface::field(FieldType::SFBool, "wobble")])
            .unwrap();
        assert!(matches!(
            class.create_type("Wobbly", &bogus),
            Err(NodeError::UnsupportedInterface { .. })
        ));
    }

    #[test]
    fn rejected_initial_values_release_the_node() {
        let graph = NodeGraph::new();
        let node_type = StandardNodeClass::<Transform>::new(&graph)
            .unwrap()
            .default_type()
            .unwrap();
        let mut values = InitialValues::new();
        values.insert(
            "translation".into(),
            FieldValue::SFVec3f(Vec3f::new(1.0, 2.0, 3.0)),
        );
        values.insert("scale".into(), FieldValue::SFBool(true));

        for _ in 0..100 {
            let err = node_type.create_node(None, &values).unwrap_err();
            assert!(matches!(err, NodeError::FieldTypeMismatch { .. }));
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn equal_initial_values_give_distinct_equal_nodes() {
        let graph = NodeGraph::new();
        let node_type = StandardNodeClass::<Transform>::new(&graph)
            .unwrap()
            .default_type()
            .unwrap();
        let mut values = InitialValues::new();
        values.insert(
            "translation".into(),
            FieldValue::SFVec3f(Vec3f::new(1.0, 2.0, 3.0)),
        );

        let first = node_type.create_node(None, &values).unwrap();
        let second = node_type.create_node(None, &values).unwrap();
        assert_ne!(first.id(), second.id());
        assert!(Arc::ptr_eq(first.node_type(), second.node_type()));
        for field in ["translation", "scale", "rotation", "children"] {
            assert_eq!(first.field_value(field).unwrap(), second.field_value(field).unwrap());
        }

        first
            .assign_field("translation", &FieldValue::SFVec3f(Vec3f::new(0.5, 0.5, 0.5)))
            .unwrap();
        assert_eq!(
            second.field_value("translation").unwrap(),
            FieldValue::SFVec3f(Vec3f::new(1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn garbage_collection_keeps_held_uninitialized_nodes() {
        let graph = NodeGraph::new();
        let class = StandardNodeClass::<Transform>::new(&graph).unwrap();
        let node_type = class.default_type().unwrap();
        let child = node_type.create_node(None, &InitialValues::new()).unwrap();
        let mut values = InitialValues::new();
        values.insert("children".into(), FieldValue::MFNode(vec![child.id()]));
        let parent = node_type.create_node(None, &values).unwrap();
        let dropped = node_type.create_node(None, &InitialValues::new()).unwrap();
        let (child_id, dropped_id) = (child.id(), dropped.id());
        drop(child);
        drop(dropped);

        assert_eq!(graph.collect_garbage(Vec::<NodeID>::new(), 1.0), vec![dropped_id]);
        assert!(graph.contains(child_id));
        assert_eq!(graph.len(), 2);

        drop(parent);
        let removed = graph.collect_garbage(Vec::<NodeID>::new(), 2.0);
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&child_id));
        assert!(graph.is_empty());
    }

    #[test]
    fn config_keys_are_optional() {
        let config = BrowserConfig::from_toml_str("[browser]\nframe_rate = 30.0\n").unwrap();
        assert_eq!(config.browser.frame_rate, 30.0);
        assert_eq!(config.browser.name, DEFAULT_BROWSER_NAME);
        assert!(config.scripts.discover);
        assert!(matches!(
            BrowserConfig::from_toml_str("[browser]\nframe_rate = \"fast\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn scopes_fall_back_to_parent() {
        let outer = Scope::new("world.wrl", None);
        let inner = Scope::new("proto", Some(Arc::clone(&outer)));
        let id = NodeID::from_parts(3, 0);
        outer.define("CAMERA", id);
        assert_eq!(inner.find_node("CAMERA"), Some(id));
        assert_eq!(outer.find_node("MISSING"), None);
    }
}
