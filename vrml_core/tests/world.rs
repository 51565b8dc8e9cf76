mod common;

use common::{Harness, TEST_MEDIA_TYPE};
use std::sync::{Arc, Mutex};
use vrml_core::{
    Bindable, Browser, BrowserConfig, BrowserEvent, BrowserListener, Lifecycle, NodeError, Scene,
    SceneError,
};
use vrml_field::FieldValue;
use vrml_io::{MemoryStream, ResourceStream, StreamListener};

const WORLD: &str = "\
META title Boxes
DEF B Box | size 1 1 1
DEF S Shape | geometry B
DEF T Transform | translation 1 2 3 | children S
DEF CAM Viewpoint | position 0 1 5
DEF FAR Viewpoint | position 0 0 50
PointLight
";

const ANIMATION: &str = "\
DEF TS TimeSensor | cycleInterval 10 | loop TRUE
DEF SI ScalarInterpolator | key [0 1] | keyValue [0 100]
ROUTE TS.fraction_changed TO SI.set_fraction
";

#[test]
fn loading_a_world_binds_its_first_viewpoint() {
    let h = Harness::new();
    h.add("http://test/world.wrl", WORLD);
    h.load("http://test/world.wrl");

    assert_eq!(h.browser.world_url(), "http://test/world.wrl");
    let scene = h.browser.scene().unwrap();
    assert_eq!(scene.meta("title"), Ok("Boxes".to_string()));
    assert!(matches!(scene.meta("author"), Err(SceneError::NoSuchMetadata(_))));

    // B and S hang off T, so they are not roots.
    assert_eq!(h.browser.root_nodes().len(), 4);
    assert_eq!(h.node("B").lifecycle(), Lifecycle::Initialized);

    let cam = h.node("CAM");
    assert_eq!(h.browser.active_viewpoint(), Some(cam.id()));
    assert_eq!(cam.event_out_value("isBound").unwrap(), FieldValue::SFBool(true));
    assert_eq!(h.browser.viewpoints().len(), 2);
    assert_eq!(h.browser.scoped_lights().len(), 1);
    assert!(h.err.contents().is_empty(), "{}", h.err.contents());
}

#[test]
fn render_draws_from_the_bound_viewpoint() {
    let h = Harness::new();
    h.add("http://test/world.wrl", WORLD);
    h.load("http://test/world.wrl");

    assert!(h.browser.is_modified());
    h.browser.render();
    assert!(!h.browser.is_modified());
    assert_eq!(
        h.viewer.calls(),
        vec![
            "begin_frame",
            "viewpoint 0 1 5 fov 0.785398",
            "light point",
            "push 1 2 3",
            "box 1 1 1",
            "pop",
            "end_frame",
        ]
    );
}

#[test]
fn empty_browser_renders_from_the_default_viewpoint() {
    let h = Harness::new();
    assert!(h.browser.scene().is_none());
    assert!(h.browser.default_viewpoint().is_some());
    h.browser.render();
    assert_eq!(
        h.viewer.calls(),
        vec!["begin_frame", "viewpoint 0 0 10 fov 0.785398", "end_frame"]
    );
}

#[test]
fn binding_another_viewpoint_unbinds_the_first() {
    let h = Harness::new();
    h.add("http://test/world.wrl", WORLD);
    h.load("http://test/world.wrl");
    let cam = h.node("CAM");
    let far = h.node("FAR");

    let scene = h.browser.scene().unwrap();
    scene.load_url(&["#FAR".to_string()], &[]).unwrap();
    assert_eq!(h.browser.bound(Bindable::Viewpoint), Some(far.id()));
    assert_eq!(far.event_out_value("isBound").unwrap(), FieldValue::SFBool(true));
    assert_eq!(cam.event_out_value("isBound").unwrap(), FieldValue::SFBool(false));

    scene.load_url(&["#NOWHERE".to_string()], &[]).unwrap();
    assert!(h.err.contents().contains("#NOWHERE"));
    assert_eq!(
        h.browser.bind_viewpoint(h.node("T").id()),
        Err(NodeError::UnsupportedInterface {
            node_type: "Transform".to_string(),
            kind: vrml_core::InterfaceKind::EventIn,
            id: "set_bind".to_string(),
        })
    );
}

#[test]
fn update_drives_time_sensors_through_routes() {
    let h = Harness::new();
    h.add("http://test/anim.wrl", ANIMATION);
    h.load("http://test/anim.wrl");
    h.browser.render();

    assert!(h.browser.update(5.0));
    let si = h.node("SI");
    assert_eq!(si.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(50.0));

    h.browser.update(7.5);
    assert_eq!(si.event_out_value("value").unwrap(), FieldValue::SFFloat(75.0));
    assert_eq!(h.browser.current_time(), 7.5);
    assert!((h.browser.frame_rate() - 0.4).abs() < 1e-9);
}

#[test]
fn queued_events_wait_until_due() {
    let h = Harness::new();
    h.add("http://test/anim.wrl", ANIMATION);
    h.load("http://test/anim.wrl");
    let si = h.node("SI");
    h.browser
        .graph()
        .delete_route(h.node("TS").id(), "fraction_changed", si.id(), "set_fraction")
        .unwrap();

    h.browser
        .queue_event(20.0, FieldValue::SFFloat(0.25), si.id(), "set_fraction");
    assert!(h.browser.events_pending());

    h.browser.update(15.0);
    assert_eq!(h.browser.queued_events(), 1);

    h.browser.update(20.0);
    assert_eq!(h.browser.queued_events(), 0);
    assert_eq!(si.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(25.0));
}

#[test]
fn full_event_queue_drops_the_oldest() {
    let mut config = BrowserConfig::default();
    config.browser.max_queued_events = 2;
    let h = Harness::with_config(config);
    h.add("http://test/anim.wrl", ANIMATION);
    h.load("http://test/anim.wrl");
    let si = h.node("SI");

    for fraction in [0.25, 0.5, 0.75] {
        h.browser
            .queue_event(0.0, FieldValue::SFFloat(fraction), si.id(), "set_fraction");
    }
    assert_eq!(h.browser.queued_events(), 2);

    h.browser.flush_events();
    assert!(!h.browser.events_pending());
    assert_eq!(si.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(75.0));
}

#[test]
fn failed_load_keeps_the_current_world() {
    let h = Harness::new();
    h.add("http://test/world.wrl", WORLD);
    h.load("http://test/world.wrl");

    h.load("http://test/missing.wrl");
    assert_eq!(h.browser.world_url(), "http://test/world.wrl");
    let err = h.err.contents();
    assert!(err.contains("http://test/missing.wrl: no such resource"), "{err}");
    assert!(err.contains("no alternative URL could be opened"), "{err}");
}

#[test]
fn unparseable_world_is_reported_with_its_location() {
    let h = Harness::new();
    h.add("http://test/bad.wrl", "Transform\nDEF X Teapot\n");
    h.load("http://test/bad.wrl");
    assert!(h.browser.scene().is_none());
    assert!(h.err.contents().contains("no node class \"Teapot\""), "{}", h.err.contents());

    h.add("http://test/route.wrl", "ROUTE A.x\n");
    h.load("http://test/route.wrl");
    assert!(h.err.contents().contains("http://test/route.wrl:1:1"));
}

#[derive(Default)]
struct Events(Mutex<Vec<BrowserEvent>>);

impl BrowserListener for Events {
    fn browser_changed(&self, _browser: &Browser, event: BrowserEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[test]
fn replacing_the_world_shuts_down_the_old_one() {
    let h = Harness::new();
    let events = Arc::new(Events::default());
    let listener: Arc<dyn BrowserListener> = events.clone();
    assert!(h.browser.add_listener(Arc::clone(&listener)));
    assert!(!h.browser.add_listener(Arc::clone(&listener)));

    h.add("http://test/world.wrl", WORLD);
    h.add("http://test/anim.wrl", ANIMATION);
    h.load("http://test/world.wrl");
    let old = h.node("T");
    let old_b = h.node("B");
    h.load("http://test/anim.wrl");

    assert_eq!(old.lifecycle(), Lifecycle::ShutDown);
    assert!(!h.browser.graph().contains(old.id()));
    assert!(!h.browser.graph().contains(old_b.id()));
    assert!(h.browser.viewpoints().is_empty());
    assert_eq!(h.browser.active_viewpoint(), None);
    assert_eq!(h.browser.timers().len(), 1);
    assert_eq!(
        *events.0.lock().unwrap(),
        vec![
            BrowserEvent::Initialized,
            BrowserEvent::Shutdown,
            BrowserEvent::Initialized
        ]
    );

    assert!(h.browser.remove_listener(&listener));
    h.browser.replace_world(Vec::new()).unwrap();
    assert_eq!(events.0.lock().unwrap().len(), 3);
    assert_eq!(h.browser.world_url(), "http://test/anim.wrl");
    assert!(h.browser.timers().is_empty());
}

#[test]
fn fragments_arrive_at_an_mfnode_event_in() {
    let h = Harness::new();
    h.add("http://test/dir/world.wrl", "DEF G Group\nDEF SI ScalarInterpolator\n");
    h.add("http://test/dir/part.wrl", "Transform\nDEF P Transform | translation 0 1 0\n");
    h.load("http://test/dir/world.wrl");
    let group = h.node("G");

    h.browser
        .create_vrml_from_url(vec!["part.wrl".to_string()], group.id(), "addChildren")
        .unwrap();
    h.browser.wait_for_loads();

    let children = group.field_value("children").unwrap();
    let ids = children.as_nodes().unwrap().to_vec();
    assert_eq!(ids.len(), 2);
    for id in ids {
        let child = h.browser.graph().get(id).unwrap();
        assert_eq!(child.lifecycle(), Lifecycle::Initialized);
    }

    assert_eq!(
        h.browser
            .create_vrml_from_url(vec!["part.wrl".to_string()], h.node("SI").id(), "set_fraction")
            .unwrap_err(),
        SceneError::Node(NodeError::FieldTypeMismatch {
            expected: vrml_field::FieldType::MFNode,
            found: vrml_field::FieldType::SFFloat,
        })
    );
}

#[test]
fn fragments_from_a_stream_stay_uninitialized_until_used() {
    let h = Harness::new();
    h.add("http://test/world.wrl", WORLD);
    h.load("http://test/world.wrl");

    let stream = MemoryStream::new(
        "http://test/inline.wrl",
        TEST_MEDIA_TYPE,
        b"DEF X Transform\n".to_vec(),
    );
    let nodes = h.browser.create_vrml_from_stream(Box::new(stream)).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].lifecycle(), Lifecycle::Uninitialized);

    h.browser.collect_garbage();
    assert!(h.browser.graph().contains(nodes[0].id()));

    let id = nodes[0].id();
    drop(nodes);
    assert!(h.browser.collect_garbage().contains(&id));
    assert!(!h.browser.graph().contains(id));

    let bad = MemoryStream::new("http://test/blob", "application/octet-stream", Vec::new());
    assert_eq!(
        h.browser.create_vrml_from_stream(Box::new(bad)).unwrap_err(),
        SceneError::BadMediaType("application/octet-stream".to_string())
    );
}

#[test]
fn get_resource_skips_unreachable_urls() {
    let h = Harness::new();
    h.add("http://test/dir/world.wrl", "Group\n");
    h.add("http://test/dir/good.wrl", "Group\n");
    h.load("http://test/dir/world.wrl");
    let scene = h.browser.scene().unwrap();

    let stream = scene
        .get_resource(&["missing.wrl".to_string(), "good.wrl#view".to_string()])
        .unwrap();
    assert_eq!(stream.url(), "http://test/dir/good.wrl");
    assert_eq!(
        h.err.lines(),
        vec!["http://test/dir/missing.wrl: no such resource"]
    );

    let child = scene.new_child();
    child.set_url("sub/inner.wrl");
    assert_eq!(child.url(), "http://test/dir/sub/inner.wrl");
}

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<(String, Vec<u8>)>>);

impl StreamListener for Collect {
    fn stream_available(&mut self, url: &str, _media_type: &str) {
        self.0.lock().unwrap().0 = url.to_string();
    }

    fn data_available(&mut self, data: &[u8]) {
        self.0.lock().unwrap().1.extend_from_slice(data);
    }
}

#[test]
fn streams_are_read_concurrently_in_chunks() {
    let mut config = BrowserConfig::default();
    config.browser.read_chunk_size = 3;
    let h = Harness::with_config(config);
    let scene = h.browser.new_scene();

    let listeners: Vec<Collect> = (0..4).map(|_| Collect::default()).collect();
    for (i, listener) in listeners.iter().enumerate() {
        let url = format!("http://test/{i}.txt");
        let data = format!("payload number {i}").into_bytes();
        let stream = MemoryStream::new(url, "text/plain", data);
        scene
            .read_stream(Box::new(stream), Box::new(listener.clone()))
            .unwrap();
    }
    scene.wait_for_workers();

    for (i, listener) in listeners.iter().enumerate() {
        let (url, data) = listener.0.lock().unwrap().clone();
        assert_eq!(url, format!("http://test/{i}.txt"));
        assert_eq!(String::from_utf8(data).unwrap(), format!("payload number {i}"));
    }
}

#[test]
fn event_outs_written_from_outside_reach_routed_nodes_on_update() {
    let h = Harness::new();
    h.add(
        "http://test/pair.wrl",
        "\
DEF A ScalarInterpolator | key [0 1] | keyValue [0 1]
DEF B ScalarInterpolator | key [0 1] | keyValue [0 100]
ROUTE A.value_changed TO B.set_fraction
",
    );
    h.load("http://test/pair.wrl");
    let a = h.node("A");
    let b = h.node("B");

    a.set_event_out("value_changed", &FieldValue::SFFloat(0.25)).unwrap();
    assert_eq!(b.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(0.0));
    h.browser.update(1.0);
    assert_eq!(b.event_out_value("value_changed").unwrap(), FieldValue::SFFloat(25.0));
}

#[test]
fn child_scene_urls_resolve_against_the_parent() {
    let h = Harness::new();
    h.add("http://h/x/b.wrl", "Group\n");
    let scene = Scene::new(&h.browser, None);
    scene.set_url("http://h/x/y.wrl");
    let child = scene.new_child();
    child.set_url("a.wrl");
    assert_eq!(child.url(), "http://h/x/a.wrl");

    let stream = child.get_resource(&["b.wrl".to_string()]).unwrap();
    assert_eq!(stream.url(), "http://h/x/b.wrl");
}

#[test]
fn inline_shows_the_world_its_url_names() {
    let h = Harness::new();
    h.add("http://test/world.wrl", "DEF I Inline | url [ \"parts/part.wrl\" ]\n");
    h.add("http://test/parts/part.wrl", "DEF B Box | size 1 2 3\nShape | geometry B\n");
    h.add("http://test/parts/other.wrl", "DEF B Box | size 4 4 4\nShape | geometry B\n");
    h.load("http://test/world.wrl");

    let inline = h.node("I");
    let children = inline.referenced_nodes();
    assert_eq!(children.len(), 1);
    let shape = h.browser.graph().get(children[0]).unwrap();
    assert_eq!(shape.type_id(), "Shape");
    assert_eq!(shape.lifecycle(), Lifecycle::Initialized);
    assert_eq!(shape.scene().unwrap().url(), "http://test/parts/part.wrl");
    assert!(!h.browser.collect_garbage().contains(&shape.id()));

    h.browser.render();
    assert!(h.viewer.calls().contains(&"box 1 2 3".to_string()), "{:?}", h.viewer.calls());

    h.browser
        .graph()
        .deliver(
            inline.id(),
            "set_url",
            &FieldValue::MFString(vec!["parts/other.wrl".to_string()]),
            1.0,
        )
        .unwrap();
    h.browser.wait_for_loads();
    assert_eq!(shape.lifecycle(), Lifecycle::ShutDown);
    let children = inline.referenced_nodes();
    assert_eq!(children.len(), 1);
    assert_ne!(children[0], shape.id());

    h.browser.render();
    assert!(h.viewer.calls().contains(&"box 4 4 4".to_string()), "{:?}", h.viewer.calls());
    assert!(h.err.contents().is_empty(), "{}", h.err.contents());
}
