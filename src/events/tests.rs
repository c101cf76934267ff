//! Tests for routed event registration and routing

use std::sync::{Arc, Mutex};

use super::*;
use crate::control::{Control, ControlType, BUTTON, CONTROL, PANEL};
use crate::Error;

static TAP_CONTROL: ControlType = ControlType::derived("TapControl", &PANEL);
static TAP_BUTTON: ControlType = ControlType::derived("TapButton", &BUTTON);
// Two unrelated types that happen to share a name
static SHARED_NAME_A: ControlType = ControlType::derived("SharedName", &PANEL);
static SHARED_NAME_B: ControlType = ControlType::derived("SharedName", &PANEL);

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Three nested controls: a ⊃ b ⊃ c
fn nested() -> (Control, Control, Control) {
    let a = Control::new(&TAP_CONTROL);
    let b = Control::new(&TAP_CONTROL);
    let c = Control::new(&TAP_CONTROL);
    a.add_child(&b).unwrap();
    b.add_child(&c).unwrap();
    (a, b, c)
}

fn record(control: &Control, event: &RoutedEvent, log: &Log, name: &str, handle: bool) {
    let log = log.clone();
    let name = name.to_string();
    control
        .add_handler::<(), _>(event, move |_, args| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", name, args.handled()));
            if handle {
                args.handle();
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_duplicate_registration_fails() {
    let registry = EventRegistry::new();
    registry
        .register::<()>("Tap", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();

    let duplicate = registry.register::<()>("Tap", &TAP_CONTROL, RoutingStrategy::Bubble);
    assert!(matches!(
        duplicate,
        Err(Error::DuplicateRegistration { ref name, owner: "TapControl" }) if name == "Tap"
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_same_name_on_other_owner_is_distinct() {
    let registry = EventRegistry::new();
    let on_control = registry
        .register::<()>("Tap", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let on_button = registry
        .register::<()>("Tap", &TAP_BUTTON, RoutingStrategy::Bubble)
        .unwrap();

    assert_ne!(on_control, on_button);
    assert_eq!(on_control.qualified_name(), "TapControl.Tap");
    assert_eq!(on_button.qualified_name(), "TapButton.Tap");
}

#[test]
fn test_find_by_name_walks_base_types() {
    let registry = EventRegistry::new();
    let click = registry
        .register::<()>("Press", &BUTTON, RoutingStrategy::Bubble)
        .unwrap();

    assert_eq!(registry.find_by_name("Press", &TAP_BUTTON).unwrap(), click);
    assert!(matches!(
        registry.find_by_name("Press", &CONTROL),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_default_handled_behavior_follows_strategy() {
    let registry = EventRegistry::new();
    let tunnel = registry
        .register::<()>("PreviewPoke", &TAP_CONTROL, RoutingStrategy::Tunnel)
        .unwrap();
    let bubble = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();

    assert_eq!(tunnel.handled_behavior(), HandledBehavior::StopRoute);
    assert_eq!(bubble.handled_behavior(), HandledBehavior::ContinueRoute);
}

#[test]
fn test_tap_bubbles_to_root_and_stays_handled() {
    let registry = EventRegistry::new();
    let tap = registry
        .register::<()>("Tap", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let (a, b, c) = nested();
    for control in [&a, &b, &c] {
        control.attach().unwrap();
    }

    let log = new_log();
    let names = log.clone();
    c.add_handler::<(), _>(&tap, {
        let names = names.clone();
        move |_, args| {
            names.lock().unwrap().push("C".to_string());
            args.handle();
            Ok(())
        }
    })
    .unwrap();
    a.add_handler::<(), _>(&tap, move |_, _| {
        names.lock().unwrap().push("A".to_string());
        Ok(())
    })
    .unwrap();

    let args = c.raise_event(&tap, ()).unwrap();
    assert_eq!(entries(&log), vec!["C", "A"]);
    assert!(args.handled());
    assert_eq!(args.source(), Some(c.id()));
}

#[test]
fn test_bubble_order_and_handled_visibility() {
    let registry = EventRegistry::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let root = Control::new(&TAP_CONTROL);
    let (a, b, c) = nested();
    root.add_child(&a).unwrap();

    let log = new_log();
    record(&c, &poke, &log, "leaf", false);
    record(&b, &poke, &log, "parent", true);
    record(&a, &poke, &log, "grandparent", false);
    record(&root, &poke, &log, "root", false);

    c.raise_event(&poke, ()).unwrap();
    assert_eq!(
        entries(&log),
        vec!["leaf:false", "parent:false", "grandparent:true", "root:true"]
    );
}

#[test]
fn test_tunnel_order_stops_when_handled() {
    let registry = EventRegistry::new();
    let preview = registry
        .register::<()>("PreviewPoke", &TAP_CONTROL, RoutingStrategy::Tunnel)
        .unwrap();
    let root = Control::new(&TAP_CONTROL);
    let (a, b, c) = nested();
    root.add_child(&a).unwrap();

    let log = new_log();
    record(&c, &preview, &log, "leaf", false);
    record(&b, &preview, &log, "parent", false);
    record(&a, &preview, &log, "grandparent", true);
    record(&root, &preview, &log, "root", false);

    let args = c.raise_event(&preview, ()).unwrap();
    assert_eq!(entries(&log), vec!["root:false", "grandparent:false"]);
    assert!(args.handled());
}

#[test]
fn test_tunnel_order_without_handling() {
    let registry = EventRegistry::new();
    let preview = registry
        .register::<()>("PreviewPoke", &TAP_CONTROL, RoutingStrategy::Tunnel)
        .unwrap();
    let (a, b, c) = nested();

    let log = new_log();
    record(&c, &preview, &log, "c", false);
    record(&b, &preview, &log, "b", false);
    record(&a, &preview, &log, "a", false);

    c.raise_event(&preview, ()).unwrap();
    assert_eq!(entries(&log), vec!["a:false", "b:false", "c:false"]);
}

#[test]
fn test_direct_event_only_reaches_source() {
    let registry = EventRegistry::new();
    let ping = registry
        .register::<()>("Ping", &TAP_CONTROL, RoutingStrategy::Direct)
        .unwrap();
    let (a, b, c) = nested();

    let log = new_log();
    record(&a, &ping, &log, "a", false);
    record(&b, &ping, &log, "b", false);
    record(&c, &ping, &log, "c", false);

    b.raise_event(&ping, ()).unwrap();
    assert_eq!(entries(&log), vec!["b:false"]);
}

#[test]
fn test_handlers_at_one_node_run_in_subscription_order() {
    let registry = EventRegistry::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let control = Control::new(&TAP_CONTROL);

    let log = new_log();
    record(&control, &poke, &log, "first", false);
    record(&control, &poke, &log, "second", false);
    record(&control, &poke, &log, "third", false);

    control.raise_event(&poke, ()).unwrap();
    assert_eq!(entries(&log), vec!["first:false", "second:false", "third:false"]);
}

#[test]
fn test_handler_error_aborts_route() {
    let registry = EventRegistry::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let (a, b, c) = nested();

    let log = new_log();
    record(&c, &poke, &log, "c", false);
    b.add_handler::<(), _>(&poke, |_, _| anyhow::bail!("broken handler"))
        .unwrap();
    record(&a, &poke, &log, "a", false);

    let result = c.raise_event(&poke, ());
    match result {
        Err(Error::HandlerFailed { event, source }) => {
            assert_eq!(event, "TapControl.Poke");
            assert_eq!(source.to_string(), "broken handler");
        }
        other => panic!("expected HandlerFailed, got {:?}", other.map(|_| ())),
    }
    assert_eq!(entries(&log), vec!["c:false"]);

    // The tree is intact and the next raise walks the whole route again.
    assert_eq!(c.parent(), Some(b.clone()));
    assert_eq!(b.parent(), Some(a.clone()));
}

#[test]
fn test_handler_may_restructure_tree_during_route() {
    let registry = EventRegistry::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let (a, b, c) = nested();

    let log = new_log();
    let detached = c.clone();
    b.add_handler::<(), _>(&poke, move |sender, _| {
        sender.remove_child(&detached)?;
        Ok(())
    })
    .unwrap();
    record(&a, &poke, &log, "a", false);

    c.raise_event(&poke, ()).unwrap();
    // The route was snapshotted before the handler removed the source.
    assert_eq!(entries(&log), vec!["a:false"]);
    assert!(c.parent().is_none());
}

#[test]
fn test_subscribing_with_wrong_payload_type_fails() {
    let events = standard_events();
    let control = Control::new(&TAP_CONTROL);

    let result = control.add_handler::<String, _>(&events.key_down, |_, _| Ok(()));
    assert!(matches!(result, Err(Error::HandlerTypeMismatch { .. })));
    assert_eq!(control.handler_count(&events.key_down), 0);
}

#[test]
fn test_remove_handler() {
    let registry = EventRegistry::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let control = Control::new(&TAP_CONTROL);
    let log = new_log();
    let sink = log.clone();
    let token = control
        .add_handler::<(), _>(&poke, move |_, _| {
            sink.lock().unwrap().push("ran".to_string());
            Ok(())
        })
        .unwrap();

    assert!(control.remove_handler(token).unwrap());
    assert!(!control.remove_handler(token).unwrap());
    control.raise_event(&poke, ()).unwrap();
    assert!(entries(&log).is_empty());
}

#[test]
fn test_class_handlers_run_after_instance_handlers() {
    let registry = EventRegistry::new();
    let classes = ClassHandlers::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let control = Control::new(&TAP_CONTROL);
    let log = new_log();

    for (class, name) in [(&PANEL, "panel-class"), (&TAP_CONTROL, "tap-class")] {
        let sink = log.clone();
        classes
            .register::<(), _>(class, &poke, false, move |_, _| {
                sink.lock().unwrap().push(name.to_string());
                Ok(())
            })
            .unwrap();
    }
    record(&control, &poke, &log, "instance", false);

    let mut args = RoutedEventArgs::new(poke.clone(), ());
    raise_with(&control, &poke, &mut args, &classes).unwrap();
    assert_eq!(entries(&log), vec!["instance:false", "tap-class", "panel-class"]);
}

#[test]
fn test_class_handlers_skip_handled_unless_asked() {
    let registry = EventRegistry::new();
    let classes = ClassHandlers::new();
    let poke = registry
        .register::<()>("Poke", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let control = Control::new(&TAP_CONTROL);
    let log = new_log();

    for (too, name) in [(false, "default-action"), (true, "diagnostics")] {
        let sink = log.clone();
        classes
            .register::<(), _>(&TAP_CONTROL, &poke, too, move |_, _| {
                sink.lock().unwrap().push(name.to_string());
                Ok(())
            })
            .unwrap();
    }
    record(&control, &poke, &log, "instance", true);

    let mut args = RoutedEventArgs::new(poke.clone(), ());
    raise_with(&control, &poke, &mut args, &classes).unwrap();
    assert_eq!(entries(&log), vec!["instance:false", "diagnostics"]);
}

#[test]
fn test_preview_handled_carries_into_main_event() {
    let events = standard_events();
    let (a, _b, c) = nested();
    let log = new_log();

    let sink = log.clone();
    a.add_handler::<KeyData, _>(&events.preview_key_down, move |_, args| {
        sink.lock().unwrap().push(format!("preview:{}", args.data.key));
        args.handle();
        Ok(())
    })
    .unwrap();
    let sink = log.clone();
    c.add_handler::<KeyData, _>(&events.key_down, move |_, args| {
        sink.lock().unwrap().push(format!("main:{}", args.handled()));
        Ok(())
    })
    .unwrap();

    let mut args = RoutedEventArgs::new(events.preview_key_down.clone(), KeyData::new("Enter"));
    raise_pair(&c, &events.preview_key_down, &events.key_down, &mut args).unwrap();
    assert_eq!(entries(&log), vec!["preview:Enter", "main:true"]);
    assert_eq!(args.routed_event(), &events.key_down);
}

#[test]
fn test_event_route_snapshot() {
    let (a, b, c) = nested();
    let route = EventRoute::build(&c);
    assert_eq!(route.len(), 3);
    assert_eq!(route.source(), &c);
    assert_eq!(route.root(), &a);
    assert_eq!(route.nodes(), &[c.clone(), b.clone(), a.clone()]);
}

#[test]
fn test_global_registry_rejects_built_in_names() {
    let clash = EventRegistry::global().register::<()>("Click", &BUTTON, RoutingStrategy::Bubble);
    assert!(matches!(
        clash,
        Err(Error::DuplicateRegistration { ref name, owner: "Button" }) if name == "Click"
    ));

    let found = EventRegistry::global()
        .find_by_name("Click", &crate::control::CHECK_BOX)
        .unwrap();
    assert_eq!(found, standard_events().click);
}

#[test]
fn test_types_with_same_name_keep_separate_events() {
    assert_ne!(SHARED_NAME_A, SHARED_NAME_B);
    assert!(!SHARED_NAME_A.is_a(&SHARED_NAME_B));
    assert!(SHARED_NAME_A.is_a(&PANEL));

    let registry = EventRegistry::new();
    let on_a = registry
        .register::<()>("Tap", &SHARED_NAME_A, RoutingStrategy::Bubble)
        .unwrap();
    let on_b = registry
        .register::<()>("Tap", &SHARED_NAME_B, RoutingStrategy::Bubble)
        .unwrap();

    assert_ne!(on_a, on_b);
    assert_eq!(registry.find_by_name("Tap", &SHARED_NAME_A).unwrap(), on_a);
    assert_eq!(registry.find_by_name("Tap", &SHARED_NAME_B).unwrap(), on_b);
    assert_eq!(registry.events_of(&SHARED_NAME_A), vec![on_a]);
}

#[test]
fn test_class_handler_is_not_shared_by_type_name() {
    let registry = EventRegistry::new();
    let classes = ClassHandlers::new();
    let poke = registry
        .register::<()>("Poke", &PANEL, RoutingStrategy::Bubble)
        .unwrap();
    let log = new_log();
    let sink = log.clone();
    classes
        .register::<(), _>(&SHARED_NAME_A, &poke, false, move |_, _| {
            sink.lock().unwrap().push("a-class".to_string());
            Ok(())
        })
        .unwrap();

    let other = Control::new(&SHARED_NAME_B);
    let mut args = RoutedEventArgs::new(poke.clone(), ());
    raise_with(&other, &poke, &mut args, &classes).unwrap();
    assert!(entries(&log).is_empty());

    let owner = Control::new(&SHARED_NAME_A);
    let mut args = RoutedEventArgs::new(poke.clone(), ());
    raise_with(&owner, &poke, &mut args, &classes).unwrap();
    assert_eq!(entries(&log), vec!["a-class"]);
}

#[test]
fn test_events_of_lists_only_direct_owner_in_registration_order() {
    let registry = EventRegistry::new();
    let first = registry
        .register::<()>("First", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let second = registry
        .register::<()>("Second", &TAP_CONTROL, RoutingStrategy::Direct)
        .unwrap();
    registry
        .register::<()>("Elsewhere", &PANEL, RoutingStrategy::Bubble)
        .unwrap();

    assert_eq!(registry.events_of(&TAP_CONTROL), vec![first, second]);
    assert!(registry.events_of(&TAP_BUTTON).is_empty());
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_into_data_returns_payload_after_routing() {
    let registry = EventRegistry::new();
    let edit = registry
        .register::<TextChangedData>("Edit", &TAP_CONTROL, RoutingStrategy::Bubble)
        .unwrap();
    let control = Control::new(&TAP_CONTROL);
    control
        .add_handler::<TextChangedData, _>(&edit, |_, args| {
            args.data.new_text.push('!');
            Ok(())
        })
        .unwrap();

    let args = control
        .raise_event(
            &edit,
            TextChangedData {
                old_text: String::new(),
                new_text: "hi".to_string(),
            },
        )
        .unwrap();
    assert_eq!(args.into_data().new_text, "hi!");
}
