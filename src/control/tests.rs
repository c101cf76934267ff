//! Tests for the control tree and handler lifecycle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::*;
use crate::events::{standard_events, ChildData};
use crate::handler::HandlerState;
use crate::platform::{self, SoftwareWindowSystem};

static CANVAS: ControlType = ControlType::derived_with_kind("TestCanvas", &CONTROL, ControlKind::Generic);

/// Tests may share a thread when the harness runs single-threaded
fn use_headless() {
    Dispatcher::current()
        .set_platform(platform::headless::platform())
        .unwrap();
}

fn use_software() -> Arc<SoftwareWindowSystem> {
    let system = SoftwareWindowSystem::new();
    Dispatcher::current().set_platform(system.platform()).unwrap();
    system
}

fn count_event(control: &Control, event: &crate::events::RoutedEvent) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    control
        .add_handler::<(), _>(event, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    count
}

#[test]
fn test_lifecycle_states() {
    use_headless();
    let button = Control::button("OK");
    assert_eq!(button.handler_state(), HandlerState::Unattached);

    button.create_handler().unwrap();
    assert_eq!(button.handler_state(), HandlerState::HandlerCreated);

    button.attach().unwrap();
    assert_eq!(button.handler_state(), HandlerState::Attached);
    assert_eq!(button.backend_name(), Some("headless"));

    button.detach().unwrap();
    assert_eq!(button.handler_state(), HandlerState::Detached);

    button.dispose().unwrap();
    assert_eq!(button.handler_state(), HandlerState::Disposed);
}

#[test]
fn test_attach_and_detach_are_idempotent() {
    use_headless();
    let events = standard_events();
    let panel = Control::panel();
    let created = count_event(&panel, &events.handle_created);
    let destroyed = count_event(&panel, &events.handle_destroyed);

    panel.attach().unwrap();
    panel.attach().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);

    panel.detach().unwrap();
    panel.detach().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(panel.handler_state(), HandlerState::Detached);
}

#[test]
fn test_detached_control_can_attach_again() {
    use_headless();
    let label = Control::label("again");
    label.attach().unwrap();
    label.detach().unwrap();
    label.attach().unwrap();

    assert!(label.is_attached());
    assert_eq!(label.with_text_handler(|t| t.text()).unwrap(), "again");
}

#[test]
fn test_properties_pushed_on_attach() {
    let system = use_software();
    let text_box = Control::text_box();
    text_box.set_text("hello").unwrap();
    text_box.set_bounds(Rect::new(1.0, 2.0, 30.0, 40.0)).unwrap();
    text_box.set_enabled(false).unwrap();

    text_box.attach().unwrap();
    let handle = text_box.native_handle().unwrap();
    let widget = system.widget(handle).unwrap();
    assert_eq!(widget.text, "hello");
    assert_eq!(widget.bounds, Rect::new(1.0, 2.0, 30.0, 40.0));
    assert!(!widget.enabled);
    assert!(widget.subscribed);

    text_box.detach().unwrap();
    assert!(system.widget(handle).is_none());
    assert!(system.violations().is_empty());
    use_headless();
}

#[test]
fn test_property_changes_reach_attached_handler() {
    let system = use_software();
    let label = Control::label("before");
    label.attach().unwrap();
    let handle = label.native_handle().unwrap();

    label.set_text("after").unwrap();
    label.set_visible(false).unwrap();
    let widget = system.widget(handle).unwrap();
    assert_eq!(widget.text, "after");
    assert!(!widget.visible);

    label.dispose().unwrap();
    use_headless();
}

#[test]
fn test_capabilities_are_isolated_per_kind() {
    use_headless();
    let label = Control::label("static");
    assert_eq!(label.with_text_handler(|t| t.text()).unwrap(), "static");
    assert!(matches!(
        label.with_focus_handler(|f| f.has_focus()),
        Err(Error::CapabilityNotSupported {
            capability: "focus",
            ..
        })
    ));
    assert!(matches!(
        label.with_scroll_handler(|s| s.scroll_position()),
        Err(Error::CapabilityNotSupported { .. })
    ));

    let list = Control::new(&LIST_VIEW);
    list.with_scroll_handler(|s| s.set_extent(100.0, 100.0)).unwrap();
    assert!(list.with_text_handler(|t| t.text()).is_err());
}

#[test]
fn test_disposed_control_rejects_operations() {
    use_headless();
    let button = Control::button("gone");
    button.attach().unwrap();
    button.dispose().unwrap();

    assert!(button.is_disposed());
    assert!(matches!(button.set_text("x"), Err(Error::ObjectDisposed(_))));
    assert!(matches!(
        button.with_text_handler(|t| t.text()),
        Err(Error::ObjectDisposed(_))
    ));
    // Reads still work on a disposed control.
    assert_eq!(button.text(), "gone");
    // A second dispose is a no-op.
    assert!(button.dispose().is_ok());
}

#[test]
fn test_text_changed_reports_old_and_new() {
    use_headless();
    let events = standard_events();
    let text_box = Control::text_box();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    text_box
        .add_handler::<crate::events::TextChangedData, _>(&events.text_changed, move |_, args| {
            log.lock()
                .unwrap()
                .push((args.data.old_text.clone(), args.data.new_text.clone()));
            Ok(())
        })
        .unwrap();

    text_box.set_text("a").unwrap();
    text_box.set_text("a").unwrap();
    text_box.set_text("b").unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (String::new(), "a".to_string()),
            ("a".to_string(), "b".to_string())
        ]
    );
}

#[test]
fn test_mutation_from_other_thread_fails() {
    use_headless();
    let label = Control::label("owned");

    let moved = label.clone();
    let (set_result, read) = thread::spawn(move || (moved.set_text("stolen"), moved.text()))
        .join()
        .unwrap();

    assert!(matches!(set_result, Err(Error::WrongThread)));
    assert_eq!(read, "owned");
    assert_eq!(label.text(), "owned");
}

#[test]
fn test_tree_rejects_cycles() {
    use_headless();
    let a = Control::panel();
    let b = Control::panel();
    let c = Control::panel();
    a.add_child(&b).unwrap();
    b.add_child(&c).unwrap();

    assert!(matches!(c.add_child(&a), Err(Error::InvalidRelationship(_))));
    assert!(matches!(a.add_child(&a), Err(Error::InvalidRelationship(_))));
    assert_eq!(c.root(), a);
    assert_eq!(c.ancestors(), vec![b.clone(), a.clone()]);
    assert!(a.is_ancestor_of(&c));
    assert!(!c.is_ancestor_of(&a));
}

#[test]
fn test_add_child_reparents() {
    use_headless();
    let first = Control::panel();
    let second = Control::panel();
    let child = Control::label("moving");

    first.add_child(&child).unwrap();
    second.add_child(&child).unwrap();

    assert_eq!(first.child_count(), 0);
    assert_eq!(second.children(), vec![child.clone()]);
    assert_eq!(child.parent(), Some(second));
}

#[test]
fn test_insert_child_clamps_index_and_raises_notification() {
    use_headless();
    let events = standard_events();
    let parent = Control::panel();
    let a = Control::label("a");
    let b = Control::label("b");
    let c = Control::label("c");

    let indices = Arc::new(Mutex::new(Vec::new()));
    let log = indices.clone();
    parent
        .add_handler::<ChildData, _>(&events.child_inserted, move |_, args| {
            log.lock().unwrap().push(args.data.index);
            Ok(())
        })
        .unwrap();

    parent.add_child(&a).unwrap();
    parent.insert_child(99, &b).unwrap();
    parent.insert_child(0, &c).unwrap();

    assert_eq!(parent.children(), vec![c, a, b]);
    assert_eq!(*indices.lock().unwrap(), vec![0, 1, 0]);
}

#[test]
fn test_children_follow_parent_attachment() {
    use_headless();
    let window = Control::window("w");
    window.attach().unwrap();

    let child = Control::button("late");
    window.add_child(&child).unwrap();
    assert!(child.is_attached());

    assert!(window.remove_child(&child).unwrap());
    assert_eq!(child.handler_state(), HandlerState::Detached);
    assert!(child.parent().is_none());
    assert!(!window.remove_child(&child).unwrap());
}

#[test]
fn test_failing_child_does_not_block_siblings() {
    let system = use_software();
    system.set_creation_fails(ControlKind::Button, true);

    let window = Control::window("main");
    let broken = Control::button("broken");
    let label = Control::label("fine");
    window.add_child(&broken).unwrap();
    window.add_child(&label).unwrap();

    window.attach_tree().unwrap();
    assert!(window.is_attached());
    assert!(label.is_attached());
    assert_eq!(broken.handler_state(), HandlerState::Unattached);

    // The failure is reported to a direct caller.
    assert!(matches!(
        broken.attach(),
        Err(Error::HandlerCreationFailed { kind: "Button", .. })
    ));

    // Once the window system recovers the control attaches normally.
    system.set_creation_fails(ControlKind::Button, false);
    broken.attach().unwrap();
    assert_eq!(
        system.widget(broken.native_handle().unwrap()).unwrap().parent,
        window.native_handle()
    );

    window.dispose().unwrap();
    assert_eq!(system.live_widgets(), 0);
    use_headless();
}

#[test]
fn test_style_change_recreates_native_widget() {
    let system = use_software();
    let text_box = Control::text_box();
    text_box.set_text("kept").unwrap();
    text_box.attach().unwrap();
    let original = text_box.native_handle().unwrap();

    text_box.set_style(StyleFlags::BORDER).unwrap();
    assert_eq!(text_box.native_handle(), Some(original));

    text_box.set_style(StyleFlags::BORDER | StyleFlags::MULTILINE).unwrap();
    let recreated = text_box.native_handle().unwrap();
    assert_ne!(recreated, original);
    assert!(system.widget(original).is_none());

    let widget = system.widget(recreated).unwrap();
    assert_eq!(widget.text, "kept");
    assert!(widget.style.contains(StyleFlags::MULTILINE));
    assert!(system.violations().is_empty());

    text_box.dispose().unwrap();
    use_headless();
}

#[test]
fn test_invalidate_without_native_resource_uses_ancestor() {
    let system = SoftwareWindowSystem::new();
    system.mark_unsupported(ControlKind::Generic);
    Dispatcher::current().set_platform(system.platform()).unwrap();

    let window = Control::window("host");
    let canvas = Control::new(&CANVAS);
    window.add_child(&canvas).unwrap();
    window.attach_tree().unwrap();

    assert!(canvas.is_attached());
    assert!(canvas.native_handle().is_none());

    canvas.invalidate().unwrap();
    let handle = window.native_handle().unwrap();
    assert!(system.widget(handle).unwrap().invalidated);

    canvas.update().unwrap();
    let widget = system.widget(handle).unwrap();
    assert!(!widget.invalidated);
    assert_eq!(widget.repaints, 1);

    window.dispose().unwrap();
    use_headless();
}

#[test]
fn test_hit_test_picks_topmost_child() {
    use_headless();
    let root = Control::panel();
    root.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
    let below = Control::panel();
    below.set_bounds(Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
    let above = Control::panel();
    above.set_bounds(Rect::new(25.0, 25.0, 50.0, 50.0)).unwrap();
    let inner = Control::button("inner");
    inner.set_bounds(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();

    root.add_child(&below).unwrap();
    root.add_child(&above).unwrap();
    above.add_child(&inner).unwrap();

    assert_eq!(root.hit_test(Point::new(30.0, 30.0)), inner);
    assert_eq!(root.hit_test(Point::new(10.0, 10.0)), below);
    assert_eq!(root.hit_test(Point::new(90.0, 10.0)), root);

    above.set_visible(false).unwrap();
    assert_eq!(root.hit_test(Point::new(30.0, 30.0)), below);
}

#[test]
fn test_named_properties_round_through_bag() {
    use_headless();
    let control = Control::panel();
    control
        .set_property("Tag", PropertyValue::Text("custom".to_string()))
        .unwrap();
    control
        .set_property(names::ENABLED, PropertyValue::Bool(false))
        .unwrap();

    assert_eq!(
        control.property("Tag"),
        Some(PropertyValue::Text("custom".to_string()))
    );
    assert!(!control.enabled());
}

#[test]
fn test_created_handler_follows_platform_switch() {
    use_headless();
    let label = Control::label("pending");
    label.create_handler().unwrap();
    assert_eq!(label.backend_name(), Some("headless"));

    let system = SoftwareWindowSystem::new();
    Dispatcher::current()
        .switch_platform(system.platform())
        .unwrap();
    label.attach().unwrap();

    assert_eq!(label.backend_name(), Some("software"));
    let handle = label.native_handle().unwrap();
    assert_eq!(system.widget(handle).unwrap().text, "pending");

    label.dispose().unwrap();
    use_headless();
}

#[test]
fn test_style_changes_needing_recreation() {
    let current = StyleFlags::BORDER | StyleFlags::MULTILINE;

    let dropped_border = current.symmetric_difference(StyleFlags::MULTILINE);
    assert_eq!(dropped_border, StyleFlags::BORDER);
    assert!(!dropped_border.intersects(StyleFlags::RECREATE_MASK));

    let dropped_multiline = current.symmetric_difference(StyleFlags::BORDER);
    assert!(dropped_multiline.intersects(StyleFlags::RECREATE_MASK));
    assert!(StyleFlags::default().is_empty());
}

#[test]
fn test_scroll_with_negative_extent_does_not_panic() {
    let system = use_software();
    let list = Control::new(&LIST_VIEW);
    let position = list
        .with_scroll_handler(|s| {
            s.set_extent(-10.0, 100.0);
            s.set_scroll_position(Point::new(5.0, 120.0));
            s.scroll_position()
        })
        .unwrap();
    assert_eq!(position, Point::new(0.0, 100.0));
    assert!(system.violations().is_empty());

    list.dispose().unwrap();
    use_headless();
}
