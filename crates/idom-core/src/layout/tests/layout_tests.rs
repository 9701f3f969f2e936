use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use serde_json::json;

use super::*;
use crate::element::{Element, FnElement};
use crate::events::EventHandler;
use crate::hooks::{use_state, SetState};
use crate::model::Node;
use crate::vdom::{vdom, ChildItem};

fn run<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    tokio::task::LocalSet::new().block_on(&runtime, future)
}

fn leaf(name: &'static str) -> Rc<FnElement> {
    FnElement::new(name, move || async move {
        Ok::<_, anyhow::Error>(vdom("span").on("onClick", |_| ()).child(name))
    })
}

fn layout(root: ElementRef) -> Layout {
    Layout::with_config(root, Config::default().with_debug_mode(true))
}

#[test]
fn first_render_mounts_the_whole_tree() {
    let a = leaf("A");
    let b = leaf("B");
    let (a_ref, b_ref): (ElementRef, ElementRef) = (a.clone(), b.clone());
    let root = FnElement::new("Root", move || {
        let (a, b) = (a_ref.clone(), b_ref.clone());
        async move { Ok::<_, anyhow::Error>(vdom("div").child(a).child(vdom("p").child(b))) }
    });
    let root_id = root.id();
    let layout = layout(root);

    let update = run(layout.render()).unwrap();
    assert_eq!(update.src, root_id);
    assert!(update.old.is_empty());
    let ids: Vec<_> = update.new.keys().copied().collect();
    assert_eq!(ids, [root_id, a.id(), b.id()]);

    assert_eq!(layout.mounted_count(), 3);
    assert_eq!(layout.parent_of(a.id()), Some(root_id));
    assert_eq!(layout.parent_of(b.id()), Some(root_id));
    let mut expected = vec![a.id(), b.id()];
    expected.sort();
    assert_eq!(layout.children_of(root_id), expected);
    assert_eq!(layout.handler_count(), 2);
    assert!(a.is_mounted());
}

#[test]
fn bare_element_output_is_wrapped_in_a_div() {
    let child = leaf("Child");
    let child_ref: ElementRef = child.clone();
    let root = FnElement::new("Root", move || {
        let child = child_ref.clone();
        async move { Ok::<_, anyhow::Error>(child) }
    });
    let root_id = root.id();
    let layout = layout(root);
    let update = run(layout.render()).unwrap();
    let model = update.model(root_id).unwrap();
    assert_eq!(model.tag_name, "div");
    assert_eq!(model.children, [ChildItem::Ref(child.id())]);
}

#[test]
fn dropped_children_are_unmounted_with_their_handlers() {
    let setter: Rc<Cell<Option<SetState<bool>>>> = Rc::new(Cell::new(None));
    let a = leaf("A");
    let a_ref: ElementRef = a.clone();
    let root = {
        let setter = setter.clone();
        FnElement::new("Root", move || {
            let a = a_ref.clone();
            let setter = setter.clone();
            async move {
                let (visible, set_visible) = use_state(true)?;
                setter.set(Some(set_visible));
                let mut view = vdom("div");
                if visible {
                    view = view.child(a);
                }
                Ok::<_, anyhow::Error>(view)
            }
        })
    };
    let layout = layout(root.clone());

    run(async {
        layout.render().await.unwrap();
        assert!(layout.is_mounted(a.id()));
        assert_eq!(layout.handler_count(), 1);

        setter.take().unwrap().set(false);
        let update = layout.render().await.unwrap();
        assert_eq!(update.old, [a.id()]);
        assert!(!layout.is_mounted(a.id()));
        assert_eq!(layout.handler_count(), 0);
        assert!(!a.is_mounted());
        assert!(layout.children_of(root.id()).is_empty());
    });
}

#[test]
fn failed_render_keeps_the_previous_model_live() {
    let fail = Rc::new(Cell::new(false));
    let handler = EventHandler::from_fn(|_| ());
    let descriptor = handler.descriptor();
    let child = leaf("Child");
    let root = {
        let fail = fail.clone();
        let child: ElementRef = child.clone();
        FnElement::new("Root", move || {
            let fail = fail.get();
            let handler = handler.clone();
            let child = child.clone();
            async move {
                anyhow::ensure!(!fail, "render refused");
                Ok(vdom("div").handler("onClick", handler).child(child))
            }
        })
    };
    let layout = layout(root.clone());

    run(async {
        layout.render().await.unwrap();
        fail.set(true);
        assert!(root.schedule_update());
        let err = layout.render().await.unwrap_err();
        let LayoutError::Render { source, update } = err else {
            panic!("expected a render failure");
        };
        assert_eq!(source.element_id(), root.id());
        assert_eq!(source.element_name(), "Root");
        assert_eq!(source.cause().to_string(), "render refused");
        assert!(update.new.is_empty());
        assert!(update.old.is_empty());

        assert!(layout.has_handler(&descriptor));
        assert!(layout.is_mounted(child.id()));
        assert_eq!(layout.children_of(root.id()), [child.id()]);

        fail.set(false);
        assert!(root.schedule_update());
        let update = layout.render().await.unwrap();
        assert!(update.model(root.id()).is_some());
    });
}

#[test]
fn close_unmounts_everything() {
    let child = leaf("Child");
    let child_ref: ElementRef = child.clone();
    let root = FnElement::new("Root", move || {
        let child = child_ref.clone();
        async move { Ok::<_, anyhow::Error>(vdom("div").child(child)) }
    });
    let layout = layout(root.clone());

    run(async {
        layout.render().await.unwrap();
        layout.close().unwrap();
        assert!(layout.is_closed());
        assert_eq!(layout.mounted_count(), 0);
        assert!(!root.is_mounted());
        assert!(!child.is_mounted());
        assert!(!layout.update(&(root.clone() as ElementRef)));
        assert!(matches!(layout.render().await, Err(LayoutError::Closed)));
        layout.close().unwrap();
    });
}

#[test]
fn raw_json_output_is_loaded() {
    let root = FnElement::new("Root", || async {
        Ok::<_, anyhow::Error>(Node::Raw(json!({
            "tagName": "ul",
            "children": [{"tagName": "li", "children": ["one"]}, "two"],
        })))
    });
    let root_id = root.id();
    let layout = layout(root);
    let update = run(layout.render()).unwrap();
    let wire = serde_json::to_value(update.model(root_id).unwrap()).unwrap();
    assert_eq!(
        wire,
        json!({
            "tagName": "ul",
            "children": [
                {"type": "obj", "data": {"tagName": "li", "children": [{"type": "str", "data": "one"}]}},
                {"type": "str", "data": "two"},
            ],
        })
    );
}

#[test]
fn updates_for_unmounted_elements_are_skipped() {
    let stray = leaf("Stray");
    let root = leaf("Root");
    let layout = layout(root.clone());
    run(async {
        layout.render().await.unwrap();
        layout.update(&(stray.clone() as ElementRef));
        assert!(root.schedule_update());
        let update = layout.render().await.unwrap();
        assert_eq!(update.new.keys().copied().collect::<Vec<_>>(), [root.id()]);
        assert!(!layout.is_mounted(stray.id()));
    });
}
