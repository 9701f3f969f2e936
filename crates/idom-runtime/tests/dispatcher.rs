use std::cell::Cell;
use std::rc::Rc;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::json;

use idom_core::prelude::*;
use idom_core::{ChildItem, Config, Element, LayoutUpdate};
use idom_macros::component;
use idom_runtime::{Dispatcher, DispatcherConfig, DispatcherThread};
use idom_testing::{init_logging, run_local, settle};

#[component]
fn Clicker() -> anyhow::Result<Container> {
    let (count, set_count) = use_state(0)?;
    Ok(html::button()
        .on("onClick", move |_| set_count.set(count + 1))
        .child(count))
}

fn click_target(update: &LayoutUpdate) -> String {
    update.new[&update.src].event_handlers["onClick"].clone()
}

fn label(update: &LayoutUpdate) -> ChildItem {
    update.new[&update.src].children[0].clone()
}

#[test]
fn dispatcher_renders_and_routes_events() {
    run_local(async {
        let layout = Layout::with_config(Clicker(), Config::default());
        let (update_tx, mut update_rx) = mpsc::unbounded();
        let (mut event_tx, event_rx) = mpsc::unbounded();
        let dispatcher = Dispatcher::new(layout.clone());

        let driver = async move {
            let first = update_rx.next().await.expect("initial update");
            assert_eq!(label(&first), ChildItem::Str("0".into()));

            let target = click_target(&first);
            event_tx
                .send(LayoutEvent::new(target, vec![json!({})]))
                .await
                .unwrap();
            let second = update_rx.next().await.expect("update after click");
            assert_eq!(label(&second), ChildItem::Str("1".into()));
            drop(event_tx);
        };

        let (result, ()) = futures::join!(dispatcher.run(update_tx, event_rx), driver);
        result.unwrap();
        assert!(layout.is_closed());
        assert_eq!(layout.mounted_count(), 0);
    });
}

#[test]
fn partial_updates_follow_the_config() {
    for send_partial_updates in [true, false] {
        run_local(async {
            let fail = Rc::new(Cell::new(false));
            let broken = {
                let fail = fail.clone();
                component("Broken", move || {
                    let fail = fail.get();
                    async move {
                        anyhow::ensure!(!fail, "broken");
                        Ok(html::span())
                    }
                })
            };
            let root = {
                let (broken, fail) = (broken.clone(), fail.clone());
                component("Root", move || {
                    let (broken, fail) = (broken.clone(), fail.clone());
                    async move {
                        let (_, set_tick) = use_state(0)?;
                        let view = html::div()
                            .on("onClick", move |_| {
                                fail.set(true);
                                set_tick.update(|t| t + 1);
                            })
                            .child(broken);
                        Ok::<_, anyhow::Error>(view)
                    }
                })
            };

            let layout = Layout::with_config(root, Config::default());
            let (update_tx, mut update_rx) = mpsc::unbounded();
            let (mut event_tx, event_rx) = mpsc::unbounded();
            let dispatcher = Dispatcher::with_config(
                layout.clone(),
                DispatcherConfig {
                    send_partial_updates,
                },
            );

            let driver = async move {
                let first = update_rx.next().await.expect("initial update");
                let target = click_target(&first);
                event_tx.send(LayoutEvent::new(target, Vec::new())).await.unwrap();
                settle().await;
                drop(event_tx);
                update_rx.collect::<Vec<_>>().await
            };

            let (result, rest) = futures::join!(dispatcher.run(update_tx, event_rx), driver);
            result.unwrap();
            if send_partial_updates {
                assert_eq!(rest.len(), 1);
                assert!(!rest[0].new.contains_key(&broken.id()));
            } else {
                assert!(rest.is_empty());
            }
        });
    }
}

#[test]
fn dispatcher_thread_serves_a_layout() {
    init_logging();
    let mut thread = DispatcherThread::spawn(Clicker).unwrap();

    let first = thread.blocking_next_update().expect("initial update");
    assert_eq!(label(&first), ChildItem::Str("0".into()));

    thread
        .send_event(LayoutEvent::new(click_target(&first), Vec::new()))
        .unwrap();
    let second = thread.blocking_next_update().expect("update after click");
    assert_eq!(label(&second), ChildItem::Str("1".into()));

    thread.shutdown().unwrap();
}
