use std::cell::{Cell, RefCell};
use std::rc::Rc;

use idom_core::prelude::*;
use idom_core::{Element, LayoutError, SetState};
use idom_testing::{run_local, settle, HookCatcher, LayoutTester, StaticElement};

/// Sets its flag when dropped, which is how an aborted task's future ends.
struct DropFlag(Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

#[test]
fn async_effect_runs_after_render() {
    run_local(async {
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = {
            let log = log.clone();
            component("Loader", move || {
                let log = log.clone();
                async move {
                    let (loaded, set_loaded) = use_state(false)?;
                    let sink = log.clone();
                    use_async_effect(
                        move || async move {
                            sink.borrow_mut().push("effect started");
                            tokio::task::yield_now().await;
                            set_loaded.set(true);
                            Ok(())
                        },
                        [0],
                    )?;
                    log.borrow_mut().push(if loaded { "render loaded" } else { "render empty" });
                    Ok::<_, anyhow::Error>(html::div())
                }
            })
        };
        let tester = LayoutTester::new(root);
        tester.render().await;
        assert_eq!(*log.borrow(), ["render empty"]);

        settle().await;
        assert!(tester.has_pending_render());
        tester.render().await;
        assert_eq!(*log.borrow(), ["render empty", "effect started", "render loaded"]);
    });
}

#[test]
fn unmount_cancels_a_pending_async_effect() {
    run_local(async {
        let cancelled = Rc::new(Cell::new(false));
        let finished = Rc::new(Cell::new(false));
        let worker = {
            let (cancelled, finished) = (cancelled.clone(), finished.clone());
            component("Worker", move || {
                let (cancelled, finished) = (cancelled.clone(), finished.clone());
                async move {
                    use_async_effect(
                        move || async move {
                            let _flag = DropFlag(cancelled);
                            futures::future::pending::<()>().await;
                            finished.set(true);
                            Ok(())
                        },
                        [0],
                    )?;
                    Ok::<_, anyhow::Error>("working")
                }
            })
        };

        let setter: Rc<Cell<Option<SetState<bool>>>> = Rc::default();
        let root = {
            let (worker, setter) = (worker.clone(), setter.clone());
            component("Host", move || {
                let (worker, setter) = (worker.clone(), setter.clone());
                async move {
                    let (show, set_show) = use_state(true)?;
                    setter.set(Some(set_show));
                    let view = if show { html::div().child(worker) } else { html::div() };
                    Ok::<_, anyhow::Error>(view)
                }
            })
        };

        let tester = LayoutTester::new(root);
        tester.render().await;
        settle().await;
        assert!(!cancelled.get());

        setter.take().unwrap().set(false);
        let update = tester.render().await;
        assert_eq!(update.old, [worker.id()]);
        settle().await;
        assert!(cancelled.get());
        assert!(!finished.get());
    });
}

#[test]
fn failed_async_effect_surfaces_when_cleaned_up() {
    run_local(async {
        let catcher = HookCatcher::new();
        let round = Rc::new(Cell::new(0));
        let root = {
            let (catcher, round) = (catcher.clone(), round.clone());
            component("Fetcher", move || {
                let (catcher, round) = (catcher.clone(), round.get());
                async move {
                    catcher.capture()?;
                    use_async_effect(
                        move || async move {
                            anyhow::ensure!(round > 0, "fetch failed");
                            Ok(())
                        },
                        [round],
                    )?;
                    Ok::<_, anyhow::Error>(html::div())
                }
            })
        };

        let tester = LayoutTester::new(root);
        tester.render().await;
        settle().await;

        round.set(1);
        catcher.schedule_render();
        let err = tester.render_err().await;
        let LayoutError::Render { source, update } = err else {
            panic!("expected the effect failure to surface");
        };
        assert_eq!(source.cause().to_string(), "fetch failed");
        assert_eq!(update.new.len(), 1, "the render itself succeeded");

        settle().await;
        catcher.schedule_render();
        tester.render().await;
    });
}

#[test]
fn effects_see_dependency_changes_in_order() {
    run_local(async {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let catcher = HookCatcher::new();
        let dep = Rc::new(Cell::new(1));
        let root = {
            let (log, catcher, dep) = (log.clone(), catcher.clone(), dep.clone());
            component("Subscriber", move || {
                let (log, catcher, dep) = (log.clone(), catcher.clone(), dep.get());
                async move {
                    catcher.capture()?;
                    use_effect(
                        move |scope| {
                            log.borrow_mut().push(format!("subscribe {dep}"));
                            scope.on_cleanup(move || log.borrow_mut().push(format!("unsubscribe {dep}")))
                        },
                        (dep,),
                    )?;
                    Ok::<_, anyhow::Error>(html::div())
                }
            })
        };

        let tester = LayoutTester::new(root);
        tester.render().await;
        catcher.schedule_render();
        tester.render().await;
        dep.set(2);
        catcher.schedule_render();
        tester.render().await;
        tester.layout().close().unwrap();

        assert_eq!(
            *log.borrow(),
            ["subscribe 1", "unsubscribe 1", "subscribe 2", "unsubscribe 2"]
        );
    });
}

#[test]
fn hook_state_is_dropped_with_the_element() {
    run_local(async {
        let dropped = Rc::new(Cell::new(false));
        let child = {
            let dropped = dropped.clone();
            component("Holder", move || {
                let dropped = dropped.clone();
                async move {
                    use_ref(DropFlag(dropped))?;
                    Ok::<_, anyhow::Error>("holding")
                }
            })
        };
        let visible = Rc::new(Cell::new(true));
        let root = {
            let (child, visible) = (child.clone(), visible.clone());
            StaticElement::new("Root", move || {
                if visible.get() {
                    html::div().child(child.clone()).into()
                } else {
                    html::div().into()
                }
            })
        };

        let tester = LayoutTester::new(root.clone());
        tester.render().await;
        assert!(!dropped.get());

        visible.set(false);
        root.schedule_update();
        tester.render().await;
        assert!(dropped.get());
    });
}
