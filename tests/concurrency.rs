//! Events raised on several application threads at once.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use excapture::bindings::{Binding, BindingCache, HELPER_TYPE};
use excapture::host::{CapturedValue, InMemoryHost, ThreadRef};

#[test]
fn test_disjoint_stacks_capture_independently() {
    let (app, owner) = App::new("com/acme/Inventory", "Inventory.java");
    let method = process_method(&app, owner);
    let threads = [ThreadRef(1), ThreadRef(2)];
    for (i, thread) in threads.iter().enumerate() {
        let label = app.object("com/acme/Label");
        app.host.set_stack(*thread, vec![process_frame(method, label, 10 * (i as i32 + 1))]);
    }

    let app = Arc::new(app);
    let capture = Arc::new(capture_with_depth(1));
    let barrier = Arc::new(Barrier::new(threads.len()));

    let handles: Vec<_> = threads
        .iter()
        .map(|&tid| {
            let app = Arc::clone(&app);
            let capture = Arc::clone(&capture);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let event = app.event(tid, method, 8);
                capture.on_exception_thrown(&app.host, &event).committed()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }

    for (i, thread) in threads.iter().enumerate() {
        let count = 10 * (i as i32 + 1);
        let committed = app.host.committed_on(*thread);
        assert_eq!(committed.len(), 1, "{:?}", thread);
        let ctx = &committed[0];
        assert_eq!(ctx.arguments[0].value, CapturedValue::Int(count));
        assert_eq!(ctx.locals.len(), 1);
        assert_eq!(ctx.locals[0].value, CapturedValue::Int(count * 2));
        assert_eq!(
            app.host.sink_calls(*thread),
            vec!["addException", "addArg", "addArg", "addLocal", "commit"]
        );
    }
    assert_eq!(app.host.pending_errors(), 0);
    assert_eq!(app.host.post_commit_mutations(), 0);
    assert!(app.host.outstanding_buffers().is_empty());
}

#[test]
fn test_concurrent_first_resolution_yields_equal_handles() {
    let host = Arc::new(InMemoryHost::with_sink());
    let cache = Arc::new(BindingCache::new());
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let host = Arc::clone(&host);
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.resolve(host.as_ref(), ThreadRef(i as u64), Binding::Type(HELPER_TYPE))
            })
        })
        .collect();

    let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = resolved[0].expect("helper type resolves");
    assert!(resolved.iter().all(|h| *h == Some(first)));
    assert_eq!(cache.get(&Binding::Type(HELPER_TYPE)), Some(first));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_shared_cache_across_captures() {
    let (app, owner) = App::new("com/acme/Inventory", "Inventory.java");
    let method = process_method(&app, owner);
    let label = app.object("com/acme/Label");
    app.host.set_stack(ThreadRef(1), vec![process_frame(method, label, 1)]);
    app.host.set_stack(ThreadRef(2), vec![process_frame(method, label, 2)]);

    let cache = Arc::new(BindingCache::new());
    let a = capture_with_depth(1).with_bindings(Arc::clone(&cache));
    let b = capture_with_depth(1).with_bindings(Arc::clone(&cache));

    assert_eq!(a.on_exception_thrown(&app.host, &app.event(ThreadRef(1), method, 8)).committed(), 1);
    assert_eq!(b.on_exception_thrown(&app.host, &app.event(ThreadRef(2), method, 8)).committed(), 1);
    assert_eq!(app.host.lookups(HELPER_TYPE), 1);
}
