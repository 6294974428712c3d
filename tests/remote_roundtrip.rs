//! Exercises a `ProxyEngine` against a live `RemoteRuntime` over loopback
//! TCP: compile a registered module by name, drive it through the same
//! `Engine` calls a local `SyncEngine` would receive, and tear down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cascade::ast::{builders, ops::EventKind, Arena};
use cascade::remote::{ModuleRegistry, ProxyEngine, RemoteRuntime};
use cascade::runtime::{Engine, TracingInterface};

fn toggle_module() -> (Arena, cascade::ast::NodeId) {
    let mut arena = Arena::new();
    let q_decl = builders::reg_decl(&mut arena, "q", None, vec![]);
    let q = builders::identifier(&mut arena, "q");
    let not_q = builders::unary(&mut arena, cascade::ast::ops::UnaryOp::LogNot, builders::identifier(&mut arena, "q"));
    let assign = builders::nonblocking_assign(&mut arena, q, not_q);
    let body = builders::seq_block(&mut arena, vec![assign]);
    let clk = builders::identifier(&mut arena, "clk");
    let ev = builders::event(&mut arena, EventKind::Posedge, clk);
    let ctrl = builders::event_control(&mut arena, vec![ev]);
    let timed = builders::timing_control_statement(&mut arena, ctrl, body);
    let always = builders::always(&mut arena, timed);
    let module = builders::module_decl(&mut arena, "toggle", vec![], vec![q_decl, always]);
    (arena, module)
}

fn find_open_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test]
async fn proxy_engine_round_trips_state_through_remote_runtime() {
    let (arena, module) = toggle_module();
    let mut modules = HashMap::new();
    modules.insert("toggle".to_string(), module);
    let registry = ModuleRegistry { arena, modules };
    let runtime = RemoteRuntime::new(registry, 2);

    let port = find_open_port();
    let addr = format!("127.0.0.1:{port}");
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handle = stop.clone();
    let addr_for_task = addr.clone();
    let server = tokio::spawn(async move {
        runtime.run(&addr_for_task, stop_handle).await.unwrap();
    });

    // give the accept loop a moment to bind before connecting.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let addr_for_blocking = addr.clone();
    tokio::task::spawn_blocking(move || {
        let mut proxy = ProxyEngine::connect(&addr_for_blocking, 1, 0).unwrap();
        assert!(proxy.compile("toggle").unwrap());

        let mut interface = TracingInterface::default();
        assert!(!proxy.there_were_tasks());
        proxy.evaluate(&mut interface).unwrap();
        assert!(proxy.there_are_updates());
        proxy.update().unwrap();
        let q = proxy.get_state("q").unwrap();
        assert_eq!(q.to_u64(), 1);
    })
    .await
    .unwrap();

    stop.store(true, Ordering::Release);
    // unblock the 1ms-polling accept loop so the server task can exit.
    let _ = std::net::TcpStream::connect(&addr);
    server.await.unwrap();
}
