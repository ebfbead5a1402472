//! Integration tests for the shared registry handle

use fraiseql_registry::{
    ConnectionConfig, ConnectionRegistry, FnFactory, SharedConnectionRegistry,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_name_built_once_under_contention() {
    let builds: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let recorder = builds.clone();

    let factory = FnFactory::new(move |config: &ConnectionConfig| {
        let db = config.get_str("database").unwrap_or_default().to_string();
        *recorder.lock().unwrap().entry(db.clone()).or_default() += 1;
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok::<_, std::io::Error>(db)
    });

    let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(factory));
    for name in ["orders", "users", "events"] {
        let url = format!("postgres://app@localhost/{}", name);
        shared
            .add_connection(name, ConnectionConfig::from_url(&url).unwrap())
            .await
            .unwrap();
    }
    shared.set_default_connection("events").await;

    let mut handles = Vec::new();
    for i in 0..30 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let name = match i % 4 {
                0 => Some("orders"),
                1 => Some("users"),
                2 => Some("events"),
                _ => None,
            };
            shared.connection(name).await.unwrap()
        }));
    }

    for handle in handles {
        let conn = handle.await.unwrap();
        assert!(["orders", "users", "events"].contains(&conn.as_str()));
    }

    let builds = builds.lock().unwrap();
    assert_eq!(builds.len(), 3);
    assert!(builds.values().all(|&count| count == 1));
}

#[tokio::test]
async fn test_clones_share_state() {
    let shared = SharedConnectionRegistry::new(ConnectionRegistry::<String>::without_factory());
    let other = shared.clone();

    other
        .add_connection("main", Arc::new("live".to_string()))
        .await
        .unwrap();
    other.set_default_connection("main").await;

    assert!(shared.has_connection("main").await);
    assert_eq!(shared.default_connection().await.as_deref(), Some("main"));
    assert_eq!(shared.connection(None).await.unwrap().as_str(), "live");
}
