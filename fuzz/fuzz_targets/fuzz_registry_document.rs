#![no_main]

use fraiseql_registry::{ConnectionConfig, ConnectionRegistry, FnFactory, RegistryConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = RegistryConfig::from_json_str(text) else {
        return;
    };

    let Ok(mut registry) = ConnectionRegistry::<String>::from_config(document, None) else {
        return;
    };
    let names: Vec<String> = registry.names().into_iter().map(str::to_owned).collect();

    // Without a factory nothing can be built, but resolution must not panic
    for name in &names {
        let _ = registry.connection(Some(name));
    }
    let _ = registry.connection(None);

    let factory = FnFactory::new(|config: &ConnectionConfig| serde_json::to_string(config.as_map()));
    let mut registry = ConnectionRegistry::with_factory(factory);
    for name in names {
        registry
            .add_connection(name.clone(), ConnectionConfig::new())
            .expect("document names are non-empty");
        assert!(registry.connection(Some(&name)).is_ok());
    }
});
