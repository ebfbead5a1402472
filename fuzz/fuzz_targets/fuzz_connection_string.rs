#![no_main]

use fraiseql_registry::ConnectionConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &str| {
    if let Ok(config) = ConnectionConfig::from_url(input) {
        // A parsed string always names its driver
        assert!(config.driver().is_some());
        let _ = format!("{:?}", config);
    }
});
