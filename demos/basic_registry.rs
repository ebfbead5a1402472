//! Basic registry example
//!
//! Registers one live connection and two lazily-built ones, then resolves them.
//!
//! Run with: RUST_LOG=fraiseql_registry=trace cargo run --example basic_registry

use fraiseql_registry::{
    ConnectionConfig, ConnectionFactory, ConnectionRegistry, FactoryError, RegistryConfig,
    SharedFactory,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Stand-in for a real database handle
#[derive(Debug)]
struct DemoConnection {
    driver: String,
    target: String,
}

/// Factory that "connects" by describing the configuration
struct DemoFactory;

impl ConnectionFactory for DemoFactory {
    type Connection = DemoConnection;

    fn make(&self, config: &ConnectionConfig) -> Result<DemoConnection, FactoryError> {
        let driver = config.driver().ok_or("configuration has no driver")?;
        let target = match driver {
            "sqlite" => config.get_str("path").ok_or("sqlite requires a path")?,
            _ => config.get_str("host").unwrap_or("localhost"),
        };
        Ok(DemoConnection {
            driver: driver.to_string(),
            target: target.to_string(),
        })
    }
}

fn main() -> fraiseql_registry::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let document = RegistryConfig::default()
        .connection_url("main", "postgres://app@primary.internal/app")
        .connection_url("cache", "sqlite::memory:")
        .default_connection("main");

    let factory: SharedFactory<DemoConnection> = Arc::new(DemoFactory);
    let mut registry = ConnectionRegistry::from_config(document, Some(factory))?;

    let audit = Arc::new(DemoConnection {
        driver: "postgres".into(),
        target: "audit.internal".into(),
    });
    registry.add_connection("audit", audit)?;

    println!("registry: {:?}", registry);

    let main = registry.connection(None)?;
    println!("default -> {} @ {}", main.driver, main.target);

    for name in ["cache", "audit", "cache"] {
        let conn = registry.connection(Some(name))?;
        println!("{} -> {} @ {}", name, conn.driver, conn.target);
    }

    match registry.connection(Some("reporting")) {
        Ok(_) => unreachable!("reporting was never registered"),
        Err(e) => println!("reporting -> {}", e),
    }

    Ok(())
}
