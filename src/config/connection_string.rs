//! Connection string parsing
//!
//! Supports formats:
//! * driver://[user[:password]@][host][:port][/database][?key=value&...]
//! * driver://[::1]:port/database (bracketed IPv6 host)
//! * sqlite::memory: / sqlite:///absolute/path.db / sqlite:relative.db
//!
//! Percent-encoded user, password, database and query values are decoded.

use super::ConnectionConfig;
use crate::{Error, Result};
use serde_json::Value;
use std::borrow::Cow;

const SQLITE_SCHEME: &str = "sqlite:";

/// Iterate over `key=value` pairs of a query string
fn query_pairs(query_string: &str) -> impl Iterator<Item = (&str, &str)> {
    // Remove leading '?' if present
    query_string
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .filter(|(key, _)| !key.is_empty())
}

/// Split `s` at the first `?` into (before, query)
fn split_query(s: &str) -> (&str, &str) {
    match s.find('?') {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    }
}

/// Percent-decode one component of a connection string
fn decode<'a>(component: &'a str, what: &str) -> Result<Cow<'a, str>> {
    urlencoding::decode(component)
        .map_err(|_| Error::Config(format!("{} is not valid UTF-8 once decoded", what)))
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Parse connection string
pub(crate) fn parse(s: &str) -> Result<ConnectionConfig> {
    // sqlite://host/... is not a file path, fall through to the network form
    if s.starts_with(SQLITE_SCHEME) && (!s.starts_with("sqlite://") || s.starts_with("sqlite:///"))
    {
        return parse_sqlite(s);
    }

    let (scheme, rest) = s.split_once("://").ok_or_else(|| {
        Error::Config("connection string must start with <driver>://".into())
    })?;

    if !valid_scheme(scheme) {
        return Err(Error::Config(format!("invalid driver scheme '{}'", scheme)));
    }

    parse_network(scheme, rest)
}

fn parse_sqlite(s: &str) -> Result<ConnectionConfig> {
    let rest = &s[SQLITE_SCHEME.len()..];
    let (path, query_string) = split_query(rest);

    // sqlite:///abs/path keeps the leading '/' of the path
    let path = path.strip_prefix("//").unwrap_or(path);
    if path.is_empty() {
        return Err(Error::Config("sqlite connection string requires a path".into()));
    }

    let mut config = ConnectionConfig::new()
        .setting("driver", "sqlite")
        .setting("path", path);

    set_query_params(&mut config, query_string)?;
    Ok(config)
}

/// Query parameters never override settings taken from the rest of the string
fn set_query_params(config: &mut ConnectionConfig, query_string: &str) -> Result<()> {
    for (key, value) in query_pairs(query_string) {
        if !config.contains(key) {
            config.set(key, decode(value, "query value")?.into_owned());
        }
    }
    Ok(())
}

fn parse_network(driver: &str, rest: &str) -> Result<ConnectionConfig> {
    // Format: [user[:password]@]host[:port][/database][?params]
    let (rest, query_string) = split_query(rest);

    let (auth, rest) = if let Some(pos) = rest.rfind('@') {
        let (auth, rest) = rest.split_at(pos);
        (Some(auth), &rest[1..])
    } else {
        (None, rest)
    };

    let (user, password) = match auth {
        Some(auth) => match auth.split_once(':') {
            Some((user, pass)) => (decode(user, "user")?, Some(decode(pass, "password")?)),
            None => (decode(auth, "user")?, None),
        },
        None => (Cow::Borrowed(""), None),
    };

    let (host_port, database) = if let Some(pos) = rest.find('/') {
        let (hp, db) = rest.split_at(pos);
        (hp, Some(&db[1..]).filter(|db| !db.is_empty()))
    } else {
        (rest, None)
    };

    let (host, port) = split_host_port(host_port)?;

    let mut config = ConnectionConfig::new().setting("driver", driver);

    if !user.is_empty() {
        config.set("user", user.into_owned());
    }
    if let Some(password) = password {
        config.set("password", password.into_owned());
    }
    if !host.is_empty() {
        config.set("host", host);
    }
    if let Some(port) = port {
        config.set("port", Value::from(port));
    }
    if let Some(database) = database {
        config.set("database", decode(database, "database")?.into_owned());
    }

    set_query_params(&mut config, query_string)?;
    Ok(config)
}

fn split_host_port(host_port: &str) -> Result<(&str, Option<u16>)> {
    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let end = bracketed
            .find(']')
            .ok_or_else(|| Error::Config("unterminated IPv6 host".into()))?;
        let port = &bracketed[end + 1..];
        let port = match port.strip_prefix(':') {
            Some(port) => Some(port),
            None if port.is_empty() => None,
            None => return Err(Error::Config("invalid characters after IPv6 host".into())),
        };
        (&bracketed[..end], port)
    } else if host_port.matches(':').count() > 1 {
        return Err(Error::Config(format!(
            "IPv6 host '{}' must be enclosed in brackets",
            host_port
        )));
    } else if let Some((host, port)) = host_port.split_once(':') {
        (host, Some(port))
    } else {
        (host_port, None)
    };

    let port = port
        .map(|p| {
            p.parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port '{}'", p)))
        })
        .transpose()?;

    Ok((host, port))
}
