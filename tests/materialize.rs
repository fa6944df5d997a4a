use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use maplit::btreemap;
use starconfig::cfg_loader::Builder;
use starconfig::{current, materialize, Error, MemoryStore, Store, Value};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A configuration file in the temp directory, removed on drop.
struct TempConfig {
    path: PathBuf,
}

impl TempConfig {
    fn new(name: &str, content: &str) -> Self {
        let dir = env::temp_dir().join(format!(
            "starconfig-test-{}-{}",
            process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        Self { path }
    }

    fn specifier(&self) -> &str {
        self.path.to_str().expect("Temp dir is not UTF-8")
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) {
        if let Some(dir) = self.path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}

fn contents(store: &MemoryStore) -> BTreeMap<String, Value> {
    let cfg = current(store).expect("No configuration");
    cfg.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[cfg(feature = "xml")]
#[test]
fn xml_http_port_and_debug() {
    let file = TempConfig::new(
        "Config.xml",
        "<config><HttpPort>8080</HttpPort><Debug>true</Debug></config>",
    );
    let store = MemoryStore::new();
    let cfg = materialize(&store, file.specifier(), None).unwrap();
    let expected = btreemap! {
        "HttpPort".to_owned() => Value::Integer(8080),
        "Debug".to_owned() => Value::Bool(true),
    };
    assert_eq!(expected, contents(&store));
    assert_eq!(cfg, current(&store).unwrap());
}

#[test]
fn json_members_exactly() {
    let file = TempConfig::new(
        "config.JSON",
        r#"{"Name": "app", "Port": 443, "Ratio": 1.5, "Tls": false, "Proxy": null}"#,
    );
    let store = MemoryStore::new();
    materialize(&store, file.specifier(), None).unwrap();
    let expected = btreemap! {
        "Name".to_owned() => Value::from("app"),
        "Port".to_owned() => Value::Integer(443),
        "Ratio".to_owned() => Value::Decimal("1.5".parse().unwrap()),
        "Tls".to_owned() => Value::Bool(false),
        "Proxy".to_owned() => Value::Null,
    };
    assert_eq!(expected, contents(&store));
}

#[test]
fn second_load_replaces_first() {
    let first = TempConfig::new("first.json", r#"{"Only": "first", "Shared": 1}"#);
    let second = TempConfig::new("second.json", r#"{"Shared": 2}"#);
    let store = MemoryStore::new();
    let old = materialize(&store, first.specifier(), None).unwrap();
    let new = materialize(&store, second.specifier(), None).unwrap();
    assert_eq!(1, store.configurations().len());
    assert_ne!(old.id(), new.id());
    let expected = btreemap! {
        "Shared".to_owned() => Value::Integer(2),
    };
    assert_eq!(expected, contents(&store));
    // Whoever holds the old one still has all of it
    assert_eq!(Some(&Value::from("first")), old.get("Only"));
}

#[test]
fn bare_name_is_invalid() {
    let store = MemoryStore::new();
    match materialize(&store, "StarConfigPath", None) {
        Err(Error::InvalidSpecifier(specifier)) => assert_eq!("StarConfigPath", specifier),
        other => panic!("Unexpected result {:?}", other),
    }
    assert!(store.configurations().is_empty());
}

#[test]
fn missing_env_variable() {
    let file = TempConfig::new("config.json", r#"{"Kept": true}"#);
    let store = MemoryStore::new();
    materialize(&store, file.specifier(), None).unwrap();
    let loader = Builder::new().env_lookup(|_| None).build_no_opts();
    match loader.materialize(&store) {
        Err(Error::MissingEnvironmentVariable { name, .. }) => {
            assert_eq!("StarConfigPath", name)
        }
        other => panic!("Unexpected result {:?}", other),
    }
    // Nothing created, nothing destroyed
    assert_eq!(1, store.configurations().len());
    assert_eq!(Some(&Value::Bool(true)), current(&store).unwrap().get("Kept"));
}

#[test]
fn missing_env_variable_custom_message() {
    let store = MemoryStore::new();
    let err = materialize(
        &store,
        "%STARCONFIG_TEST_SURELY_UNSET%",
        Some("Set the config path first"),
    )
    .unwrap_err();
    assert_eq!("Set the config path first", err.to_string());
}

#[test]
fn process_environment() {
    let file = TempConfig::new("env.json", r#"{"FromEnv": 1}"#);
    env::set_var("STARCONFIG_TEST_PROCESS_ENV", file.specifier());
    let store = MemoryStore::new();
    materialize(&store, "%STARCONFIG_TEST_PROCESS_ENV%", None).unwrap();
    assert_eq!(Some(&Value::Integer(1)), current(&store).unwrap().get("FromEnv"));
}

#[test]
fn file_not_found() {
    let dir = TempConfig::new("placeholder.json", "{}");
    let missing = dir.path.with_file_name("missing.json");
    let store = MemoryStore::new();
    match materialize(&store, missing.to_str().unwrap(), None) {
        Err(Error::FileNotFound { path, .. }) => assert_eq!(missing, path),
        other => panic!("Unexpected result {:?}", other),
    }
    assert!(store.configurations().is_empty());
}

#[test]
fn unsupported_extension() {
    let file = TempConfig::new("config.yaml", "a: 1");
    let store = MemoryStore::new();
    match materialize(&store, file.specifier(), None) {
        Err(Error::UnsupportedFormat { path }) => assert_eq!(file.path, path),
        other => panic!("Unexpected result {:?}", other),
    }
}

#[test]
fn malformed_keeps_previous() {
    let good = TempConfig::new("good.json", r#"{"Version": 1}"#);
    let bad = TempConfig::new("bad.json", "[1, 2, 3]");
    let store = MemoryStore::new();
    let old = materialize(&store, good.specifier(), None).unwrap();
    assert!(matches!(
        materialize(&store, bad.specifier(), None),
        Err(Error::MalformedConfig { .. })
    ));
    assert_eq!(vec![old], store.configurations());
}

#[test]
fn empty_key_keeps_previous() {
    let good = TempConfig::new("good.json", r#"{"Version": 1}"#);
    let bad = TempConfig::new("empty-key.json", r#"{"": 1, "a": 2}"#);
    let store = MemoryStore::new();
    let old = materialize(&store, good.specifier(), None).unwrap();
    match materialize(&store, bad.specifier(), None) {
        Err(e @ Error::MalformedConfig { .. }) => {
            assert!(e.to_string().contains("keys must not be empty"))
        }
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(vec![old], store.configurations());
}

#[cfg(feature = "xml")]
#[test]
fn xml_without_config_root() {
    let file = TempConfig::new("settings.xml", "<settings><a>1</a></settings>");
    let store = MemoryStore::new();
    match materialize(&store, file.specifier(), None) {
        Err(e @ Error::MalformedConfig { .. }) => assert!(e
            .to_string()
            .contains("XML configuration files must contain a root 'config' node")),
        other => panic!("Unexpected result {:?}", other),
    }
}

/// Readers racing the reloads always see exactly one, complete, configuration.
#[test]
fn readers_see_old_or_new() {
    let small = TempConfig::new("small.json", r#"{"Version": 1, "A": 1}"#);
    let big = TempConfig::new("big.json", r#"{"Version": 2, "A": 1, "B": 2, "C": 3}"#);
    let store = MemoryStore::new();
    materialize(&store, small.specifier(), None).unwrap();
    let done = AtomicBool::new(false);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let configs = store.configurations();
                    assert_eq!(1, configs.len());
                    let cfg = &configs[0];
                    match cfg.get_as::<i64>("Version").unwrap() {
                        1 => assert_eq!(2, cfg.len()),
                        2 => assert_eq!(4, cfg.len()),
                        v => panic!("Unknown version {}", v),
                    }
                    assert!(current(&store).is_some());
                }
            });
        }
        for i in 0..200 {
            let file = if i % 2 == 0 { &big } else { &small };
            let result = materialize(&store, file.specifier(), None);
            if result.is_err() {
                done.store(true, Ordering::Release);
            }
            result.unwrap();
        }
        done.store(true, Ordering::Release);
    });
    assert_eq!(1, store.configurations().len());
}

/// Two loaders racing each other still leave exactly one configuration behind.
#[test]
fn concurrent_loads() {
    let a = TempConfig::new("a.json", r#"{"From": "a"}"#);
    let b = TempConfig::new("b.json", r#"{"From": "b"}"#);
    let store = MemoryStore::new();
    thread::scope(|s| {
        for file in [&a, &b] {
            let store = &store;
            s.spawn(move || {
                for _ in 0..50 {
                    materialize(store, file.specifier(), None).unwrap();
                }
            });
        }
    });
    let configs = store.configurations();
    assert_eq!(1, configs.len());
    let from = configs[0].get_as::<String>("From").unwrap();
    assert!(from == "a" || from == "b");
}
