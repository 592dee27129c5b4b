//! CLI integration tests for shopdeskctl
//!
//! Tests the CLI surface against a throwaway database:
//! - init, optionally writing the config file
//! - create / show / list
//! - set-default moves the default address within a scope
//! - transition stamps and rejects disallowed edges (exit code 4)
//! - missing ids exit with code 3
//! - bulk in atomic and best-effort mode
//! - badge, summary, usage, events, total

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Shop {
    dir: TempDir,
}

impl Shop {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("shop.db")
    }

    fn config_home(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_shopdeskctl"))
            .arg("--db")
            .arg(self.db())
            .args(args)
            .env_remove("SHOPDESK_DB")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.config_home())
            .output()
            .expect("Failed to run shopdeskctl")
    }

    /// Run with --json and parse stdout
    fn json(&self, args: &[&str]) -> (i32, Value) {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.run(&full);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, stdout));
        (output.status.code().unwrap_or(-1), value)
    }

    fn create(&self, args: &[&str]) -> i64 {
        let mut full = vec!["create"];
        full.extend_from_slice(args);
        let (code, value) = self.json(&full);
        assert_eq!(code, 0, "create failed: {}", value);
        value["id"].as_i64().unwrap()
    }
}

#[test]
fn test_version_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_shopdeskctl"))
        .arg("--version")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("shopdeskctl "), "got: {}", stdout);
    assert!(output.status.success());
}

#[test]
fn test_init_creates_database() {
    let shop = Shop::new();
    let output = shop.run(&["init"]);
    assert!(output.status.success());
    assert!(shop.db().exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Database ready"));
}

#[test]
fn test_init_write_config() {
    let shop = Shop::new();
    let output = shop.run(&["init", "--write-config"]);
    assert!(output.status.success());
    let written = shop.config_home().join("shopdesk").join("config.toml");
    let contents = std::fs::read_to_string(&written).unwrap();
    assert!(contents.contains("[manager]"), "got: {}", contents);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Config written to"));

    let explicit = shop.dir.path().join("custom.toml");
    let (code, value) = shop.json(&["--config", explicit.to_str().unwrap(), "init", "--write-config"]);
    assert_eq!(code, 0);
    assert_eq!(value["config_written"], explicit.to_str().unwrap());
    assert!(explicit.exists());

    // The written file loads back
    let (code, _) = shop.json(&["--config", explicit.to_str().unwrap(), "init"]);
    assert_eq!(code, 0);
}

#[test]
fn test_set_default_moves_flag() {
    let shop = Shop::new();
    let a = shop.create(&["address", "--scope", "7"]);
    let b = shop.create(&["address", "--scope", "7", "--flag", "is_default"]);

    let (code, value) = shop.json(&["set-default", "7", &a.to_string()]);
    assert_eq!(code, 0);
    assert_eq!(value["flags"]["is_default"], Value::Bool(true));

    let (_, b_now) = shop.json(&["show", &b.to_string()]);
    assert_eq!(b_now["flags"]["is_default"], Value::Bool(false));

    let (_, listed) = shop.json(&["list", "addresses", "--scope", "7"]);
    let holders = listed
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["flags"]["is_default"] == Value::Bool(true))
        .count();
    assert_eq!(holders, 1);
}

#[test]
fn test_transition_and_exit_codes() {
    let shop = Shop::new();
    let order = shop.create(&["order", "--scope", "1"]);
    let id = order.to_string();

    let (code, _) = shop.json(&["transition", &id, "processing"]);
    assert_eq!(code, 0);
    let (code, value) = shop.json(&["transition", &id, "shipped"]);
    assert_eq!(code, 0);
    assert_eq!(value["status"], "shipped");
    assert!(value["stamps"]["shipped_at"].is_string());
    assert!(value["stamps"].get("delivered_at").is_none());

    let output = shop.run(&["transition", &id, "pending"]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not allowed"), "got: {}", stderr);

    let (_, value) = shop.json(&["show", &id]);
    assert_eq!(value["status"], "shipped");
}

#[test]
fn test_missing_entity_exit_code() {
    let shop = Shop::new();
    let output = shop.run(&["toggle", "404", "is_active"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("#404 not found"));

    let (code, value) = shop.json(&["show", "404"]);
    assert_eq!(code, 3);
    assert_eq!(value["ok"], Value::Bool(false));
}

#[test]
fn test_toggle_twice() {
    let shop = Shop::new();
    let p = shop.create(&["product", "--flag", "is_active"]).to_string();

    let (_, first) = shop.json(&["toggle", &p, "is_active"]);
    assert_eq!(first["value"], Value::Bool(false));
    let (_, second) = shop.json(&["toggle", &p, "is_active"]);
    assert_eq!(second["value"], Value::Bool(true));
}

#[test]
fn test_bulk_modes() {
    let shop = Shop::new();
    let a = shop.create(&["product"]).to_string();
    let b = shop.create(&["product"]).to_string();

    let output = shop.run(&["bulk", "is_visible", "true", &a, "999", &b]);
    assert_eq!(output.status.code(), Some(3));
    let (_, value) = shop.json(&["show", &a]);
    assert_eq!(value["flags"]["is_visible"], Value::Bool(false));

    let (code, report) = shop.json(&[
        "bulk", "is_visible", "true", &a, "999", &b, "--mode", "best_effort",
    ]);
    assert_eq!(code, 5);
    assert_eq!(report["updated"].as_array().unwrap().len(), 2);
    assert_eq!(report["missing"][0], 999);

    let (code, report) = shop.json(&["bulk", "is_visible", "false", &a, &b]);
    assert_eq!(code, 0);
    assert_eq!(report["mode"], "atomic");
}

#[test]
fn test_badge_summary_and_usage() {
    let shop = Shop::new();
    for i in 0..10 {
        if i < 4 {
            shop.create(&["discount", "--flag", "is_active"]);
        } else {
            shop.create(&["discount"]);
        }
    }
    let (_, badge) = shop.json(&["badge", "discount"]);
    assert_eq!(badge["label"], "4/10");
    assert_eq!(badge["tier"], "partial");

    let campaign = shop.create(&["campaign"]).to_string();
    let (_, summary) = shop.json(&["summary", "campaign"]);
    assert_eq!(summary["draft"], 1);

    let (_, usage) = shop.json(&["usage", &campaign, "--record", "order-1"]);
    assert_eq!(usage["usage_count"], 1);
    let (_, usage) = shop.json(&["usage", &campaign]);
    assert_eq!(usage["usage_count"], 1);

    let (_, events) = shop.json(&["events", "--limit", "1"]);
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["action"], "usage_recorded");
}

#[test]
fn test_replicate_clears_default() {
    let shop = Shop::new();
    let a = shop.create(&["address", "--scope", "9", "--flag", "is_default", "--flag", "is_billing"]);

    let (code, copy) = shop.json(&["replicate", &a.to_string()]);
    assert_eq!(code, 0);
    assert_ne!(copy["id"].as_i64().unwrap(), a);
    assert_eq!(copy["flags"]["is_default"], Value::Bool(false));
    assert_eq!(copy["flags"]["is_billing"], Value::Bool(true));
}

#[test]
fn test_total() {
    let shop = Shop::new();
    let output = shop.run(&[
        "total", "--subtotal", "10000", "--tax", "2100", "--shipping", "500", "--discount", "1000",
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("116.00"));

    let (_, value) = shop.json(&["total", "--subtotal", "100", "--discount", "500"]);
    assert_eq!(value["total"], 0);
}
