use super::{Env, Exit};
use recall_core::Config;
use serde_json::Value;

/// Host event -> recall hook command
const HOOKS: &[(&str, &str)] = &[
    ("SessionStart", "recall hook:session-start"),
    ("UserPromptSubmit", "recall hook:capture"),
    ("PostToolUse", "recall hook:capture"),
    ("PostToolUseFailure", "recall hook:capture"),
    ("SessionEnd", "recall hook:session-end"),
];

pub fn run() -> anyhow::Result<Exit> {
    let env = Env::load()?;
    if !env.paths.home_claude.exists() {
        eprintln!("recall: ~/.claude directory not found. Create it or ensure Claude Code is installed.");
        return Ok(Exit::Refused);
    }

    install(&env)?;

    println!("✓ Installed recall hooks in {}", env.paths.settings_path().display());
    println!("\nHooks added:");
    for (event, command) in HOOKS {
        println!("  - {event}: {command}");
    }
    println!("\nStore: {}", env.store_path().display());
    Ok(Exit::Ok)
}

/// Register hooks, write a default config if none exists, create the store
pub fn install(env: &Env) -> anyhow::Result<()> {
    let settings_path = env.paths.settings_path();
    let mut settings: Value = if settings_path.exists() {
        let content = std::fs::read_to_string(&settings_path)?;
        serde_json::from_str(&content)?
    } else {
        serde_json::json!({})
    };

    if settings.get("hooks").is_none() {
        settings["hooks"] = serde_json::json!({});
    }
    for (event_name, command) in HOOKS {
        add_hook_if_missing(&mut settings, event_name, command)?;
    }

    let json = serde_json::to_string_pretty(&settings)?;
    recall_telemetry::atomic_write(&settings_path, json.as_bytes())?;

    let config_path = env.paths.config_path();
    if !config_path.exists() {
        let json = serde_json::to_string_pretty(&Config::new())?;
        recall_telemetry::atomic_write(&config_path, json.as_bytes())?;
    }

    env.open_store()?;
    Ok(())
}

fn add_hook_if_missing(settings: &mut Value, event_name: &str, command: &str) -> anyhow::Result<()> {
    let hooks = settings
        .get_mut("hooks")
        .and_then(|h| h.as_object_mut())
        .ok_or_else(|| anyhow::anyhow!("hooks is not an object"))?;

    let event_array = hooks
        .entry(event_name)
        .or_insert_with(|| serde_json::json!([]));

    let event_groups = event_array
        .as_array_mut()
        .ok_or_else(|| anyhow::anyhow!("event {} is not an array", event_name))?;

    let already_exists = event_groups.iter().any(|group| {
        group
            .get("hooks")
            .and_then(|h| h.as_array())
            .is_some_and(|hooks_array| {
                hooks_array.iter().any(|hook| {
                    hook.get("command")
                        .and_then(|c| c.as_str())
                        .is_some_and(|cmd| cmd.starts_with("recall "))
                })
            })
    });

    if !already_exists {
        event_groups.push(serde_json::json!({
            "matcher": "",
            "hooks": [
                {
                    "type": "command",
                    "command": command
                }
            ]
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::scratch_env;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_init_creates_hooks_in_global_settings() {
        let original_home = std::env::var("HOME").unwrap();
        let temp = TempDir::new().unwrap();
        let claude_dir = temp.path().join(".claude");
        fs::create_dir_all(&claude_dir).unwrap();

        std::env::set_var("HOME", temp.path());
        std::env::remove_var(recall_telemetry::DB_ENV);
        std::env::remove_var(recall_telemetry::CONFIG_ENV);
        let result = run();
        std::env::set_var("HOME", &original_home);

        assert_eq!(result.unwrap(), Exit::Ok);
        let settings_content = fs::read_to_string(claude_dir.join("settings.json")).unwrap();
        assert!(settings_content.contains("recall hook:session-start"));
        assert!(settings_content.contains("recall hook:session-end"));
        assert!(claude_dir.join("recall.json").exists());
        assert!(claude_dir.join("recall/recall.db").exists());
    }

    #[test]
    #[serial]
    fn test_init_without_claude_dir_is_refused() {
        let original_home = std::env::var("HOME").unwrap();
        let temp = TempDir::new().unwrap();

        std::env::set_var("HOME", temp.path());
        let result = run();
        std::env::set_var("HOME", &original_home);

        assert_eq!(result.unwrap(), Exit::Refused);
    }

    #[test]
    fn test_install_preserves_existing_hooks_and_config() {
        let (_temp, env) = scratch_env();
        let existing = serde_json::json!({
            "hooks": {
                "UserPromptSubmit": [
                    {"matcher": "", "hooks": [{"type": "command", "command": "custom-hook"}]}
                ]
            }
        });
        fs::write(env.paths.settings_path(), existing.to_string()).unwrap();
        fs::write(env.paths.config_path(), r#"{"retention": {"diagnostics_keep": 10}}"#).unwrap();

        install(&env).unwrap();
        install(&env).unwrap();

        let settings: Value =
            serde_json::from_str(&fs::read_to_string(env.paths.settings_path()).unwrap()).unwrap();
        let groups = settings["hooks"]["UserPromptSubmit"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["hooks"][0]["command"], "custom-hook");
        assert_eq!(groups[1]["hooks"][0]["command"], "recall hook:capture");
        assert_eq!(settings["hooks"]["SessionEnd"].as_array().unwrap().len(), 1);

        let config = fs::read_to_string(env.paths.config_path()).unwrap();
        assert!(config.contains("\"diagnostics_keep\": 10"));
    }

    #[test]
    fn test_add_hook_skips_if_exists() {
        let mut settings = serde_json::json!({
            "hooks": {
                "SessionStart": [
                    {"matcher": "", "hooks": [{"type": "command", "command": "recall hook:session-start"}]}
                ]
            }
        });

        add_hook_if_missing(&mut settings, "SessionStart", "recall hook:session-start").unwrap();

        let hooks = settings["hooks"]["SessionStart"].as_array().unwrap();
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_add_hook_rejects_malformed_settings() {
        let mut settings = serde_json::json!({"hooks": {"SessionStart": "oops"}});
        assert!(add_hook_if_missing(&mut settings, "SessionStart", "recall hook:session-start").is_err());
    }
}
