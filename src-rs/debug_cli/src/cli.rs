use std::env;

use crate::models::CLIConfig;

const DEFAULT_URL: &str = "http://localhost:8001";
const DEFAULT_USER: &str = "debug-cli";

/// Environment first (`DEV_AGENT_*`), then command-line flags on top.
pub fn parse_config() -> CLIConfig {
    let mut cfg = CLIConfig {
        base_url: env_setting("DEV_AGENT_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
        user_id: env_setting("DEV_AGENT_USER").unwrap_or_else(|| DEFAULT_USER.to_string()),
        project_id: env_setting("DEV_AGENT_PROJECT"),
        debug: env_setting("DEV_AGENT_DEBUG").and_then(|raw| raw.parse().ok()).unwrap_or(false),
        token: env_setting("DEV_AGENT_TOKEN"),
    };
    apply_flags(&mut cfg, env::args().skip(1));
    cfg
}

fn apply_flags(cfg: &mut CLIConfig, args: impl Iterator<Item = String>) {
    let mut args = args.peekable();
    while let Some(flag) = args.next() {
        if flag == "--debug" {
            cfg.debug = true;
            continue;
        }
        let Some(value) = args.next_if(|next| !next.starts_with("--")) else {
            continue;
        };
        match flag.as_str() {
            "--base" => cfg.base_url = value,
            "--user" => cfg.user_id = value,
            "--project" => cfg.project_id = Some(value),
            "--token" => cfg.token = Some(value),
            _ => eprintln!("ignoring unknown flag {}", flag),
        }
    }
}

fn env_setting(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
