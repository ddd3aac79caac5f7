mod cli;
mod client;
mod models;
mod repl;
mod render;

use client::HTTPClient;
use repl::REPL;

fn main() {
    let config = cli::parse_config();
    let client = HTTPClient::new(&config.base_url, config.token.clone());
    if let Err(err) = client.health() {
        render::error(&format!("dev-agent at {} is not answering: {}", config.base_url, err));
    }
    REPL::new(config, client).run();
}
