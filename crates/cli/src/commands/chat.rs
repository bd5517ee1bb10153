//! Interactive terminal session against the full dispatch pipeline.
//!
//! The session keeps the whole transcript, replies included with their
//! memory, so multi-turn responders behave exactly as they do behind the
//! HTTP surface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use brewline_agent::{standard_pipeline, DialogMessage};
use brewline_core::catalog::CatalogStore;
use brewline_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let require_file = config_path.is_some();
    let options = LoadOptions { config_path, require_file, ..LoadOptions::default() };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("chat", "config", error.to_string(), 2),
    };
    let catalog = match CatalogStore::load(&config.catalog) {
        Ok(catalog) => Arc::new(catalog),
        Err(error) => return CommandResult::failure("chat", "catalog", error.to_string(), 2),
    };
    let pipeline = match standard_pipeline(&config, catalog) {
        Ok(pipeline) => pipeline,
        Err(error) => return CommandResult::failure("chat", "client", error.to_string(), 2),
    };
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("chat", "runtime", error.to_string(), 1),
    };

    println!("brewline chat (type `exit` to quit)");

    let stdin = io::stdin();
    let mut history: Vec<DialogMessage> = Vec::new();
    let mut turns = 0usize;

    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        history.push(DialogMessage::user(line));
        match runtime.block_on(pipeline.handle(&history)) {
            Ok(reply) => {
                println!("shop> {}", reply.content);
                history.push(reply.into_dialog_message());
                turns += 1;
            }
            Err(error) => {
                // Drop the failed turn so the transcript stays one reply
                // per user message.
                history.pop();
                println!("error> {error}");
            }
        }
    }

    CommandResult::success("chat", format!("session ended after {turns} turns"))
}
