//! Shopdesk Control - CLI for entity flags, status lifecycles and badges

use clap::Parser;
use owo_colors::OwoColorize;
use std::process;

use shopdeskctl::cli::Cli;
use shopdeskctl::commands;
use shopdeskctl::errors::exit_code_for;

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    match commands::run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            let code = exit_code_for(&err);
            if json {
                let body = serde_json::json!({
                    "ok": false,
                    "exit_code": code,
                    "error": format!("{:#}", err),
                });
                println!("{}", body);
            } else {
                eprintln!("{} {:#}", "[ERROR]".bright_red(), err);
            }
            process::exit(code);
        }
    }
}
