//! Scripted conversation example
//!
//! Runs a small shell script that asks two questions and answers them with
//! an ordered script.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example scripted_shell -- --name Ferris
//! ```

use std::env;
use std::process::Stdio;
use std::time::Duration;

use prompter::{Conversation, MatcherSet, Reply};
use tokio::process::Command;

const SCRIPT: &str = r#"
printf 'What is your name? '
read name
printf 'Hello %s. Continue? [y/n] ' "$name"
read answer
echo "answer=$answer"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let name = parse_name();

    println!("=== Prompter Scripted Shell Example ===\n");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(SCRIPT)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;

    let script = MatcherSet::ordered()
        .exact("What is your name? ", format!("{name}\n"))
        .regex(
            r"Hello .*\. Continue\? \[y/n\] ",
            Reply::with(|prompt: &str| {
                println!("  prompt: {prompt:?}");
                "y\n".to_string()
            }),
        )?
        .build();

    let mut conversation = Conversation::from_command(&mut child, script)?;
    let Some(mut handle) = conversation.start() else {
        return Ok(());
    };

    handle.wait_timeout(Duration::from_secs(10)).await?;
    let status = child.wait().await?;
    println!("\nShell exited with {status}");

    Ok(())
}

fn parse_name() -> String {
    let args: Vec<String> = env::args().collect();
    let mut name = "Ferris".to_string();

    let mut i = 1;
    while i < args.len() {
        if matches!(args[i].as_str(), "--name" | "-n") && i + 1 < args.len() {
            i += 1;
            name = args[i].clone();
        }
        i += 1;
    }
    name
}
