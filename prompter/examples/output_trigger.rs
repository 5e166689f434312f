//! Output trigger example
//!
//! Watches a command that prints progress lines and counts the warnings it
//! emits, while keeping a copy of everything it printed.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=prompter=debug cargo run --example output_trigger
//! ```

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use prompter::process::StreamWindows;
use prompter::{Action, CommandIo, Encoding, MatcherSet, ProcessStreams, Trigger};
use tokio::process::Command;

const SCRIPT: &str = r#"
for step in 1 2 3 4 5; do
    echo "step $step"
    if [ $((step % 2)) -eq 1 ]; then echo "warning: odd step $step"; fi
done
echo "done" >&2
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Prompter Output Trigger Example ===\n");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(SCRIPT)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut streams = ProcessStreams::attach(&mut child, StreamWindows::default().stdout(64 * 1024));

    let warnings = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&warnings);
    let alerts = MatcherSet::unordered()
        .regex(
            r"warning: .*",
            Action::from_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )?
        .build();

    let stdout = streams.take_stdout().ok_or("stdout already taken")?;
    let mut trigger = Trigger::new(stdout, alerts);
    let handle = trigger.start().ok_or("trigger already started")?;

    let status = child.wait().await?;
    streams.finish().await?;
    handle.await?;

    let output = streams.output(Encoding::Utf8)?;
    println!("Exit status: {status}");
    println!("Warnings seen: {}", warnings.load(Ordering::SeqCst));
    println!("Captured stdout:\n{}", output.stdout);
    println!("Captured stderr:\n{}", output.stderr);

    Ok(())
}
