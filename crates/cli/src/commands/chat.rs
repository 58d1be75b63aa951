//! `dekomposit chat`: interactive or single-message chat mode.

use std::io::Write;

use dekomposit_agent::Agent;
use dekomposit_config::AppConfig;
use dekomposit_core::language::Language;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

pub async fn run(message: Option<String>, target: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.llm.resolve_api_key().is_none() {
        eprintln!();
        eprintln!("  WARNING: no API key found in ${}.", config.llm.api_key_env);
        eprintln!("  Set it, or point CURRENT_API_KEY at the variable that holds your key.");
        eprintln!();
    }

    let agent = Agent::from_config(&config).map_err(|e| format!("Failed to start agent: {e}"))?;

    if let Some(raw) = target {
        let language = Language::parse(&raw).ok_or_else(|| {
            format!("Unsupported target language '{raw}'. Supported: {}", Language::codes().join(", "))
        })?;
        agent.set_target_language(Some(language));
    }

    if let Some(msg) = message {
        reply(&agent, &msg, "", &config.agent.error_message).await?;
        return Ok(());
    }

    println!();
    println!("  dekomposit: interactive mode");
    println!();
    println!("  Provider:  {}", config.llm.provider);
    println!("  Model:     {}", config.llm.model);
    if let Some(lang) = agent.target_language() {
        println!("  Target:    {}", lang.english_name());
    }
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        println!();
        reply(&agent, line, "  Assistant > ", &config.agent.error_message).await?;
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Stream one reply to stdout.
async fn reply(
    agent: &Agent,
    text: &str,
    prefix: &str,
    error_message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel::<String>(32);
    let chunk_prefix = prefix.to_string();

    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        let mut started = false;
        while let Some(chunk) = rx.recv().await {
            if !started {
                let _ = write!(stdout, "{chunk_prefix}");
                started = true;
            }
            let _ = write!(stdout, "{chunk}");
            let _ = stdout.flush();
        }
        if started {
            let _ = writeln!(stdout);
        }
    });

    let result = agent.stream_reply(text, tx).await;
    printer.await?;
    if let Err(e) = result {
        warn!(kind = e.kind(), error = %e, "Turn failed");
        println!("{prefix}{error_message}");
    }
    Ok(())
}
