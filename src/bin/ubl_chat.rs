//! Terminal front end for the assistant: one line in, one streamed answer out.

use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use ubl_assistant::client::{ChatClient, Transcript};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let endpoint = std::env::var("UBL_CHAT_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:3000/api/chat".to_string());
    let client = ChatClient::new(endpoint);
    let mut transcript = Transcript::new();

    if let Some(welcome) = transcript.messages().first() {
        println!("{} {}", "UBL:".green().bold(), welcome.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        print!("{} ", "UBL:".green().bold());
        std::io::stdout().flush()?;

        let mut printed = String::new();
        let bot_id = client
            .send(&mut transcript, line, |content| {
                printed.push_str(content);
                print!("{content}");
                let _ = std::io::stdout().flush();
            })
            .await;

        // an error event or failed request rewrites the entry after the fact
        if let Some(reply) = transcript.get(bot_id).filter(|m| m.text != printed) {
            if !printed.is_empty() {
                println!();
            }
            print!("{}", reply.text.yellow());
        }
        println!();
    }

    Ok(())
}
