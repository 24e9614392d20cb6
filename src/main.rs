use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use clap::Parser;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voice_interview::core::audio::device::CpalBackend;
use voice_interview::{
    AppConfig, InterviewSession, OpenAIRealtime, SessionEvent, SessionStatus,
};

/// Voice Interview - Realtime spoken interview with live transcript
#[derive(Parser, Debug)]
#[command(name = "voice-interview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the exported transcript (overrides configuration)
    #[arg(short = 'o', long = "transcript-dir", value_name = "DIR")]
    transcript_dir: Option<PathBuf>,

    /// Do not write a transcript when the interview ends
    #[arg(long = "no-export")]
    no_export: bool,
}

/// Terminal rendering of the live transcript.
#[derive(Default)]
struct Console {
    /// An assistant line is open and receiving fragments
    assistant_line: bool,
    last_question: Option<String>,
}

impl Console {
    fn render(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected => println!("Connected. Speak when you are ready; press Ctrl-C to end."),
            SessionEvent::Disconnected => {
                self.close_line();
                println!("Disconnected.");
            }
            SessionEvent::AssistantText(text) => {
                if !self.assistant_line {
                    print!("Interviewer: ");
                    self.assistant_line = true;
                }
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            SessionEvent::UserTranscript(text) => {
                self.close_line();
                println!("You: {text}");
            }
            SessionEvent::Interrupted => {
                if self.assistant_line {
                    print!(" [interrupted]");
                }
                self.close_line();
            }
            SessionEvent::Error(error) => {
                self.close_line();
                eprintln!("Error: {error}");
            }
            SessionEvent::AudioData(_) => {}
        }
    }

    fn show_question(&mut self, question: Option<&str>) {
        let Some(question) = question else {
            return;
        };
        if self.last_question.as_deref() != Some(question) {
            self.last_question = Some(question.to_string());
            tracing::debug!("Current question: {}", question);
        }
    }

    fn close_line(&mut self) {
        if self.assistant_line {
            println!();
            self.assistant_line = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let api_key = config.api_key()?.to_string();
    let transcript_dir = cli
        .transcript_dir
        .clone()
        .unwrap_or_else(|| config.transcript_dir.clone());

    info!(
        "Starting interview with model {} and voice {}",
        config.model, config.voice
    );

    let client = OpenAIRealtime::new(config.realtime_config(), Arc::new(CpalBackend));
    let mut interview = InterviewSession::new(client);
    interview.start(&api_key).await?;

    let mut console = Console::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupt received, ending interview");
                break;
            }

            event = interview.next_event() => {
                let Some(event) = event else { break };
                console.render(&event);
                interview.handle_event(&event, OffsetDateTime::now_utc());
                console.show_question(interview.conversation().current_question());
                if matches!(interview.status(), SessionStatus::Ended | SessionStatus::Idle) {
                    break;
                }
            }

            _ = ticker.tick() => {
                let now = OffsetDateTime::now_utc();
                interview.tick(now);
                if interview.status() == SessionStatus::Active {
                    tracing::debug!(
                        "Elapsed {} ({})",
                        interview.elapsed_display(now),
                        if interview.conversation().is_assistant_speaking() {
                            "interviewer speaking"
                        } else {
                            "listening"
                        }
                    );
                }
            }
        }
    }

    console.close_line();

    // The connection dropped before the provider acknowledged the session;
    // there is no interview to export.
    if interview.status() == SessionStatus::Idle {
        let reason = interview
            .session()
            .last_error()
            .unwrap_or("connection closed")
            .to_string();
        bail!("Interview did not start: {}", reason);
    }

    let now = OffsetDateTime::now_utc();
    let history = interview.end(now).await?;
    println!(
        "Interview ended after {} with {} messages.",
        interview.elapsed_display(now),
        history.messages.len()
    );

    if !cli.no_export {
        let path = interview.export(&transcript_dir, now).await?;
        println!("Transcript saved to {}", path.display());
    }

    Ok(())
}
