//! Live Interpreter Demo — microphone in, translated transcript out.
//!
//! Streams your speech to the translation service and prints the growing
//! transcript: `>>` lines are finalized sentences, `..` lines the in-flight
//! preview (each replaces the last).
//!
//! Set `GLOSSA_API_KEY` (or `GEMINI_API_KEY` / `GOOGLE_API_KEY`) in `.env`.
//! Languages come from the command line: `live_interpreter [input] [output]`,
//! defaulting to German in, English out.

use glossa_live::{AudioCapture, InterpreterSession, SessionConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let input_language = args.next().unwrap_or_else(|| "German".to_string());
    let output_language = args.next().unwrap_or_else(|| "English".to_string());

    info!(
        "Live Interpreter — {} in, {} out",
        input_language, output_language
    );
    for device in AudioCapture::list_input_devices()? {
        info!("Input device: {}", device);
    }
    info!("Press Ctrl+C to stop.\n");

    let config = SessionConfig::from_env(input_language, output_language)?;
    let mut session = InterpreterSession::new();
    session
        .connect(
            config,
            |segment| {
                if segment.is_final {
                    println!(">> {}", segment.text);
                } else {
                    println!(".. {}", segment.text);
                }
            },
            |error| eprintln!("session error: {error}"),
        )
        .await?;

    tokio::signal::ctrl_c().await?;
    session.disconnect();
    Ok(())
}
