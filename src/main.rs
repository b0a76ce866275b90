//! RelayBot - Entry Point

use relaybot::config::{log_filter, LogFormat};
use relaybot::Config;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("RelayBot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: relaybot");
        println!();
        println!("Required environment variables:");
        println!("  SLACK_SIGNING_SECRET   Slack request signing secret");
        println!("  SLACK_BOT_TOKEN        Slack bot token");
        println!("  OPENAI_API_KEY         OpenAI API key");
        println!("  PORT1                  Slack events listener port");
        println!("  PORT2                  Status/debug listener port");
        println!();
        println!("Optional:");
        println!("  BOT_MEMBER_ID          Bot member id (default: from auth.test)");
        println!("  MY_MEMBER_ID           Administrator member id");
        println!("  TEST_CHANNEL_ID        Channel for the startup test message");
        println!("  OPENAI_MODEL           Completion model (default: gpt-4)");
        println!("  LOG_FORMAT             pretty | json");
        println!("  RUST_LOG               Log filter directives (default: info)");
        return Ok(());
    }

    let config = Config::from_env()?;

    let env_filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());

    match config.log_format {
        LogFormat::Pretty => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    info!("RelayBot v{}", env!("CARGO_PKG_VERSION"));

    relaybot::bot::run_bot(config).await
}
