use anyhow::Context;
use clap::Parser;
use wmbus_rs::{init_logger, log_error, log_info, AnalyzeOptions, Analyzer};

#[derive(Parser)]
#[command(name = "wmbus-analyze")]
#[command(about = "Decode a Wireless M-Bus telegram")]
struct Cli {
    /// Telegram as hex, starting with the L field
    telegram: String,

    /// Hex-encoded 16-byte AES key (32 hex chars)
    #[arg(short, long, default_value = "")]
    key: String,

    /// Print the summary as single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let options = AnalyzeOptions::from_key_hex(&cli.key).context("invalid --key")?;
    let analyzer = Analyzer::default();

    let analysis = match analyzer.analyze_hex(&cli.telegram, &options) {
        Ok(analysis) => analysis,
        Err(e) => {
            log_error(&format!("failed to decode telegram: {e}"));
            return Err(e).context("failed to decode telegram");
        }
    };
    log_info(&format!(
        "meter {} decoded by {}",
        analysis.telegram.meter_id_string(),
        analysis.driver
    ));

    if cli.compact {
        println!("{}", analysis.to_compact_string());
    } else {
        println!("{analysis}");
    }
    Ok(())
}
