use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tribunal_core::pipeline::error_body;
use tribunal_core::stream::StreamPayload;
use tribunal_core::{Pipeline, StreamBus, StreamEvent};

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Multi-rubric content scoring over an LLM completion service"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a submission and print the final verdict as JSON
    Score(ScoreArgs),
}

#[derive(Args)]
struct ScoreArgs {
    /// File containing the submission; reads stdin when omitted
    file: Option<PathBuf>,
    /// Render stage progress events on stderr while the pipeline runs
    #[arg(long)]
    stream: bool,
    /// File with a reference "top-10" brief, enabling diversity calibration
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Compact JSON output instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            // Entry-point degrade rule: an error body, not a bare failure.
            println!("{}", error_body(&err));
            1
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Score(args) => score(args).await,
    }
}

async fn score(args: ScoreArgs) -> anyhow::Result<()> {
    let content = read_content(args.file.as_deref())?;
    tracing::debug!(bytes = content.len(), "loaded submission");
    let reference = args
        .reference
        .as_deref()
        .map(std::fs::read_to_string)
        .transpose()?;

    let pipeline = Pipeline::from_env();
    let verdict = if args.stream {
        let (bus, mut rx) = StreamBus::new();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                render_event(&event);
            }
        });
        let verdict = pipeline.run(&content, &bus, reference.as_deref()).await;
        drop(bus);
        printer.await?;
        verdict
    } else {
        pipeline
            .run(&content, &StreamBus::sink(), reference.as_deref())
            .await
    };

    let out = if args.compact {
        serde_json::to_string(&verdict)?
    } else {
        serde_json::to_string_pretty(&verdict)?
    };
    println!("{out}");
    Ok(())
}

fn read_content(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    anyhow::ensure!(!content.trim().is_empty(), "submission is empty");
    Ok(content)
}

/// Progress goes to stderr so stdout stays clean verdict JSON.
fn render_event(event: &StreamEvent) {
    match &event.payload {
        StreamPayload::Text(text) => {
            eprintln!("[{}] {} chars", event.channel, text.chars().count());
        }
        StreamPayload::Json(value) => {
            eprintln!("[{}] {}", event.channel, value);
        }
    }
}
