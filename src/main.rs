//! agent-chat - console demos for multi-agent conversations
//!
//! Talks to Azure OpenAI (or OpenAI) configured through the environment.

use agent_chat::demos::{ask, basic_chat, blog_post, minion};
use agent_chat::llm::LlmConfig;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser, Debug)]
#[command(name = "agent-chat", version)]
#[command(about = "Console demos for chat agents and a writer/critic group chat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one prompt and print the answer
    Ask {
        /// Prompt text (default: a short joke)
        prompt: Option<String>,
    },
    /// Question/answer loop with automatic tool calls
    Chat,
    /// Chat with a playful minion agent
    Minion {
        /// Give the minion its tools (current date, minionese)
        #[arg(long)]
        plugins: bool,
    },
    /// Writer and critic agents collaborate on a blog post
    Blog {
        /// What the writer should write about
        #[arg(long, default_value = blog_post::DEFAULT_TOPIC)]
        topic: String,
        /// Maximum number of critic reviews
        #[arg(long, default_value_t = blog_post::DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agent_chat=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    println!("Hello, agents!");

    let config = LlmConfig::from_env()?;
    let service = config.build_service()?;
    tracing::info!(model = %service.model_id(), "LLM backend initialized");

    let mut stdout = tokio::io::stdout();
    match cli.command {
        Commands::Ask { prompt } => {
            let prompt = prompt.unwrap_or_else(|| ask::DEFAULT_PROMPT.to_string());
            let answer = ask::ask(service.as_ref(), &prompt).await?;
            stdout.write_all(format!("{answer}\n").as_bytes()).await?;
        }
        Commands::Chat => {
            let stdin = BufReader::new(tokio::io::stdin());
            basic_chat::run(service, stdin, &mut stdout).await?;
        }
        Commands::Minion { plugins } => {
            let stdin = BufReader::new(tokio::io::stdin());
            minion::run(service, plugins, stdin, tokio::io::stdout()).await?;
        }
        Commands::Blog {
            topic,
            max_iterations,
        } => {
            let complete = blog_post::run(service, &topic, max_iterations, &mut stdout).await?;
            tracing::info!(complete, "Blog post workflow finished");
        }
    }
    stdout.flush().await?;

    Ok(())
}
