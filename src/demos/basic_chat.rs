//! Question/answer loop straight over the backend
//!
//! No coordinator and no persona: every line is answered by an assistant that
//! may call its tools on its own (the date, and a prompt-backed summarizer).

use super::{DemoError, FAREWELL};
use crate::console::EXIT_COMMAND;
use crate::conversation::{ConversationLog, Message};
use crate::error::ConversationError;
use crate::llm::LlmService;
use crate::participant::{ChatAgent, Participant};
use crate::tools::{PromptTool, ToolRegistry};
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const QUESTION_PROMPT: &str = "Enter your question or type 'exit' to quit:";

const SUMMARIZE_TEMPLATE: &str = "\
Summarize the following text in at most three sentences, keeping names and numbers exact:
{{input}}";

/// The date tool plus a prompt function for summaries
pub fn assistant_tools(service: Arc<dyn LlmService>) -> ToolRegistry {
    let summarize = PromptTool::new(
        "summarize",
        "Summarize a piece of text in at most three sentences",
        SUMMARIZE_TEMPLATE,
        service,
    );
    ToolRegistry::standard().with(summarize)
}

pub async fn run<R, W>(service: Arc<dyn LlmService>, input: R, out: &mut W) -> Result<(), DemoError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tools = assistant_tools(service.clone());
    let assistant = ChatAgent::new("Assistant", "", service).with_tools(tools);
    let mut history = ConversationLog::new();
    let mut lines = input.lines();

    loop {
        out.write_all(format!("{QUESTION_PROMPT}\n").as_bytes()).await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == EXIT_COMMAND {
            break;
        }
        if line.is_empty() {
            continue;
        }

        history
            .append(Message::user(line))
            .map_err(ConversationError::from)?;

        let replies: Vec<Message> = assistant
            .produce(history.snapshot(), CancellationToken::new())
            .try_collect()
            .await?;

        for reply in replies {
            out.write_all(format!("{}\n", reply.content).as_bytes()).await?;
            history.append(reply).map_err(ConversationError::from)?;
        }
    }

    out.write_all(format!("{FAREWELL}\n").as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
