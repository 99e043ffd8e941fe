//! Single playful agent chatting with the console user
//!
//! Two participants take turns, the human and the minion, with no termination
//! policy: the session ends when the user types `exit`.

use super::{DemoError, FAREWELL};
use crate::console::{format_message, ConsoleUser, DisplayStyle, SharedWriter};
use crate::llm::LlmService;
use crate::participant::ChatAgent;
use crate::runtime::Coordinator;
use crate::state_machine::StopReason;
use crate::termination::Never;
use crate::tools::{CurrentDateTool, PromptTool, ToolRegistry};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const MINION_NAME: &str = "Minion";

const GREETING: &str = "Enter a message to send to the agent or type 'exit' to quit:";

const MINION_INSTRUCTIONS: &str = "\
You are a cheerful, mischievous minion whose purpose is to entertain your master, the user.
* Keep the conversation light and funny.
* Speak Minionese: mix gibberish with words from many languages, say \"banana\" a lot and laugh like a minion.
* Meet everything the user says with enthusiasm and try to lift their mood.
* If asked something serious, drift back to being playful, maybe with a \"Banana?\" or a giggle.
* Answer in the language you are spoken to.
* Stay loyal to your master.
* Even while joking, make sure the answer actually makes sense.
* Minions are not clever: do not attempt complex tasks or give serious advice.
* Minions do not talk much. One or two sentences is plenty.";

const PLUGIN_INSTRUCTIONS: &str = "\
* When asked about the date or day, call the current_date tool instead of guessing.
* To sound more like a minion, you may pass a sentence through the minionese tool.";

/// Build the minion, optionally with its tools
pub fn minion_agent(service: Arc<dyn LlmService>, plugins: bool) -> ChatAgent {
    if !plugins {
        return ChatAgent::new(MINION_NAME, MINION_INSTRUCTIONS, service);
    }

    let minionese = PromptTool::new(
        "minionese",
        "Rewrite a sentence in playful Minionese",
        "Rewrite the following in Minionese, keep it short and silly: {{input}}",
        service.clone(),
    )
    .with_max_tokens(200);
    let tools = ToolRegistry::new().with(CurrentDateTool).with(minionese);

    ChatAgent::new(
        MINION_NAME,
        format!("{MINION_INSTRUCTIONS}\n{PLUGIN_INSTRUCTIONS}"),
        service,
    )
    .with_tools(tools)
}

/// Run the session. The user's prompt and the minion's replies share `out`.
pub async fn run<R, W>(
    service: Arc<dyn LlmService>,
    plugins: bool,
    input: R,
    out: W,
) -> Result<(), DemoError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let out: SharedWriter<W> = Arc::new(Mutex::new(out));
    let cancel = CancellationToken::new();
    let user = ConsoleUser::new(input, cancel.clone()).prompt_to(Arc::clone(&out));
    let mut coordinator = Coordinator::builder()
        .participant(user)
        .participant(minion_agent(service, plugins))
        .policy(Never)
        .cancel_token(cancel)
        .build()?;

    write_line(&out, GREETING).await?;

    loop {
        match coordinator.step().await {
            Ok(outcome) => {
                for message in &outcome.messages {
                    if let Some(line) = format_message(DisplayStyle::Chat, message) {
                        write_line(&out, &line).await?;
                    }
                }
            }
            Err(e) if matches!(coordinator.stop_reason(), Some(StopReason::Cancelled)) => {
                tracing::debug!(error = %e, "Session ended by user");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    write_line(&out, FAREWELL).await?;
    Ok(())
}

async fn write_line<W>(out: &SharedWriter<W>, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = out.lock().await;
    out.write_all(format!("{line}\n").as_bytes()).await?;
    out.flush().await
}
