//! Writer/critic group chat
//!
//! The writer drafts, the critic reviews, round robin. The conversation ends
//! when the critic approves (never on its first review) or after the critic
//! has reviewed `max_iterations` times. Only an approval marks the post
//! complete.

use super::DemoError;
use crate::console::{format_message, DisplayStyle};
use crate::conversation::Message;
use crate::error::ConversationError;
use crate::llm::LlmService;
use crate::participant::ChatAgent;
use crate::runtime::Coordinator;
use crate::termination::{ContentMatch, IterationCap, TerminationPolicy, TerminationPolicyExt};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const WRITER_NAME: &str = "WriterAgent";
pub const CRITIC_NAME: &str = "CriticAgent";
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const APPROVAL_MARKER: &str = "approve";

pub const DEFAULT_TOPIC: &str = "Please write a blog post article about the Global AI Barcelona event. \
The article should be engaging and informative, include a captivating title, an introduction, \
main content sections, and a conclusion tailored for a tech-savvy audience.";

const CRITIC_INSTRUCTIONS: &str = "\
You are a seasoned critic who has reviewed blog posts for many years.
Judge the article for clarity, engagement, factual accuracy and style.
Start every review with the iteration number and the article you are reviewing.
If the article meets your high bar, end your review with the word \"approve\".
Otherwise give short, concrete suggestions for improvement.
On your first review always ask for improvements, even if the article already looks perfect.";

const WRITER_INSTRUCTIONS: &str = "\
You are an experienced writer covering technology and events.
Write an engaging, informative blog post about the topic you are given.
Include a captivating title, a short introduction, main sections and a conclusion.
Deliver the complete draft in a single response, with creativity and clarity throughout.
When the critic sends feedback, revise the article to address it.";

/// Approval by the critic (ignored on its first review) or the review cap
pub fn termination_policy(max_iterations: u32) -> impl TerminationPolicy {
    ContentMatch::new(APPROVAL_MARKER)
        .scoped_to([CRITIC_NAME])
        .min_turns(2, [CRITIC_NAME])
        .or(IterationCap::new(max_iterations).counting([CRITIC_NAME]))
}

pub fn coordinator(
    service: Arc<dyn LlmService>,
    topic: &str,
    max_iterations: u32,
) -> Result<Coordinator, ConversationError> {
    let writer = ChatAgent::new(WRITER_NAME, WRITER_INSTRUCTIONS, service.clone());
    let critic = ChatAgent::new(CRITIC_NAME, CRITIC_INSTRUCTIONS, service);

    Coordinator::builder()
        .participant(writer)
        .participant(critic)
        .policy(termination_policy(max_iterations))
        .seed(Message::user(topic))
        .build()
}

/// Run the group chat, printing every message. Returns whether the policy
/// completed the conversation.
pub async fn run<W>(
    service: Arc<dyn LlmService>,
    topic: &str,
    max_iterations: u32,
    out: &mut W,
) -> Result<bool, DemoError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut chat = coordinator(service, topic, max_iterations)?;

    for message in chat.log().iter() {
        write_message(out, message).await?;
    }

    loop {
        let outcome = chat.step().await?;
        for message in &outcome.messages {
            write_message(out, message).await?;
        }
        if outcome.stop {
            break;
        }
    }

    let complete = chat.is_complete();
    out.write_all(format!("\n[IS COMPLETED: {complete}]\n").as_bytes())
        .await?;
    out.flush().await?;
    Ok(complete)
}

async fn write_message<W>(out: &mut W, message: &Message) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(line) = format_message(DisplayStyle::Transcript, message) {
        out.write_all(format!("{line}\n").as_bytes()).await?;
    }
    out.flush().await
}
