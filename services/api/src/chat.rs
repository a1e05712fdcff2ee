use crate::infra::{build_assistant, build_gateway, load_cli_config, model_config};
use clap::Args;
use loan_risk::assessment::conversation::render;
use loan_risk::assessment::{ChatCompletionClient, ConversationEngine, ConversationState};
use loan_risk::error::AppError;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Args, Debug)]
pub(crate) struct ChatArgs {
    /// Score with this artifact instead of the configured one
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Empty,
    Quit,
    Reset,
    Message(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => ChatCommand::Empty,
            "/quit" | "/exit" => ChatCommand::Quit,
            "/reset" => ChatCommand::Reset,
            text => ChatCommand::Message(text),
        }
    }
}

/// Runs one turn. A rejected turn leaves the conversation where it was and
/// answers with the failure text instead.
async fn exchange<C>(
    engine: &ConversationEngine<C>,
    state: ConversationState,
    input: &str,
) -> (ConversationState, String)
where
    C: ChatCompletionClient + ?Sized + 'static,
{
    match engine.process_turn(state, input).await {
        Ok(turn) => (turn.state, turn.report.reply),
        Err(failure) => {
            let reply = render::failure_message(&failure.error);
            (failure.state, reply)
        }
    }
}

pub(crate) async fn run_chat(args: ChatArgs) -> Result<(), AppError> {
    let config = load_cli_config()?;
    let gateway = build_gateway(&model_config(&config, args.model));
    let assistant = build_assistant(&config.assistant)?;
    let engine = ConversationEngine::new(
        assistant,
        gateway,
        config.model.policy(),
        config.assistant.timeout,
    );

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = ConversationState::new();

    stdout
        .write_all(format!("{}\n(/reset starts over, /quit leaves)\n", render::WELCOME).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match ChatCommand::parse(&line) {
            ChatCommand::Empty => continue,
            ChatCommand::Quit => break,
            ChatCommand::Reset => {
                state.reset();
                render::WELCOME.to_string()
            }
            ChatCommand::Message(text) => {
                let (next, reply) = exchange(&engine, state, text).await;
                state = next;
                reply
            }
        };
        stdout.write_all(format!("\n{reply}\n").as_bytes()).await?;
    }

    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loan_risk::assessment::bridge::ChatRequest;
    use loan_risk::assessment::{
        AssessmentPhase, ChatCompletion, ClassifierGateway, LabelFraming, SchemaPolicy,
        ServiceError,
    };
    use std::sync::Arc;
    use std::time::Duration;

    struct OfflineClient;

    #[async_trait]
    impl ChatCompletionClient for OfflineClient {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, ServiceError> {
            Err(ServiceError::Transport("connection refused".to_string()))
        }
    }

    fn offline_engine() -> ConversationEngine<OfflineClient> {
        let gateway = Arc::new(ClassifierGateway::from_path(
            "/nonexistent/loan-risk/model.json",
            LabelFraming::DefaultRisk,
        ));
        ConversationEngine::new(
            Arc::new(OfflineClient),
            gateway,
            SchemaPolicy::default(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn commands_are_recognised() {
        assert_eq!(ChatCommand::parse("   "), ChatCommand::Empty);
        assert_eq!(ChatCommand::parse("/quit"), ChatCommand::Quit);
        assert_eq!(ChatCommand::parse(" /reset "), ChatCommand::Reset);
        assert_eq!(
            ChatCommand::parse(" she is 35 "),
            ChatCommand::Message("she is 35")
        );
    }

    #[tokio::test]
    async fn declining_is_answered_locally() {
        let (state, reply) = exchange(&offline_engine(), ConversationState::new(), "no").await;
        assert_eq!(reply, render::DECLINED);
        assert_eq!(state.phase(), AssessmentPhase::AwaitingConsent);
    }

    #[tokio::test]
    async fn outage_keeps_the_conversation_unchanged() {
        let (state, reply) = exchange(&offline_engine(), ConversationState::new(), "yes").await;
        assert_eq!(state, ConversationState::new());
        assert!(reply.contains("send your message again"));
    }
}
