use std::io::{self, Write};
use std::sync::Arc;

use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use zhifa_core::persona::APP_NAME;
use zhifa_core::{
    ConversationEvent, ConversationOrchestrator, LegalDomain, StreamingClient, TurnOutcome,
};

use crate::command::{Input, parse_line};
use crate::render::{Renderer, prompt_label, write_domains};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to load settings on `{stage}`: {source}"))]
    Settings {
        stage: &'static str,
        source: zhifa_core::ChatError,
    },
    #[snafu(display("failed to set up the chat client on `{stage}`: {source}"))]
    Client {
        stage: &'static str,
        source: zhifa_core::ChatError,
    },
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: io::Error,
    },
}

pub struct ChatApp {
    orchestrator: ConversationOrchestrator,
    events: mpsc::UnboundedReceiver<ConversationEvent>,
    renderer: Renderer,
    domain: LegalDomain,
}

impl ChatApp {
    pub fn new(client: StreamingClient, domain: LegalDomain) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            orchestrator: ConversationOrchestrator::new(Arc::new(client)).with_event_sink(sender),
            events,
            renderer: Renderer::new(),
            domain,
        }
    }

    /// Answers one question and reports whether the turn succeeded.
    pub async fn ask_once(&mut self, question: &str) -> Result<bool, AppError> {
        let outcome = self.run_turn(question).await?;
        Ok(matches!(outcome, TurnOutcome::Completed { .. }))
    }

    pub async fn run_interactive(&mut self) -> Result<(), AppError> {
        self.orchestrator.greet();
        self.drain_events()?;
        {
            let mut out = io::stdout().lock();
            writeln!(
                out,
                "输入问题开始咨询。/domains 查看领域，/domain <slug> 切换领域，/quit 退出。\n"
            )
            .context(WriteOutputSnafu { stage: "print-help" })?;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.print_prompt()?;
            let Some(line) = lines
                .next_line()
                .await
                .context(ReadInputSnafu { stage: "read-line" })?
            else {
                break;
            };

            match parse_line(&line) {
                Input::Empty => {}
                Input::Quit => break,
                Input::ListDomains => {
                    write_domains(&mut io::stdout().lock(), self.domain)
                        .context(WriteOutputSnafu { stage: "list-domains" })?;
                }
                Input::SwitchDomain(domain) => {
                    tracing::debug!(domain = %domain, "switching legal domain");
                    self.domain = domain;
                }
                Input::Invalid(hint) => eprintln!("{hint}"),
                Input::Question(question) => {
                    self.run_turn(&question).await?;
                }
            }
        }

        tracing::info!(app = APP_NAME, "session closed");
        Ok(())
    }

    /// Drives one turn while rendering its events as they arrive.
    async fn run_turn(&mut self, question: &str) -> Result<TurnOutcome, AppError> {
        let Self {
            orchestrator,
            events,
            renderer,
            domain,
        } = self;

        let outcome = {
            let turn = orchestrator.submit_turn(question, *domain);
            tokio::pin!(turn);

            loop {
                tokio::select! {
                    outcome = &mut turn => break outcome,
                    Some(event) = events.recv() => {
                        renderer
                            .render(&mut io::stdout().lock(), &event)
                            .context(WriteOutputSnafu { stage: "render-event" })?;
                    }
                }
            }
        };

        self.drain_events()?;

        if let TurnOutcome::Rejected(reason) = &outcome {
            tracing::debug!(?reason, "turn rejected");
        }
        Ok(outcome)
    }

    fn drain_events(&mut self) -> Result<(), AppError> {
        let mut out = io::stdout().lock();
        while let Ok(event) = self.events.try_recv() {
            self.renderer
                .render(&mut out, &event)
                .context(WriteOutputSnafu { stage: "render-event" })?;
        }
        Ok(())
    }

    fn print_prompt(&self) -> Result<(), AppError> {
        let mut out = io::stdout().lock();
        write!(out, "{}", prompt_label(self.domain))
            .and_then(|()| out.flush())
            .context(WriteOutputSnafu { stage: "print-prompt" })
    }
}
