use std::io::{self, Write};

use zhifa_core::persona::APP_NAME;
use zhifa_core::{ConversationEvent, LegalDomain, Message, Sender};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Line {
    #[default]
    Idle,
    Notice,
    Streaming,
}

/// Writes conversation events to a terminal as they arrive.
#[derive(Debug, Default)]
pub struct Renderer {
    citations: Vec<String>,
    line: Line,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, out: &mut impl Write, event: &ConversationEvent) -> io::Result<()> {
        match event {
            ConversationEvent::MessageAppended(message) => self.render_message(out, message)?,
            ConversationEvent::FragmentApplied {
                delta,
                new_citations,
                ..
            } => {
                if self.line != Line::Streaming && !delta.is_empty() {
                    self.close_line(out)?;
                    write!(out, "{APP_NAME} ▸ ")?;
                    self.line = Line::Streaming;
                }
                out.write_all(delta.as_bytes())?;
                self.citations.extend(new_citations.iter().cloned());
            }
            ConversationEvent::TurnFinished { .. } => {
                self.close_line(out)?;
                write_citations(out, &self.citations)?;
                self.citations.clear();
            }
        }

        out.flush()
    }

    fn render_message(&mut self, out: &mut impl Write, message: &Message) -> io::Result<()> {
        match message.sender {
            // Typed by the user, already on screen.
            Sender::User => Ok(()),
            Sender::Assistant if message.streaming => {
                self.close_line(out)?;
                write!(out, "{APP_NAME} ▸ {}", message.display_text())?;
                self.line = Line::Notice;
                Ok(())
            }
            Sender::Assistant => {
                self.close_line(out)?;
                writeln!(out, "{APP_NAME} ▸ {}\n", message.content)
            }
            Sender::System => {
                self.close_line(out)?;
                writeln!(out, "{}", message.content)
            }
        }
    }

    /// Erases a pending notice or ends a streamed answer.
    fn close_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.line {
            Line::Idle => {}
            Line::Notice => write!(out, "\r\x1b[2K")?,
            Line::Streaming => writeln!(out)?,
        }
        self.line = Line::Idle;
        Ok(())
    }
}

fn write_citations(out: &mut impl Write, citations: &[String]) -> io::Result<()> {
    if citations.is_empty() {
        return Ok(());
    }

    writeln!(out, "\n参考来源:")?;
    for (index, url) in citations.iter().enumerate() {
        writeln!(out, "  [{}] {url}", index + 1)?;
    }
    Ok(())
}

pub fn write_domains(out: &mut impl Write, current: LegalDomain) -> io::Result<()> {
    for domain in LegalDomain::ALL {
        let marker = if domain == current { "*" } else { " " };
        writeln!(
            out,
            "{marker} {} {:<10} {}",
            domain.icon(),
            domain.slug(),
            domain.tag()
        )?;
    }
    Ok(())
}

pub fn prompt_label(domain: LegalDomain) -> String {
    format!("[{} {}] > ", domain.icon(), domain.tag())
}
