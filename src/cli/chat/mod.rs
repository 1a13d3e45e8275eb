pub mod prompt;

use std::io::Write;
use std::process::ExitCode;

use chrono::Utc;
use color_print::cformat;
use eyre::Result;
use prompt::generate_prompt;
use regex::Regex;
use tracing::{debug, warn};

use crate::assistant::DataChatSession;
use crate::error::ERROR_MARKER;

const WELCOME_TEXT: &str = "
Hi, I'm your data assistant. Ask me anything about the loaded dataset.

Things to try
• Which columns does this dataset have?
• What is the average of the first numeric column?
• Are there obvious outliers?

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Data Chat CLI

/reset        Start a new conversation (alias: /clear)
/context      Show the dataset briefing sent to the model
/history      Show the remembered exchanges
/status       Show the backend and session age
/help         Show this help dialogue
/quit         Quit the application
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Reset,
    Context,
    History,
    Status,
    Unknown(String),
}

/// Recognise a slash command; plain chat input yields `None`.
pub fn parse_command(input: &str) -> Option<Command> {
    let re = Regex::new(r"^/([A-Za-z]+)\s*$").ok()?;
    let captures = re.captures(input.trim())?;
    let name = captures.get(1)?.as_str().to_lowercase();

    Some(match name.as_str() {
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "reset" | "clear" => Command::Reset,
        "context" => Command::Context,
        "history" => Command::History,
        "status" => Command::Status,
        _ => Command::Unknown(name),
    })
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    dataset_name: Option<String>,
    session: DataChatSession,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        dataset_name: Option<String>,
        session: DataChatSession,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            dataset_name,
            session,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Non-interactive mode: answer a single query
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        writeln!(self.output, "{}", cformat!("<dim>Using {}</>", self.session.backend()))?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;
        let history_path = prompt::history_path();

        if let Some(path) = &history_path {
            if let Err(e) = rl.load_history(path) {
                debug!("No line history loaded from {}: {}", path.display(), e);
            }
        }

        loop {
            let prompt_text = generate_prompt(self.dataset_name.as_deref());
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if parse_command(&line) == Some(Command::Quit) {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "{}", cformat!("<red>Error: {}</>", e))?;
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted) | Err(rustyline::error::ReadlineError::Eof) => {
                    break;
                }
                Err(e) => {
                    writeln!(self.output, "{}", cformat!("<red>Error: {}</>", e))?;
                    break;
                }
            }
        }

        if let Some(path) = &history_path {
            if let Err(e) = rl.save_history(path) {
                warn!("Could not save line history to {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    pub async fn handle_input(&mut self, input: &str) -> Result<()> {
        match parse_command(input) {
            Some(Command::Help) => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            Some(Command::Quit) => {}
            Some(Command::Reset) => {
                self.session.reset();
                writeln!(self.output, "Conversation cleared.")?;
            }
            Some(Command::Context) => {
                writeln!(self.output, "{}", self.session.context())?;
            }
            Some(Command::History) => {
                self.print_history()?;
            }
            Some(Command::Status) => {
                let age = Utc::now() - self.session.created_at();
                writeln!(self.output, "Backend: {}", self.session.backend())?;
                writeln!(
                    self.output,
                    "Session started {} ({}s ago)",
                    self.session.created_at().format("%Y-%m-%d %H:%M:%S UTC"),
                    age.num_seconds()
                )?;
                writeln!(
                    self.output,
                    "History: {}/{} messages",
                    self.session.history().len(),
                    self.session.history().capacity()
                )?;
            }
            Some(Command::Unknown(name)) => {
                writeln!(self.output, "Unknown command '/{}'. Type /help for the list.", name)?;
            }
            None => {
                let question = input.trim();
                if question.is_empty() {
                    return Ok(());
                }
                self.process_chat_input(question).await?;
            }
        }

        Ok(())
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        let reply = self.session.reply(input).await;
        if reply.starts_with(ERROR_MARKER) {
            writeln!(self.output, "{}", cformat!("<red>{}</>", reply))?;
        } else {
            writeln!(self.output, "{}", reply)?;
        }
        Ok(())
    }

    fn print_history(&mut self) -> Result<()> {
        if self.session.history().is_empty() {
            writeln!(self.output, "No exchanges yet.")?;
            return Ok(());
        }
        for message in self.session.history().iter() {
            writeln!(self.output, "{}", cformat!("<bold>[{}]</> {}", message.role, message.content))?;
        }
        Ok(())
    }
}
