use std::{io::Write, sync::Arc};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{error, warn};

use super::command::Command;
use crate::huskylens::SensorRequest;
use crate::mcp::{ResponseEnvelope, ToolInvoker, extract_text};
use crate::vision::VisionAnalyzer;

const MENU: &str = "\
 1. list                 : List algorithms
 2. current              : Show active algorithm
 3. switch <Algorithm>   : Switch algorithm (e.g. 'switch FaceRecognition')
 4. ask <Question>       : Ask the AI about the view
 5. see                  : General AI description
 6. photo                : Take photo (to internal memory)
 7. exit                 : Quit
 0. help                 : Show this menu";

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive command loop.
///
/// Reads commands from `R`, drives the sensor through a [`ToolInvoker`],
/// hands recognition data to a [`VisionAnalyzer`] and writes to `W`.
pub struct Console<R, W> {
    input: Lines<BufReader<R>>,
    out: W,
    tools: Arc<dyn ToolInvoker>,
    analyzer: Arc<dyn VisionAnalyzer>,
}

impl<R, W> std::fmt::Debug for Console<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub fn new(
        input: R,
        out: W,
        tools: Arc<dyn ToolInvoker>,
        analyzer: Arc<dyn VisionAnalyzer>,
    ) -> Self {
        Self {
            input: BufReader::new(input).lines(),
            out,
            tools,
            analyzer,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn print_banner(&mut self) -> std::io::Result<()> {
        let rule = "=".repeat(40);
        writeln!(self.out, "\n{rule}")?;
        writeln!(self.out, "      HuskyLens 2 MCP Command Line")?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "{MENU}")?;
        writeln!(self.out, "{}", "-".repeat(40))
    }

    /// Run until `exit` or end of input.
    ///
    /// Command failures are reported and the loop continues; only failures to
    /// write output end it.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.print_banner()?;
        loop {
            write!(self.out, "\nUser > ")?;
            self.out.flush()?;

            let line = match self.input.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    writeln!(self.out)?;
                    break;
                }
                Err(e) => {
                    error!(name: "repl.input.failed", error = %e, "Failed to read input");
                    break;
                }
            };
            let Some(command) = Command::parse(&line) else {
                continue;
            };

            match self.execute(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) => {
                    warn!(name: "repl.command.failed", error = %e, "Command failed");
                    writeln!(self.out, "Error in loop: {e:#}")?;
                }
            }
        }
        Ok(())
    }

    /// Execute a single command.
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => writeln!(self.out, "{MENU}")?,
            Command::List => {
                writeln!(self.out, "Fetching algorithm list...")?;
                let resp = self.sensor(SensorRequest::ListApplications).await?;
                self.print_result(&resp, "")?;
            }
            Command::Current => {
                writeln!(self.out, "Checking active algorithm...")?;
                let resp = self.sensor(SensorRequest::CurrentApplication).await?;
                self.print_result(&resp, "Active algorithm: ")?;
            }
            Command::Switch(algorithm) => {
                let algorithm = match algorithm {
                    Some(a) => Some(a),
                    None => self.prompt("  Enter algorithm name (e.g. ObjectTracking) > ").await?,
                };
                match algorithm {
                    Some(algorithm) => {
                        writeln!(self.out, "Switching to '{algorithm}'...")?;
                        let resp = self
                            .sensor(SensorRequest::SwitchApplication { algorithm })
                            .await?;
                        self.print_result(&resp, "")?;
                    }
                    None => writeln!(self.out, "Switch cancelled.")?,
                }
            }
            Command::Ask(None) => {
                writeln!(
                    self.out,
                    "Please provide a question. Example: 'ask Is there a person?'"
                )?;
            }
            Command::Ask(Some(question)) => {
                writeln!(self.out, "Asking HuskyLens...")?;
                self.reason(Some(&question), "AI ANSWER").await?;
            }
            Command::See => {
                writeln!(self.out, "Reading sensor data...")?;
                self.reason(None, "DESCRIPTION").await?;
            }
            Command::Photo => {
                writeln!(self.out, "Sending capture command...")?;
                let resp = self.sensor(SensorRequest::TakePhoto).await?;
                match resp.error_message() {
                    Some(msg) => writeln!(self.out, "Error: {msg}")?,
                    None => {
                        writeln!(self.out, "Done")?;
                        writeln!(self.out, "Note: image saved to HuskyLens internal memory.")?;
                    }
                }
            }
            Command::Unknown(word) => {
                writeln!(self.out, "Unknown command '{word}'. Type 'help' for the menu.")?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn sensor(&self, request: SensorRequest) -> anyhow::Result<ResponseEnvelope> {
        self.tools
            .call_tool(request.tool(), request.arguments())
            .await
            .with_context(|| format!("{} failed", request.tool()))
    }

    fn print_result(&mut self, resp: &ResponseEnvelope, label: &str) -> std::io::Result<()> {
        match resp.error_message() {
            Some(msg) => writeln!(self.out, "Error: {msg}"),
            None => writeln!(self.out, "{label}{}", extract_text(resp)),
        }
    }

    /// Fetch recognition data and pass it to the analyzer.
    async fn reason(&mut self, question: Option<&str>, label: &str) -> anyhow::Result<()> {
        let resp = self.sensor(SensorRequest::RecognitionResult).await?;
        if let Some(msg) = resp.error_message() {
            writeln!(self.out, "Error: {msg}")?;
            return Ok(());
        }
        let data = extract_text(&resp);
        writeln!(self.out, "Raw data:\n{data}")?;

        if self.analyzer.is_enabled() {
            writeln!(self.out, "  Processing with Gemini...")?;
        }
        match self.analyzer.analyze(&data, question).await {
            Ok(answer) => writeln!(self.out, "\n{label}: {answer}")?,
            Err(e) => writeln!(self.out, "\nAPI Error: {e:#}")?,
        }
        Ok(())
    }

    /// Ask for a value on the next input line. Blank or missing input yields
    /// `None`.
    async fn prompt(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.out.flush()?;
        let line = self.input.next_line().await?;
        Ok(line
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()))
    }
}
