use std::io::{self, BufRead, Write};

use colored::Colorize;

/// What the updater needs from whoever is showing things to the user
///
/// All calls happen on one thread; implementations never see two prompts at once
pub trait Presenter {
    /// Show a notice the user can only acknowledge
    fn notify_blocking(&mut self, msg: &str) -> io::Result<()>;

    /// Ask a yes/no question. There is no way to dismiss it without answering
    fn confirm(&mut self, msg: &str) -> io::Result<bool>;

    /// Show a short notice that needs no acknowledgement
    fn notify_transient(&mut self, msg: &str);
}

/// Terminal presenter reading answers line by line
pub struct ConsolePresenter<R, W> {
    input: R,
    output: W,
}

impl ConsolePresenter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePresenter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before an answer was given",
            ));
        }
        Ok(line.trim().to_lowercase())
    }
}

impl<R: BufRead, W: Write> Presenter for ConsolePresenter<R, W> {
    fn notify_blocking(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.output, "{} {}", "!".red().bold(), msg)?;
        write!(self.output, "  Press Enter to close ")?;
        self.output.flush()?;
        self.read_answer().map(|_| ())
    }

    fn confirm(&mut self, msg: &str) -> io::Result<bool> {
        loop {
            write!(self.output, "{} {} [y/n] ", "?".yellow().bold(), msg)?;
            self.output.flush()?;

            match self.read_answer()?.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "  {}", "Please answer y or n".dimmed())?,
            }
        }
    }

    fn notify_transient(&mut self, msg: &str) {
        let _ = writeln!(self.output, "{} {}", "✓".green(), msg);
    }
}
