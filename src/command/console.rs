//! Line-oriented user interaction

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Where the loop reads input lines and writes replies
pub trait Console {
    /// Show `prompt` and read one line without its trailing newline.
    /// `None` means end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Console on the process's stdin/stdout
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        println!("{}", line);
        Ok(())
    }
}

/// Console fed from a fixed list of lines, recording what is written
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    /// Prompts shown, in order
    pub prompts: Vec<String>,
    /// Lines written, in order
    pub output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            output: Vec::new(),
        }
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.inputs.pop_front())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_console_replays_inputs() {
        let mut console = ScriptedConsole::new(["first", "second"]);
        assert_eq!(console.read_line("> ").unwrap().as_deref(), Some("first"));
        assert_eq!(console.read_line("> ").unwrap().as_deref(), Some("second"));
        assert_eq!(console.read_line("> ").unwrap(), None);
        assert_eq!(console.prompts.len(), 3);

        console.write_line("done").unwrap();
        assert_eq!(console.output, vec!["done"]);
    }
}
