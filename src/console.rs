use std::{
    collections::VecDeque,
    fmt,
    io::{self, BufRead, Write},
};

/// Characters retained by the scrolling display.
pub const DEFAULT_WIDTH: usize = 20;

/// Substituted when the operator supplies an empty line, so a completed
/// read always leaves the input queue non-empty.
pub const PLACEHOLDER: char = '?';

/// Supplies one line of operator input. Reading is the emulation's only
/// blocking point; everything else runs without suspension.
pub trait LineSource {
    fn read_line(&mut self) -> String;
}

impl<F> LineSource for F
where
    F: FnMut() -> String,
{
    fn read_line(&mut self) -> String {
        self()
    }
}

/// Prompts on stdout and reads one line from stdin.
pub struct StdinLineSource;

impl LineSource for StdinLineSource {
    fn read_line(&mut self) -> String {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line.trim_end_matches(['\n', '\r']).to_string()
    }
}

/// The single shared I/O channel: a line-buffered keyboard on input and
/// a fixed-width scrolling display on output. The port number is part
/// of the bus protocol but carries no routing information here — every
/// port reaches this one channel.
pub struct Console {
    input: VecDeque<u8>,
    output: VecDeque<char>,
    width: usize,
    source: Box<dyn LineSource>,
}

impl Console {
    pub fn new(width: usize, source: Box<dyn LineSource>) -> Self {
        Self {
            input: VecDeque::new(),
            output: VecDeque::new(),
            width,
            source,
        }
    }

    /// Pop one character code from the keyboard queue, asking the
    /// operator for a fresh line first if the queue ran dry.
    pub fn read(&mut self, port: u8) -> u8 {
        if self.input.is_empty() {
            let mut line = self.source.read_line();
            if line.is_empty() {
                line.push(PLACEHOLDER);
            }
            self.input.extend(line.bytes());
            tracing::trace!(
                "[CONSOLE] [RD] [{:02X}] buffered {} input byte(s)",
                port,
                self.input.len()
            );
        }
        self.input.pop_front().unwrap_or(PLACEHOLDER as u8)
    }

    /// Append one character to the display. Control codes (< 32) clear
    /// it instead; anything scrolled past the width falls off the
    /// front.
    pub fn write(&mut self, port: u8, value: u8) {
        if value < 32 {
            tracing::trace!("[CONSOLE] [WR] [{:02X}] control {:02X}, clear", port, value);
            self.output.clear();
            return;
        }
        self.output.push_back(value as char);
        while self.output.len() > self.width {
            self.output.pop_front();
        }
    }

    /// Snapshot of the display window, oldest character first.
    pub fn display(&self) -> String {
        self.output.iter().collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, Box::new(StdinLineSource))
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("pending_input", &self.input.len())
            .field("display", &self.display())
            .field("width", &self.width)
            .finish()
    }
}
