use crate::ui::icons::{CROSS, EYES, SPEECH};
use console::style;
use std::io::{self, Stdout, Write};
use std::path::Path;

/// Writes one file's commentary at a time: a marker naming the file, the
/// tokens as they arrive (flushed individually), and a closing newline.
pub struct CommentaryWriter<W: Write> {
    out: W,
    styled: bool,
}

impl CommentaryWriter<Stdout> {
    /// Writer on stdout, styled when stdout is a terminal.
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            styled: console::colors_enabled(),
        }
    }
}

impl<W: Write> CommentaryWriter<W> {
    /// Plain, unstyled writer.
    pub fn new(out: W) -> Self {
        Self { out, styled: false }
    }

    pub fn begin(&mut self, display_path: &str) -> io::Result<()> {
        let marker = style(format!("{}{}", SPEECH, display_path))
            .bold()
            .cyan()
            .force_styling(self.styled);
        write!(self.out, "\n{}\n", marker)?;
        self.out.flush()
    }

    pub fn token(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    pub fn end(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> CommentaryWriter<W> {
    /// Erase the writer type, keeping the styling choice.
    pub fn boxed(self) -> CommentaryWriter<Box<dyn Write + Send>> {
        CommentaryWriter {
            out: Box::new(self.out),
            styled: self.styled,
        }
    }
}

/// Report a failed operation on one file to stderr.
pub fn print_failure(path: &str, operation: &str, error: &dyn std::fmt::Display, hint: Option<&str>) {
    eprintln!(
        "{}{} {}: {}",
        CROSS,
        style(path).bold(),
        style(operation).red(),
        error
    );
    if let Some(hint) = hint {
        eprintln!("   {}", style(hint).dim());
    }
}

/// Startup banner.
pub fn print_watching(root: &Path, patterns: &[String], model: &str) {
    eprintln!(
        "{}Watching {} ({}) with {}",
        EYES,
        style(root.display()).bold(),
        patterns.join(", "),
        style(model).cyan()
    );
    eprintln!("{}", style("Edit a file to hear about it. Ctrl-C to stop.").dim());
}
