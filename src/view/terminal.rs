// src/view/terminal.rs

//! Live view painted on a terminal, redrawn in place every tick.
//!
//! Lines are clipped to the terminal width: a wrapped line would occupy
//! more rows than the cursor moves back up over on the next frame.

use std::borrow::Cow;
use std::io::Write;

use chrono::Utc;
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{self, Clear, ClearType};

use crate::engine::{LiveView, RenderSink};
use crate::errors::Result;
use crate::view::table::{format_table, TableRow};

/// [`RenderSink`] that writes frames to `out`, overwriting the previous one.
#[derive(Debug)]
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    color: bool,
    /// Fixed width; `None` asks the terminal on every frame.
    width: Option<u16>,
    lines_drawn: u16,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            width: None,
            lines_drawn: 0,
        }
    }

    /// Clip to `width` columns instead of the terminal's current width.
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Width to clip to. Not a terminal (or no size reported) means no
    /// clipping.
    fn columns(&self) -> Option<usize> {
        self.width
            .or_else(|| terminal::size().ok().map(|(cols, _)| cols))
            .filter(|&cols| cols > 0)
            .map(usize::from)
    }

    /// Lines of one frame, header and notice included.
    pub fn frame_lines(&self, view: &LiveView) -> Vec<String> {
        let mut lines = Vec::new();

        let title = format!("[{}] live", view.env_id);
        lines.push(if self.color { title.cyan().to_string() } else { title });

        if let Some(notice) = &view.notice {
            let text = format!("! {notice}");
            lines.push(if self.color { text.red().to_string() } else { text });
        }

        if view.is_empty() {
            lines.push("No active instances".to_string());
            return lines;
        }

        let rows: Vec<TableRow<'_>> = view
            .rows
            .iter()
            .map(|r| TableRow {
                run: &r.run,
                dimmed: r.ended,
            })
            .collect();
        lines.extend(format_table(&rows, Utc::now(), self.color));
        lines
    }
}

impl<W: Write + Send> RenderSink for TerminalRenderer<W> {
    fn render(&mut self, view: &LiveView) -> Result<()> {
        let lines = self.frame_lines(view);
        let columns = self.columns();

        if self.lines_drawn > 0 {
            queue!(self.out, MoveUp(self.lines_drawn))?;
        }
        queue!(self.out, MoveToColumn(0), Clear(ClearType::FromCursorDown))?;

        for line in &lines {
            match columns {
                Some(cols) => writeln!(self.out, "{}", clip_to_width(line, cols))?,
                None => writeln!(self.out, "{line}")?,
            }
        }
        self.out.flush()?;

        self.lines_drawn = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Cut `line` after `width` visible characters. ANSI escape sequences take
/// no columns; when a styled line is cut, a reset is appended so the style
/// does not leak into the next line.
pub fn clip_to_width(line: &str, width: usize) -> Cow<'_, str> {
    let mut visible = 0;
    let mut styled = false;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch == '\u{1b}' {
            styled = true;
            // CSI: ESC '[' params... final byte in '@'..='~'
            if chars.next_if(|&(_, c)| c == '[').is_some() {
                for (_, c) in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        if visible == width {
            let mut clipped = line[..idx].to_string();
            if styled {
                clipped.push_str("\u{1b}[0m");
            }
            return Cow::Owned(clipped);
        }
        visible += 1;
    }
    Cow::Borrowed(line)
}
