//! Terminal rendering of markdown output.
//!
//! Rich mode prints headers in blue and hands everything between headers to
//! a termimad skin, so tables and code blocks keep their layout. Plain mode
//! (`--no-color`) prints the markdown unchanged.

use std::io::{self, Write};

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

/// Terminal renderer that can switch between rich and plain text output
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

/// A run of markdown lines rendered together.
#[derive(Debug, PartialEq, Eq)]
enum Section<'a> {
    Header(&'a str),
    Body(String),
}

/// Split `markdown` at header lines. A `#` inside a fenced block is body
/// text.
fn sections(markdown: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut body = String::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.starts_with('#') {
            if !body.is_empty() {
                sections.push(Section::Body(std::mem::take(&mut body)));
            }
            sections.push(Section::Header(line));
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    if !body.is_empty() {
        sections.push(Section::Body(body));
    }
    sections
}

impl TerminalRenderer {
    /// Create a new terminal renderer
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();

        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.code_block.set_bg(Color::AnsiValue(238));
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Render markdown text to the terminal
    pub fn render(&self, markdown: &str) -> Result<()> {
        if !self.rich_enabled {
            let mut stdout = io::stdout().lock();
            stdout.write_all(markdown.as_bytes())?;
            stdout.flush()?;
            return Ok(());
        }

        for section in sections(markdown) {
            match section {
                // Keep the hashes visible
                Section::Header(line) => println!("\x1b[34m{line}\x1b[0m"),
                Section::Body(text) => self.skin.print_text(&text),
            }
        }
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_renderer() {
        let renderer = TerminalRenderer::new(false);
        assert!(!renderer.rich_enabled);
    }

    #[test]
    fn test_default_is_rich() {
        let renderer = TerminalRenderer::default();
        assert!(renderer.rich_enabled);
    }

    #[test]
    fn test_sections_split_at_headers() {
        let parsed = sections("# run_a (failed)\n\n- Plan: p\n## Error\n- Type: timeout\n");
        assert_eq!(
            parsed,
            vec![
                Section::Header("# run_a (failed)"),
                Section::Body("\n- Plan: p\n".to_string()),
                Section::Header("## Error"),
                Section::Body("- Type: timeout\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_hash_inside_code_block_is_body() {
        let parsed = sections("```\n# not a header\n```\n");
        assert_eq!(
            parsed,
            vec![Section::Body("```\n# not a header\n```\n".to_string())]
        );
    }
}
