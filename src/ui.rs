use console::{strip_ansi_codes, Term};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

use handout_vault_protocol::common::Role;

/// Terminal output helpers
pub struct UI {
    term: Term,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Apply color only when the terminal supports it
    fn colorize<F>(&self, text: &str, color_fn: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.supports_color() {
            color_fn(text)
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, message: &str) {
        let output = self.colorize(message, |m| m.green().bold().to_string());
        println!("{}", output);
    }

    pub fn error(&self, message: &str) {
        let output = self.colorize(message, |m| m.red().bold().to_string());
        eprintln!("{}", output);
    }

    pub fn warning(&self, message: &str) {
        let output = self.colorize(message, |m| m.yellow().bold().to_string());
        println!("{}", output);
    }

    pub fn info(&self, message: &str) {
        let output = self.colorize(message, |m| m.blue().bold().to_string());
        println!("{}", output);
    }

    /// Dimmed secondary line
    pub fn note(&self, message: &str) {
        let output = self.colorize(message, |m| m.dimmed().to_string());
        println!("{}", output);
    }

    pub fn format_auth_status(&self, authenticated: bool) -> String {
        if authenticated {
            self.colorize("Authenticated", |t| t.green().to_string())
        } else {
            self.colorize("Not authenticated", |t| t.red().to_string())
        }
    }

    pub fn format_server_status(&self, connected: bool) -> String {
        if connected {
            self.colorize("Connected", |t| t.green().to_string())
        } else {
            self.colorize("Connection failed", |t| t.red().to_string())
        }
    }

    pub fn format_role(&self, role: &Role) -> String {
        let text = role.to_string();
        match role {
            Role::Admin => self.colorize(&text, |t| t.magenta().to_string()),
            Role::Teacher => self.colorize(&text, |t| t.cyan().to_string()),
            _ => text,
        }
    }

    /// Format user field with fallback for missing data
    pub fn format_user_field(&self, value: Option<String>) -> String {
        value.unwrap_or_else(|| "-".to_string())
    }

    pub fn header(&self, title: &str) {
        let term_width = self.width();
        let title_len = title.width() + 4;
        let line_len = if term_width > title_len {
            ((term_width - title_len) / 2).min(30)
        } else {
            0
        };

        let line = "═".repeat(line_len);
        println!();
        if self.supports_color() {
            println!("{} {} {}", line.cyan(), title.cyan().bold(), line.cyan());
        } else {
            println!("{} {} {}", line, title, line);
        }
        println!();
    }

    /// Card-style key/value display
    pub fn card(&self, title: &str, content: Vec<(&str, String)>) {
        let term_width = self.width();
        let card_width = term_width.saturating_sub(4).clamp(50, 80);

        let supports_color = self.supports_color();

        println!("╭{}╮", "─".repeat(card_width - 2));
        let title_spaces = card_width.saturating_sub(title.width() + 4);
        if supports_color {
            println!("│ {} {}│", title.cyan().bold(), " ".repeat(title_spaces));
        } else {
            println!("│ {} {}│", title, " ".repeat(title_spaces));
        }
        println!("├{}┤", "─".repeat(card_width - 2));

        for (label, value) in content {
            let label_width = strip_ansi_codes(label).width();
            let value_width = strip_ansi_codes(&value).width();
            let content_width = label_width + value_width + 4;

            let spaces = if content_width < card_width - 1 {
                card_width - content_width - 1
            } else {
                1
            };

            if supports_color {
                println!("│ {}: {}{}│", label.dimmed(), value, " ".repeat(spaces));
            } else {
                println!("│ {}: {}{}│", label, value, " ".repeat(spaces));
            }
        }

        println!("╰{}╯", "─".repeat(card_width - 2));
        println!();
    }

    /// Aligned table; widths are measured on the visible text
    pub fn table(&self, headers: &[&str], rows: Vec<Vec<String>>) {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                let cell_width = strip_ansi_codes(cell).width();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(cell_width),
                    None => widths.push(cell_width),
                }
            }
        }

        let header_line = headers
            .iter()
            .enumerate()
            .map(|(i, h)| pad(h, widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        if self.supports_color() {
            println!("{}", header_line.trim_end().bold());
        } else {
            println!("{}", header_line.trim_end());
        }

        let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        println!("{}", self.colorize(&"─".repeat(rule_width), |l| l.dimmed().to_string()));

        for row in rows {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| pad(cell, widths[i]))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", line.trim_end());
        }
    }

    pub fn width(&self) -> usize {
        self.term.size().1 as usize
    }

    pub fn supports_color(&self) -> bool {
        self.term.features().colors_supported()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

fn pad(cell: &str, width: usize) -> String {
    let visible = strip_ansi_codes(cell).width();
    format!("{}{}", cell, " ".repeat(width.saturating_sub(visible)))
}

/// Byte-based progress bar for downloads and previews
pub fn create_transfer_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{elapsed_precise:.dim}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Percentage progress bar for uploads
pub fn create_percent_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{elapsed_precise:.dim}] [{wide_bar:.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_uses_visible_width() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("abcdef", 4), "abcdef");
        // Wide characters count double
        assert_eq!(pad("数学", 6), "数学  ");
    }

    #[test]
    fn test_format_user_field_fallback() {
        let ui = UI::new();
        assert_eq!(ui.format_user_field(None), "-");
        assert_eq!(ui.format_user_field(Some("a@b.c".into())), "a@b.c");
    }

    #[test]
    fn test_progress_bars_have_lengths() {
        assert_eq!(create_transfer_bar(2048, "x").length(), Some(2048));
        assert_eq!(create_percent_bar("x").length(), Some(100));
    }
}
