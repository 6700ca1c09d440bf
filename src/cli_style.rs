/*!
 * s3nav CLI Style System
 *
 * Shared styling for terminal output: themed text, icons, listing and
 * summary tables.
 */

use crate::core::entry::{Entry, Location};
use crate::core::upload::UploadReport;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

// ============================================================================
// THEME COLORS
// ============================================================================

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan/blue)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }

    /// Value/number highlight (bold white)
    pub fn value<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).white().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";

    pub const BUCKET: &'static str = "🪣";
    pub const FOLDER: &'static str = "📁";
    pub const FILE: &'static str = "📄";
    pub const UP: &'static str = "↩";
    pub const MORE: &'static str = "⋯";

    pub const ARROW_RIGHT: &'static str = "→";
}

/// One-line label for an entry, icon first
pub fn entry_label(entry: &Entry) -> String {
    let icon = match entry {
        Entry::Bucket { .. } => Icons::BUCKET,
        e if e.is_parent_link() => Icons::UP,
        Entry::Folder { .. } => Icons::FOLDER,
        Entry::File { .. } => Icons::FILE,
        Entry::LoadMore { .. } => Icons::MORE,
    };
    format!("{} {}", icon, entry.display_name())
}

/// Draw a section header with a line
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

/// Status line for the current location
pub fn location_line(location: &Location, shown: usize) -> String {
    if location.is_root() {
        format!("{} buckets", shown)
    } else {
        format!(
            "Bucket: {} | Folder: /{} ({} items)",
            location.bucket_name(),
            location.prefix(),
            shown
        )
    }
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Listing table with kind and full key columns
pub fn listing_table(entries: &[Entry]) -> Table {
    let mut table = create_minimal_table();
    table.set_header(vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("Key").add_attribute(Attribute::Bold),
    ]);

    for entry in entries.iter().filter(|e| !e.is_parent_link()) {
        let (color, key) = match entry {
            Entry::Bucket { name } => (Color::Cyan, name.as_str()),
            Entry::Folder { full_prefix, .. } => (Color::Blue, full_prefix.as_str()),
            Entry::File { full_key, .. } => (Color::White, full_key.as_str()),
            Entry::LoadMore { .. } => (Color::DarkGrey, ""),
        };
        table.add_row(vec![
            Cell::new(entry_label(entry)).fg(color),
            Cell::new(format!("{:?}", entry.kind()).to_lowercase()),
            Cell::new(key).fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Per-batch upload summary
pub fn upload_summary_table(report: &UploadReport) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        Cell::new("Result").add_attribute(Attribute::Bold),
        Cell::new("Detail").add_attribute(Attribute::Bold),
    ]);

    table.add_row(vec![
        Cell::new(format!("{} Uploaded", Icons::SUCCESS)).fg(Color::Green),
        Cell::new(report.succeeded.to_string()).add_attribute(Attribute::Bold),
    ]);

    for failed in &report.failed {
        table.add_row(vec![
            Cell::new(format!("{} {}", Icons::ERROR, failed.path.display())).fg(Color::Red),
            Cell::new(&failed.reason),
        ]);
    }

    table
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}

/// Print the welcome banner
pub fn print_banner(endpoint: &str) {
    let version = env!("CARGO_PKG_VERSION");

    println!();
    println!(
        "{} {} {}",
        Theme::header("s3nav"),
        Theme::muted(format!("v{}", version)),
        Theme::muted(format!("{} {}", Icons::ARROW_RIGHT, endpoint))
    );
    println!();
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::upload::FailedUpload;
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_entry_labels() {
        assert_eq!(entry_label(&Entry::parent_link()), "↩ ..");
        assert_eq!(entry_label(&Entry::folder("b/", "img/b/")), "📁 b/");
        assert_eq!(entry_label(&Entry::file("a.png", "img/a.png")), "📄 a.png");
        assert_eq!(entry_label(&Entry::bucket("assets")), "🪣 assets");
    }

    #[test]
    fn test_location_line() {
        assert_eq!(location_line(&Location::root(), 3), "3 buckets");
        assert_eq!(
            location_line(&Location::new("assets", "img/"), 4),
            "Bucket: assets | Folder: /img/ (4 items)"
        );
    }

    #[test]
    fn test_listing_table_skips_parent_link() {
        let table = listing_table(&[Entry::parent_link(), Entry::file("a", "p/a")]);
        let rendered = table.to_string();
        assert!(rendered.contains("p/a"));
        assert!(!rendered.contains(".."));
    }

    #[test]
    fn test_upload_summary_lists_failures() {
        let report = UploadReport {
            succeeded: 2,
            failed: vec![FailedUpload {
                path: PathBuf::from("/tmp/two.txt"),
                reason: "Upload error: reset".to_string(),
            }],
        };
        let rendered = upload_summary_table(&report).to_string();
        assert!(rendered.contains("two.txt"));
        assert!(rendered.contains("reset"));
    }
}
