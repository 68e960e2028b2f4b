//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use snaplink_core::{Link, ProfileSummary, SharedLinksState, UserIdentity};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single link
    pub fn print_link(&self, link: &Link) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:         {}", link.id);
                println!("URL:        {}", link.url);
                println!("Visibility: {}", visibility(link.is_public));
                println!("Added:      {}", link.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(link),
            OutputFormat::Quiet => {
                println!("{}", link.id);
            }
        }
    }

    /// Print a list of links
    pub fn print_links(&self, links: &[Link]) {
        match self.format {
            OutputFormat::Human => {
                if links.is_empty() {
                    println!("No links found.");
                    return;
                }
                for link in links {
                    println!(
                        "{} | {:<7} | {}",
                        short_id(&link.id),
                        visibility(link.is_public),
                        truncate(&link.url, 60)
                    );
                }
                let public = links.iter().filter(|link| link.is_public).count();
                println!("\n{} link(s), {} public", links.len(), public);
            }
            OutputFormat::Json => print_json(links),
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.id);
                }
            }
        }
    }

    /// Print a visitor's view of someone's shared links
    pub fn print_shared(&self, user_name: &str, image_url: &str, share_url: &str, state: &SharedLinksState) {
        let links: &[Link] = match state {
            SharedLinksState::Populated(links) => links,
            _ => &[],
        };

        match self.format {
            OutputFormat::Human => {
                println!("{}'s shared links", user_name);
                println!("Picture: {}", image_url);
                println!("Share:   {}", share_url);
                println!();
                match state {
                    SharedLinksState::Loading => println!("Loading..."),
                    SharedLinksState::Empty => println!("No shared links yet."),
                    SharedLinksState::Populated(links) => {
                        for link in links {
                            println!("  {}", link.url);
                        }
                    }
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "user_name": user_name,
                        "image_url": image_url,
                        "share_url": share_url,
                        "loading": matches!(state, SharedLinksState::Loading),
                        "links": links,
                    })
                );
            }
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.url);
                }
            }
        }
    }

    /// Print the signed-in user
    pub fn print_profile(&self, user: &UserIdentity, summary: &ProfileSummary, share_url: Option<&str>) {
        match self.format {
            OutputFormat::Human => {
                println!("Name:    {}", summary.display_name);
                println!("Email:   {}", summary.email);
                println!("Picture: {}", summary.photo_url);
                println!("User ID: {}", user.uid);
                if let Some(url) = share_url {
                    println!("Share:   {}", url);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "uid": user.uid,
                        "display_name": summary.display_name,
                        "email": summary.email,
                        "photo_url": summary.photo_url,
                        "share_url": share_url,
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", user.uid);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a problem with one input, without failing the command
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("✗ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn visibility(is_public: bool) -> &'static str {
    if is_public {
        "public"
    } else {
        "private"
    }
}

/// First 8 characters of an id
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_visibility_label() {
        assert_eq!(visibility(true), "public");
        assert_eq!(visibility(false), "private");
    }
}
