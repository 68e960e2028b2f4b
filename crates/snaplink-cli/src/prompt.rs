//! Interactive prompts

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Result};

/// Environment variable consulted before prompting for a password
pub const PASSWORD_ENV: &str = "SNAPLINK_PASSWORD";

/// Ask the user to confirm an action
///
/// Returns false without asking when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

/// Resolve a password from the flag, the environment, or a prompt
pub fn password(flag: Option<String>, prompt: &str) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    if !io::stdin().is_terminal() {
        bail!("No password given. Use --password or set {}.", PASSWORD_ENV);
    }

    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_password_flag_wins() {
        assert_eq!(
            password(Some("hunter22".to_string()), "Password").unwrap(),
            "hunter22"
        );
    }
}
