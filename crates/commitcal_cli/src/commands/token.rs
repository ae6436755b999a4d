use console::{Term, style};

use crate::TokenAction;
use crate::config::Config;

pub(crate) fn handle_token(
    action: TokenAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TokenAction::Set { token } => {
            let token = match token {
                Some(token) => token,
                None => {
                    let term = Term::stderr();
                    term.write_str("GitHub token: ")?;
                    term.read_secure_line()?
                }
            };
            let token = token.trim();
            if token.is_empty() {
                return Err("Token must not be empty".into());
            }

            let path = Config::save_github_token(token)?;
            println!(
                "{} Token saved to {}",
                style("✓").green(),
                path.display()
            );
        }
        TokenAction::Status => match config.github_token() {
            Some(token) => println!(
                "{} GitHub token configured ({})",
                style("✓").green(),
                mask(&token)
            ),
            None => println!(
                "{} No GitHub token. Set one with: commitcal token set",
                style("✗").red()
            ),
        },
    }
    Ok(())
}

/// Show only the last four characters of a secret.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len().min(12) - 4), tail)
}
