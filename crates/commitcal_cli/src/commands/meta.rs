//! Shell completions and man pages.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

use crate::Cli;

const BIN_NAME: &str = "commitcal";

fn write_completions(shell: clap_complete::Shell, out: &mut impl Write) {
    clap_complete::generate(shell, &mut Cli::command(), BIN_NAME, out);
}

fn write_man_page(out: &mut impl Write) -> std::io::Result<()> {
    clap_mangen::Man::new(Cli::command()).render(out)
}

/// Render the main page and one page per subcommand into `dir`.
fn write_man_pages(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    clap_mangen::generate_to(Cli::command(), dir)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    write_completions(shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(dir) => {
            write_man_pages(&dir)?;
            println!("Generated man pages in: {}", dir.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            write_man_page(&mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_name_the_binary_and_subcommands() {
        let mut out = Vec::new();
        write_completions(clap_complete::Shell::Zsh, &mut out);
        let script = String::from_utf8(out).expect("completion output should be UTF-8");

        assert!(script.contains(BIN_NAME));
        assert!(script.contains("status"));
    }

    #[test]
    fn man_page_has_title() {
        let mut out = Vec::new();
        write_man_page(&mut out).expect("man rendering should succeed");
        let page = String::from_utf8(out).expect("man output should be UTF-8");
        assert!(page.to_lowercase().contains(".th commitcal"));
    }

    #[test]
    fn man_pages_written_per_subcommand() {
        let dir = std::env::temp_dir().join(format!("commitcal-man-{}", uuid::Uuid::new_v4()));

        write_man_pages(&dir).expect("man page generation should succeed");

        let names: Vec<String> = std::fs::read_dir(&dir)
            .expect("output directory should exist")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n == "commitcal.1"));
        assert!(names.iter().any(|n| n.starts_with("commitcal-status")));

        std::fs::remove_dir_all(&dir).expect("test output directory should be removable");
    }
}
