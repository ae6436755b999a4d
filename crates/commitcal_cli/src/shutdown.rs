use console::Term;
use tokio_util::sync::CancellationToken;

/// Exit status after a forced quit (128 + SIGINT).
const FORCE_QUIT_STATUS: i32 = 130;

/// Install the Ctrl+C handler and return the token it cancels.
///
/// The first Ctrl+C cancels the token so running syncs stop after their
/// current page and keep what they fetched. A second Ctrl+C exits at once.
pub(crate) fn setup_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current pages...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current pages");
        }

        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(FORCE_QUIT_STATUS);
        }
    });

    token
}
