mod cli;

#[tokio::main]
async fn main() {
    let launch = match cli::run() {
        cli::RunOutcome::Serve(launch) => launch,
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    if let Err(err) = latexpad::serve(launch.addr, launch.config).await {
        tracing::error!(error = %err, "server stopped");
        std::process::exit(1);
    }
}
