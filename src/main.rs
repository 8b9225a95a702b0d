mod api;
mod cancel;
mod cli;
mod config;
mod error;
mod identity;
mod output;
mod patch;
mod wiql;

use cancel::CancelToken;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Ctrl-C aborts the in-flight request and unwinds with exit code 1.
    let cancel = CancelToken::new();
    let ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc.cancel();
        }
    });

    let code = cli::run(&args, &cancel).await;
    std::process::exit(code);
}
