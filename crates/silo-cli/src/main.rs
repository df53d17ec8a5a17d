//! Binary entrypoint for the `silo` CLI; delegates to [`silo_cli::run`].

#[tokio::main]
async fn main() {
    std::process::exit(silo_cli::run().await);
}
