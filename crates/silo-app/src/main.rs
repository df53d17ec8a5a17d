//! Binary entrypoint for the `silo-rehome` orchestrator; delegates to
//! [`silo_app::run`].

#[tokio::main]
async fn main() {
    std::process::exit(silo_app::run().await);
}
