#[tokio::main]
async fn main() {
    // Errors are logged inside run_with_config before it returns.
    if swarm_server::run_with_config().await.is_err() {
        std::process::exit(1);
    }
}
