//! Binary entrypoint for the `dms` console.

#[tokio::main]
async fn main() {
    std::process::exit(dms_cli::run().await);
}
