mod handlers;
mod server;

use provider_operator::controllers::{self, State};
use provider_operator::util::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    let client = kube::Client::try_default().await?;
    let state = State::default();

    let providers = controllers::run_all(client, state.clone());
    let server = server::start_server(state);

    tokio::join!(providers, server).1?;
    Ok(())
}
