//! Send a message to one or more agents, then list the caller's chats.
//!
//! ```text
//! BELAKE_BACKEND_URL=https://api.belake.ai BELAKE_API_KEY=bk_... \
//!     cargo run --example send_message -- a1,a2 "Hello there"
//! ```

use belake::{
    Client, Credentials, FailurePolicy, FieldValues, Invocation, Operation, OperationKey, Resource,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "belake=debug".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let agents = args.next().ok_or("usage: send_message <agent-ids> <message>")?;
    let message = args.next().ok_or("usage: send_message <agent-ids> <message>")?;

    let client = Client::from_credentials(Credentials::from_env()?)?;
    let invocations = [
        Invocation::new(
            OperationKey::new(Resource::Chat, Operation::SendMessage),
            FieldValues::new()
                .with("agentsIds", agents)
                .with("message", message)
                .with("language", "en-us"),
        ),
        Invocation::new(
            OperationKey::new(Resource::Chat, Operation::ListChats),
            FieldValues::new(),
        ),
    ];

    let report = client
        .batch(FailurePolicy::Continue)
        .run(&invocations)
        .await?;
    for item in report.to_output() {
        println!("{}", serde_json::to_string_pretty(&item)?);
    }
    Ok(())
}
