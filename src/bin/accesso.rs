use accesso::cli::{actions, actions::Action, start};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let (action, globals) = start()?;

    match action {
        Action::Server { .. } => actions::server::handle(action, &globals).await?,
    }

    Ok(())
}
