use clap::Args;
use jobs::JobApi;

use crate::render;

#[derive(Args)]
pub struct ErrorsArgs {
    /// Player whose problem positions to list.
    #[arg(long)]
    pub username: String,

    /// Only show the entry for this position.
    #[arg(long)]
    pub fen: Option<String>,

    /// Print the raw response as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ErrorsArgs) -> anyhow::Result<()> {
    let api = super::job_api()?;
    let errors = api
        .error_positions(args.username.trim())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    tracing::debug!(count = errors.count, "Loaded error positions");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
        return Ok(());
    }

    if let Some(fen) = &args.fen {
        match errors.find_position(fen) {
            Some(position) => println!("{}", render::format_error_position(0, position)),
            None => println!("No recorded errors for this position."),
        }
        return Ok(());
    }

    println!("{}: {} problem positions", errors.username, errors.count);
    for (index, position) in errors.positions.iter().enumerate() {
        println!("{}", render::format_error_position(index, position));
    }
    Ok(())
}
