//! `pare delete`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::Input;

use crate::client::ApiClient;
use crate::console;
use crate::git::resolve_git_hash;
use crate::settings::CliSettings;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Service to delete
    #[arg(value_name = "SERVICE")]
    pub name: String,

    /// Deployment to delete it from. Defaults to the current git hash.
    #[arg(short, long, value_name = "HASH")]
    pub git_hash: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,
}

fn confirmed(name: &str) -> Result<bool> {
    let answer: String = Input::new()
        .with_prompt(format!(
            "You are about to delete your deployed service '{}'. Type the service name to confirm",
            name.red().bold()
        ))
        .allow_empty(true)
        .interact_text()?;
    Ok(answer.trim() == name)
}

pub async fn execute(args: DeleteArgs, settings: &CliSettings) -> Result<()> {
    if !args.force && !confirmed(&args.name)? {
        println!("{}", "Operation cancelled.".bold());
        return Ok(());
    }

    let git_hash = match args.git_hash {
        Some(hash) => hash,
        None => resolve_git_hash(settings).await?,
    };
    let client = ApiClient::new(settings)?;
    let deleted = client.delete_service(&args.name, &git_hash).await?;

    console::success(&format!(
        "'{}' (git hash: '{}') deleted",
        deleted.name, deleted.git_hash
    ));
    Ok(())
}
