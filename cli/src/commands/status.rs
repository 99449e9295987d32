//! `pare status`

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::console;
use crate::settings::CliSettings;

pub async fn execute(settings: &CliSettings) -> Result<()> {
    let client = ApiClient::new(settings)?;
    let services = client.list_services().await?;

    if services.is_empty() {
        println!("{}", "No deployment data available.".italic());
        println!("{}", "Try deploying a service or check your connection.".dimmed());
        return Ok(());
    }

    for line in console::status_table(&services) {
        println!("{}", line);
    }
    Ok(())
}
