use anyhow::Result;

use healthvault_client::Connection;

use crate::cli::OutputFormat;
use crate::output::print_person;

pub async fn show(connection: &Connection, format: OutputFormat) -> Result<()> {
    let person = connection.person().get_person_info().await?;
    print_person(&person, format);
    Ok(())
}
