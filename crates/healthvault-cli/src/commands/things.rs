use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use colored::Colorize;

use healthvault_client::{Connection, Thing, ThingClient, ThingQuery};
use healthvault_core::{RecordId, ThingKey, ThingTypeId, check_well_formed};

use crate::cli::{
    OutputFormat, ThingGetArgs, ThingListArgs, ThingPutArgs, ThingRemoveArgs, ThingsArgs,
    ThingsCommands,
};
use crate::output::{print_success, print_things};

fn read_data_xml(file: &Option<String>) -> Result<String> {
    let content = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    let content = content.trim();
    if content.is_empty() {
        anyhow::bail!("data-xml payload is empty");
    }
    check_well_formed(content).context("Invalid XML payload")?;
    Ok(content.to_string())
}

/// `--record`, then the stored record, then the person's selected record.
pub async fn resolve_record(
    connection: &Connection,
    flag: &Option<String>,
    stored: Option<RecordId>,
) -> Result<RecordId> {
    if let Some(id) = flag {
        return id
            .parse::<RecordId>()
            .with_context(|| format!("Invalid --record: {id}"));
    }
    if let Some(id) = stored {
        return Ok(id);
    }
    let person = connection.person().get_person_info().await?;
    person
        .selected_record()
        .map(|r| r.id)
        .context("No record available. Pass --record or run: hv config set record <id>")
}

pub async fn run(
    connection: &Connection,
    args: &ThingsArgs,
    stored_record: Option<RecordId>,
    format: OutputFormat,
) -> Result<()> {
    let record_id = resolve_record(connection, &args.record, stored_record).await?;
    tracing::debug!(%record_id, "Using record");
    let client = connection.things(record_id);

    match &args.command {
        ThingsCommands::Get(get_args) => get(&client, get_args, format).await,
        ThingsCommands::List(list_args) => list(&client, list_args, format).await,
        ThingsCommands::Put(put_args) => put(&client, put_args).await,
        ThingsCommands::Remove(remove_args) => remove(&client, remove_args).await,
    }
}

async fn get(client: &ThingClient, args: &ThingGetArgs, format: OutputFormat) -> Result<()> {
    let key = ThingKey::parse(&args.id, None).context("Invalid thing id")?;
    match client.get_thing(&key).await? {
        Some(thing) => print_things(std::slice::from_ref(&thing), format),
        None => anyhow::bail!("Thing {} not found in record {}", args.id, client.record_id()),
    }
    Ok(())
}

async fn list(client: &ThingClient, args: &ThingListArgs, format: OutputFormat) -> Result<()> {
    let type_id = args
        .type_id
        .parse::<ThingTypeId>()
        .with_context(|| format!("Invalid --type: {}", args.type_id))?;
    let mut query = ThingQuery::new().with_type(type_id);
    if let Some(max) = args.max {
        query = query.with_max(max);
    }
    let things = client.get_things(&query).await?;
    print_things(&things, format);
    Ok(())
}

async fn put(client: &ThingClient, args: &ThingPutArgs) -> Result<()> {
    let type_id = args
        .type_id
        .parse::<ThingTypeId>()
        .with_context(|| format!("Invalid --type: {}", args.type_id))?;
    let thing = Thing::new(type_id, read_data_xml(&args.file)?);
    let key = client.put_thing(&thing).await?;
    print_success(&format!("Stored thing {}", key.to_string().cyan()));
    Ok(())
}

async fn remove(client: &ThingClient, args: &ThingRemoveArgs) -> Result<()> {
    let key = ThingKey::parse(&args.id, Some(args.version.as_str())).context("Invalid thing key")?;
    client.remove_things(&[key]).await?;
    print_success(&format!("Removed thing {}", args.id.cyan()));
    Ok(())
}
