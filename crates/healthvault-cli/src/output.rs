use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use healthvault_client::{PersonInfo, Thing};

use crate::cli::OutputFormat;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error(&format!("Failed to serialize output: {e}")),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_person(person: &PersonInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(person),
        OutputFormat::Table => {
            println!("{}: {}", "Person".cyan(), person.name);
            println!("{}: {}", "Person ID".cyan(), person.person_id);
            println!("{}", person_table(person));
        }
    }
}

pub fn print_things(things: &[Thing], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&things),
        OutputFormat::Table => {
            if things.is_empty() {
                println!("No things found.");
                return;
            }
            println!("{}", things_table(things));
            println!("Total: {}", things.len());
        }
    }
}

fn person_table(person: &PersonInfo) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Record ID", "Name", "Relationship", "Custodian", "Selected"]);
    for record in &person.records {
        let selected = person.selected_record_id == Some(record.id);
        builder.push_record([
            record.id.to_string(),
            record.display_name.clone().unwrap_or_else(|| record.name.clone()),
            record.relationship.clone().unwrap_or_else(|| "-".into()),
            yes_no(record.is_custodian).to_string(),
            if selected { "*" } else { "" }.to_string(),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn things_table(things: &[Thing]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["ID", "Version", "Type", "State", "Effective"]);
    for thing in things {
        let (id, version) = match &thing.key {
            Some(key) => (
                key.id.to_string(),
                key.version_stamp
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            None => ("-".into(), "-".into()),
        };
        builder.push_record([
            id,
            version,
            thing
                .type_name
                .clone()
                .unwrap_or_else(|| thing.type_id.to_string()),
            thing.state.to_string(),
            thing.effective_date.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
