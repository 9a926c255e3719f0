use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "hv")]
#[command(about = "HealthVault CLI: authenticate an application and work with health records")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Platform base URL (overrides config and HEALTHVAULT_URL env var)
    #[arg(short, long, global = true, env = "HEALTHVAULT_URL")]
    pub server: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "HEALTHVAULT_PROFILE", default_value = "default")]
    pub profile: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log requests and session refreshes
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store application credentials and verify them against the platform
    Login(LoginArgs),
    /// Logout (remove stored credentials)
    Logout,
    /// Show stored credentials
    Whoami,
    /// Show the person and records the application can access
    Person,
    /// Read and write things in a record
    Things(ThingsArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Application id (GUID)
    #[arg(long)]
    pub app_id: String,
    /// PEM file with the application's private key
    #[arg(long, conflicts_with = "shared_secret", requires = "thumbprint")]
    pub key_file: Option<String>,
    /// Thumbprint of the registered application certificate
    #[arg(long)]
    pub thumbprint: Option<String>,
    /// Base64 shared secret of a provisioned application instance
    #[arg(long)]
    pub shared_secret: Option<String>,
    /// Act offline on behalf of this person id
    #[arg(long)]
    pub person: Option<String>,
    /// Default record id for `things` commands
    #[arg(long)]
    pub record: Option<String>,
    /// Store credentials without contacting the platform
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(clap::Args)]
pub struct ThingsArgs {
    #[command(subcommand)]
    pub command: ThingsCommands,

    /// Record id (defaults to the stored or selected record)
    #[arg(short, long, global = true)]
    pub record: Option<String>,
}

#[derive(Subcommand)]
pub enum ThingsCommands {
    /// Read a thing by id
    Get(ThingGetArgs),
    /// List things of a type
    List(ThingListArgs),
    /// Create a thing from a data-xml file
    Put(ThingPutArgs),
    /// Remove a thing
    Remove(ThingRemoveArgs),
}

#[derive(clap::Args)]
pub struct ThingGetArgs {
    /// Thing id (GUID)
    pub id: String,
}

#[derive(clap::Args)]
pub struct ThingListArgs {
    /// Thing type id (GUID)
    #[arg(long = "type")]
    pub type_id: String,
    /// Maximum number of things
    #[arg(long)]
    pub max: Option<u32>,
}

#[derive(clap::Args)]
pub struct ThingPutArgs {
    /// Thing type id (GUID)
    #[arg(long = "type")]
    pub type_id: String,
    /// Path to the data-xml payload (reads from stdin if omitted)
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(clap::Args)]
pub struct ThingRemoveArgs {
    /// Thing id (GUID)
    pub id: String,
    /// Version stamp the thing was read at
    #[arg(long)]
    pub version: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (server, format, record)
    pub key: String,
    /// Value
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_things_list() {
        let cli = Cli::try_parse_from([
            "hv",
            "--format",
            "table",
            "things",
            "--record",
            "11111111-2222-3333-4444-555555555555",
            "list",
            "--type",
            "3d34d87e-7fc1-4153-800f-f56592cb0d17",
            "--max",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Table));
        let Commands::Things(args) = cli.command else {
            panic!("expected things command");
        };
        assert!(args.record.is_some());
        let ThingsCommands::List(list) = args.command else {
            panic!("expected list");
        };
        assert_eq!(list.max, Some(10));
    }

    #[test]
    fn test_login_key_file_requires_thumbprint() {
        let result = Cli::try_parse_from([
            "hv",
            "login",
            "--app-id",
            "05a059c9-c309-4d8d-9fa8-9d8e0d9f6a27",
            "--key-file",
            "app.pem",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "hv",
            "login",
            "--app-id",
            "05a059c9-c309-4d8d-9fa8-9d8e0d9f6a27",
            "--key-file",
            "app.pem",
            "--shared-secret",
            "c2VjcmV0",
        ]);
        assert!(result.is_err());
    }
}
