use anyhow::{Context, Result};
use colored::Colorize;

use healthvault_client::Connection;
use healthvault_core::{ApplicationId, PersonId, RecordId};

use crate::auth::{self, StoredCredentials, StoredSigner};
use crate::cli::LoginArgs;
use crate::output::{print_error, print_success};

fn signer_from_args(args: &LoginArgs) -> Result<StoredSigner> {
    match (&args.key_file, &args.thumbprint, &args.shared_secret) {
        (Some(key_file), Some(thumbprint), None) => Ok(StoredSigner::Certificate {
            key_file: key_file.clone(),
            thumbprint: thumbprint.clone(),
        }),
        (None, _, Some(secret)) => Ok(StoredSigner::SharedSecret {
            secret: secret.clone(),
        }),
        _ => anyhow::bail!("Use either --key-file with --thumbprint, or --shared-secret"),
    }
}

pub fn credentials_from_args(server: &str, args: &LoginArgs) -> Result<StoredCredentials> {
    args.app_id
        .parse::<ApplicationId>()
        .with_context(|| format!("Invalid --app-id: {}", args.app_id))?;
    if let Some(person) = &args.person {
        person
            .parse::<PersonId>()
            .with_context(|| format!("Invalid --person: {person}"))?;
    }
    if let Some(record) = &args.record {
        record
            .parse::<RecordId>()
            .with_context(|| format!("Invalid --record: {record}"))?;
    }

    Ok(StoredCredentials {
        server: server.to_string(),
        application_id: args.app_id.clone(),
        signer: signer_from_args(args)?,
        person_id: args.person.clone(),
        record_id: args.record.clone(),
    })
}

pub async fn login(server: &str, args: &LoginArgs, profile: &str) -> Result<()> {
    let mut creds = credentials_from_args(server, args)?;

    if !args.no_verify {
        println!("Authenticating application {}...", args.app_id.cyan());
        let connection = crate::connect(&creds)?;
        let person = verify(&connection).await?;
        if creds.record_id.is_none() {
            creds.record_id = person.and_then(|p| p.selected_record_id.map(|id| id.to_string()));
        }
    }

    auth::save_credentials(profile, &creds)?;
    print_success(&format!(
        "Saved credentials for application {} on {}",
        creds.application_id.cyan(),
        server.cyan()
    ));
    Ok(())
}

/// Authenticate and, when acting for a person, read their info.
async fn verify(connection: &Connection) -> Result<Option<healthvault_client::PersonInfo>> {
    let credential = connection.credential();
    credential
        .session(connection)
        .await
        .context("The platform rejected the application credential")?;

    if matches!(credential.person(), healthvault_auth::PersonContext::Application) {
        return Ok(None);
    }
    let person = connection
        .person()
        .get_person_info()
        .await
        .context("Failed to read person info")?;
    Ok(Some(person))
}

pub fn logout(profile: &str) -> Result<()> {
    if auth::remove_credentials(profile)? {
        print_success("Logged out (credentials removed)");
    } else {
        println!("No credentials found for profile \"{profile}\"");
    }
    Ok(())
}

pub fn whoami(profile: &str) -> Result<()> {
    match auth::load_credentials(profile)? {
        Some(creds) => {
            println!("{}: {}", "Profile".cyan(), profile);
            println!("{}: {}", "Server".cyan(), creds.server.cyan());
            println!("{}: {}", "Application".cyan(), creds.application_id);
            match &creds.signer {
                StoredSigner::Certificate {
                    key_file,
                    thumbprint,
                } => {
                    println!(
                        "{}: certificate {} (key: {})",
                        "Auth".cyan(),
                        thumbprint,
                        key_file
                    );
                }
                StoredSigner::SharedSecret { .. } => {
                    println!("{}: shared secret", "Auth".cyan());
                }
            }
            if let Some(person) = &creds.person_id {
                println!("{}: {} (offline)", "Person".cyan(), person);
            }
            if let Some(record) = &creds.record_id {
                println!("{}: {}", "Record".cyan(), record);
            }
        }
        None => {
            print_error(&format!("Not logged in (profile: \"{profile}\")"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> LoginArgs {
        LoginArgs {
            app_id: "05a059c9-c309-4d8d-9fa8-9d8e0d9f6a27".into(),
            key_file: None,
            thumbprint: None,
            shared_secret: Some("c2VjcmV0".into()),
            person: None,
            record: None,
            no_verify: true,
        }
    }

    #[test]
    fn test_credentials_from_shared_secret_args() {
        let creds = credentials_from_args("https://hv.example.org/", &args()).unwrap();
        assert_eq!(
            creds.signer,
            StoredSigner::SharedSecret {
                secret: "c2VjcmV0".into()
            }
        );
        assert_eq!(creds.server, "https://hv.example.org/");
    }

    #[test]
    fn test_credentials_from_certificate_args() {
        let mut a = args();
        a.shared_secret = None;
        a.key_file = Some("app.pem".into());
        a.thumbprint = Some("AB:CD".into());
        let creds = credentials_from_args("https://hv.example.org/", &a).unwrap();
        assert!(matches!(creds.signer, StoredSigner::Certificate { .. }));
    }

    #[test]
    fn test_credentials_require_signer_and_valid_ids() {
        let mut a = args();
        a.shared_secret = None;
        assert!(credentials_from_args("https://hv.example.org/", &a).is_err());

        let mut a = args();
        a.app_id = "app".into();
        assert!(credentials_from_args("https://hv.example.org/", &a).is_err());

        let mut a = args();
        a.record = Some("record".into());
        assert!(credentials_from_args("https://hv.example.org/", &a).is_err());
    }
}
