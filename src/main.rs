use coral_inspect::cli::{Cli, Command};
use coral_inspect::config::Config;
use coral_inspect::dispatch::{self, ExportOutput, InspectOptions};
use coral_inspect::error::{status_text, AppError};
use coral_inspect::store::RespConnector;
use coral_inspect::telemetry::{init_telemetry, TelemetryConfig};
use serde::Serialize;
use tracing::{debug, error};

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    if let Err(e) = init_telemetry(telemetry) {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_sources(&cli)?;
    debug!("Using store at {} (db {})", config.server.address(), config.server.db);
    let connector = RespConnector::new(config.server.clone());

    match cli.command {
        Command::Scan {
            cursor,
            pattern,
            limit,
        } => {
            let result = dispatch::list_keys(&connector, cursor, &pattern, limit).await?;
            print_json(&result)?;
        }
        Command::Inspect {
            key,
            no_size_guard,
            raw,
        } => {
            let options = InspectOptions {
                size_guard: !no_size_guard,
                raw,
                max_content_size: config.display.max_content_size,
            };
            let result = dispatch::display_content(&connector, &key, options).await;
            print_json(&result)?;
        }
        Command::Export {
            format,
            keys_json,
            keys,
        } => {
            let output = match keys_json {
                Some(json) => dispatch::export_keys(&connector, &json, format.into()).await?,
                None => dispatch::export_key_list(&connector, &keys, format.into()).await?,
            };
            match output {
                ExportOutput::Commands(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                tree @ ExportOutput::Tree(_) => print_json(&tree)?,
            }
        }
        Command::Import {
            value_type,
            key,
            ttl,
            payload,
        } => {
            let result = dispatch::create_key(&connector, &value_type, &key, &ttl, &payload).await;
            println!("{}", status_text(&result));
            result?;
        }
        Command::Delete { keys } => {
            let result = dispatch::delete_keys(&connector, &keys).await;
            println!("{}", status_text(&result));
            let removed = result?;
            debug!("{} of {} keys existed", removed, keys.len());
        }
        Command::Info => {
            print!("{}", dispatch::server_info(&connector).await?);
        }
        Command::Databases => {
            println!("{}", dispatch::database_count(&connector).await);
        }
    }

    Ok(())
}
