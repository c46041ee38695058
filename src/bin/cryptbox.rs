use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use cryptbox::config_models::cli_args;
use cryptbox::config_models::cli_args::Command;
use cryptbox::BoxConfig;
use cryptbox::CryptBox;
use cryptbox::DataDirectory;
use cryptbox::LifecycleEvent;
use cryptbox::LifecycleHost;
use cryptbox::LifecycleHub;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

pub fn main() -> Result<()> {
    // Fetch the CLI arguments
    let args: cli_args::Args = cli_args::Args::parse();

    // Set up logger.
    // Configure logger to use ISO-8601, of which rfc3339 is a subset.
    // Accepted `RUST_LOG` values are `trace`, `debug`, `info`, `warn`,
    // and `error`. Logs go to stderr; stdout carries the box contents.
    let info_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(info_env_filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Unable to set global default subscriber")?;

    run(args)
}

fn run(args: cli_args::Args) -> Result<()> {
    let data_dir = DataDirectory::get(args.data_dir.clone())?;
    let config = BoxConfig::new(args.name.clone(), &data_dir).absorb_options(&args);
    let candidate = config.key().map(|key| Zeroizing::new(key.to_string()));

    let hub = LifecycleHub::new();
    let host: Arc<dyn LifecycleHost> = hub.clone();
    let crypt_box = CryptBox::construct(config, Some(host))
        .with_context(|| format!("Could not open box '{}' in {}", args.name, data_dir))?;

    let command = args.command.clone().unwrap_or(Command::Dump);

    if command == Command::Verify {
        let Some(candidate) = candidate else {
            bail!(
                "No password to verify. Pass --password or set {}",
                cli_args::BOX_PASSWORD_ENV_VAR
            );
        };
        if !crypt_box.verify_key(&candidate) {
            bail!("Password does not open box '{}'", crypt_box.name());
        }
        println!("ok");
        return Ok(());
    }

    crypt_box
        .load(None)
        .with_context(|| format!("Could not load {}", crypt_box.path().display()))?;

    match command {
        Command::Get { key } => match crypt_box.get(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => bail!("'{}' is not set", key),
        },
        Command::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            crypt_box.set(&key, value)?;
        }
        Command::Unset { key } => {
            if crypt_box.remove(&key)?.is_none() {
                info!("'{}' was not set", key);
            }
        }
        Command::Increment { key, amount } => {
            println!("{}", crypt_box.increment_by(&key, amount)?);
        }
        Command::Decrement { key, amount } => {
            println!("{}", crypt_box.decrement_by(&key, amount)?);
        }
        Command::Header => {
            let header = crypt_box
                .header()
                .context("Box has no header after loading")?;
            println!("{}", serde_json::to_string_pretty(&header)?);
        }
        Command::Dump => {
            let contents = crypt_box
                .keys()
                .into_iter()
                .filter_map(|key| crypt_box.get(&key).map(|value| (key, value)))
                .collect::<serde_json::Map<_, _>>();
            println!("{}", serde_json::to_string_pretty(&contents)?);
        }
        Command::Clear => crypt_box.clear()?,
        Command::Wipe => crypt_box.wipe()?,
        Command::Verify => unreachable!("handled above"),
    }

    // a loaded box persists itself on exit
    hub.notify(LifecycleEvent::Exit);
    Ok(())
}
