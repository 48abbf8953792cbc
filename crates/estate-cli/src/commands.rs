use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use estate_server::{EstateServer, ServerConfig};
use estate_store::AssetAddresser;
use estate_types::EntityId;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Config(_) => cmd_config(&config),
        Command::Address(args) => cmd_address(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            ServerConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(ServerConfig::default()),
    }
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "{} Estate server on {} (blobs: {:?})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.blob.backend
    );
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(EstateServer::new(config).serve())?;
    Ok(())
}

fn cmd_config(config: &ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_address(config: &ServerConfig, args: AddressArgs) -> anyhow::Result<()> {
    let Some(policy) = config.catalog.get(&args.field) else {
        anyhow::bail!("'{}' is not an asset field", args.field);
    };
    let entity = args.entity.map(EntityId::new);
    let path = AssetAddresser::new(config.catalog.clone())
        .address(&args.field, entity.as_ref(), &args.filename);
    let locator = config.blob.codec().locator(&path);
    println!("  Field: {} ({}, max {} file(s))", args.field.yellow(), policy.category, policy.max_count);
    println!("  Path: {}", path.as_str().bold());
    println!("  Locator: {}", locator.as_str().cyan());
    Ok(())
}
