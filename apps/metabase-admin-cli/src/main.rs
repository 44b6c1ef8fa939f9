//! `metabase-admin`: inspect and update Metabase collection permissions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use metabase_admin::{MetabaseClient, MetabaseConfig};
use metabase_admin_sdk::{
    AccessSpec, CollectionAccess, CollectionId, GroupId, Permission, PermissionGraphClient,
};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "metabase-admin", version)]
#[command(about = "Manage Metabase collection permissions")]
struct Cli {
    /// YAML config file; `METABASE_ADMIN_*` environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Establish a session and print it.
    Login,
    /// Inspect the permission graph.
    #[command(subcommand)]
    Graph(GraphCommand),
    /// Inspect or change the access to one collection.
    #[command(subcommand)]
    Access(AccessCommand),
}

#[derive(Subcommand, Debug)]
enum GraphCommand {
    /// Print the whole graph as JSON.
    Show,
}

#[derive(Subcommand, Debug)]
enum AccessCommand {
    /// Print the groups granted each permission on a collection.
    Show {
        #[arg(long)]
        collection: String,
    },
    /// Replace the access to a collection; groups not listed are revoked.
    Set(SetAccess),
}

#[derive(Args, Debug)]
struct SetAccess {
    #[arg(long)]
    collection: String,

    /// Groups granted read access.
    #[arg(long, value_delimiter = ',')]
    read: Vec<u64>,

    /// Groups granted write access; wins over `--read`.
    #[arg(long, value_delimiter = ',')]
    write: Vec<u64>,

    /// Access of the all-users group.
    #[arg(long = "default", default_value = "none")]
    default_access: Permission,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = MetabaseConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client = MetabaseClient::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.host))?;
    info!(mode = %client.session().mode(), "Session established");

    match cli.command {
        Command::Login => {
            println!("mode: {}", client.session().mode());
            println!("session_id: {}", client.session().token().expose_secret());
        }
        Command::Graph(GraphCommand::Show) => {
            let graph = client.permission_graph().await?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Access(AccessCommand::Show { collection }) => {
            let collection = CollectionId::from(collection);
            let access = client.collection_access(&collection).await?;
            print_access(&collection, &access);
        }
        Command::Access(AccessCommand::Set(args)) => set_access(&client, args).await?,
    }

    Ok(())
}

async fn set_access(client: &MetabaseClient, args: SetAccess) -> Result<()> {
    let collection = CollectionId::from(args.collection);
    let spec = AccessSpec::from_lists(
        args.read.into_iter().map(GroupId),
        args.write.into_iter().map(GroupId),
        args.default_access,
    );
    let ignored: Vec<_> = spec
        .grants()
        .keys()
        .filter(|group| group.is_reserved())
        .map(ToString::to_string)
        .collect();
    if !ignored.is_empty() {
        warn!(groups = %ignored.join(","), "Grants for built-in groups are ignored");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current request");
            on_interrupt.cancel();
        }
    });

    let graph = client
        .update_collection_access_cancellable(&collection, &spec, &cancel)
        .await
        .with_context(|| format!("updating access to collection {collection}"))?;
    info!(revision = graph.revision, "Access updated");

    print_access(&collection, &metabase_admin::extract(&graph.groups, &collection));
    Ok(())
}

fn print_access(collection: &CollectionId, access: &CollectionAccess) {
    let list = |permission| {
        access
            .groups_with(permission)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };

    println!("collection: {collection}");
    println!(
        "default: {}",
        access
            .default_access
            .map_or("(unset)", Permission::as_str)
    );
    println!("read: {}", list(Permission::Read));
    println!("write: {}", list(Permission::Write));
    println!("none: {}", list(Permission::None));
}
