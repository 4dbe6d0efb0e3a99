//! Stratus CLI - drive resource lifecycles from the command line.
//!
//! This is the entry point for the `stratus` binary. Desired state is
//! supplied as JSON spec files; observed state and lookup results are
//! printed as JSON on stdout.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

use stratus_api::{ApiConfig, ControlPlane, HttpControlPlane};
use stratus_control::{
    ArchiveSpec, DataStorageSpec, DataStorages, Filter, GlobalAddressSpec, GlobalAddresses,
    LbSpec, LoadBalancers, PrivateNetworkSpec, PrivateNetworks, StorageArchives,
    SystemStorageSpec, SystemStorages, VirtualServers, VmSpec,
};
use stratus_core::ResourceId;

/// Stratus CLI - drive resource lifecycles from the command line.
#[derive(Parser, Debug)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API access key id.
    #[arg(long, env = "STRATUS_ACCESS_KEY", hide_env_values = true)]
    access_key: String,

    /// API secret access key.
    #[arg(long, env = "STRATUS_SECRET_KEY", hide_env_values = true)]
    secret_key: String,

    /// Account service code scoping every call.
    #[arg(long, env = "STRATUS_ACCOUNT_CODE")]
    account: String,

    /// Control-plane endpoint override.
    #[arg(long, env = "STRATUS_ENDPOINT")]
    endpoint: Option<String>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Virtual server lifecycles.
    #[command(subcommand)]
    Server(ServerCmd),
    /// Firewall/load-balancer appliance lifecycles.
    #[command(subcommand)]
    Lb(LbCmd),
    /// System storage (boot device) lifecycles.
    #[command(subcommand, name = "system-storage")]
    SystemStorage(SystemStorageCmd),
    /// Data storage (additional device) lifecycles.
    #[command(subcommand, name = "data-storage")]
    DataStorage(DataStorageCmd),
    /// Private network lifecycles.
    #[command(subcommand)]
    Network(NetworkCmd),
    /// Global address block lifecycles.
    #[command(subcommand)]
    Address(AddressCmd),
    /// Storage archive lifecycles and custom OS image lookup.
    #[command(subcommand)]
    Archive(ArchiveCmd),
}

/// Shared arguments for lookup queries.
#[derive(ClapArgs, Debug)]
struct FindArgs {
    /// Match a specific service code directly, skipping the filters.
    #[arg(long)]
    id: Option<String>,

    /// Field filter, as `name=value`. Repeatable.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<Filter>,

    /// Break ties by picking the most recent candidate.
    #[arg(long, default_value = "false")]
    most_recent: bool,
}

#[derive(Subcommand, Debug)]
enum ServerCmd {
    /// Provision a server from a JSON spec file.
    Create {
        /// Path to the spec file.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of a server.
    Show { id: String },
    /// Reconcile a server toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel a server contract.
    Delete { id: String },
    /// Resolve exactly one server from the account listing.
    Find(FindArgs),
}

#[derive(Subcommand, Debug)]
enum LbCmd {
    /// Provision an appliance from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of an appliance.
    Show { id: String },
    /// Reconcile an appliance toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel an appliance contract.
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SystemStorageCmd {
    /// Provision a boot device from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of a boot device.
    Show { id: String },
    /// Reconcile a boot device toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel a boot device contract.
    Delete { id: String },
    /// Resolve exactly one boot device from the account listing.
    Find(FindArgs),
}

#[derive(Subcommand, Debug)]
enum DataStorageCmd {
    /// Provision a data device from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of a data device.
    Show { id: String },
    /// Reconcile a data device toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel a data device contract.
    Delete { id: String },
    /// Resolve exactly one data device from the account listing.
    Find(FindArgs),
}

#[derive(Subcommand, Debug)]
enum NetworkCmd {
    /// Provision a network segment from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of a segment.
    Show { id: String },
    /// Reconcile a segment toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel a segment contract.
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum AddressCmd {
    /// Contract an address block from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of a block.
    Show { id: String },
    /// Reconcile a block toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel a block contract.
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ArchiveCmd {
    /// Contract an archive from a JSON spec file.
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the observed state of an archive.
    Show { id: String },
    /// Reconcile an archive toward a JSON spec file.
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Cancel an archive contract.
    Delete { id: String },
    /// Resolve exactly one custom OS image from the account's archive.
    FindImage(FindArgs),
}

fn parse_filter(raw: &str) -> Result<Filter, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    if name.is_empty() {
        return Err(format!("empty filter name in {raw:?}"));
    }
    Ok(Filter::new(name, value))
}

fn load_spec<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading spec file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing spec file {}", path.display()))
}

fn parse_resource_id(raw: &str) -> anyhow::Result<ResourceId> {
    raw.parse()
        .with_context(|| format!("invalid service code {raw:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("stratus=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = ApiConfig::new(&args.access_key, &args.secret_key, &args.account);
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    let client: Arc<dyn ControlPlane> = Arc::new(HttpControlPlane::new(config));
    let account = args.account.clone();

    match args.command {
        Command::Server(cmd) => run_server(cmd, client, account).await,
        Command::Lb(cmd) => run_lb(cmd, client, account).await,
        Command::SystemStorage(cmd) => run_system_storage(cmd, client, account).await,
        Command::DataStorage(cmd) => run_data_storage(cmd, client, account).await,
        Command::Network(cmd) => run_network(cmd, client, account).await,
        Command::Address(cmd) => run_address(cmd, client, account).await,
        Command::Archive(cmd) => run_archive(cmd, client, account).await,
    }
}

async fn run_server(
    cmd: ServerCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let servers = VirtualServers::new(client, account);
    match cmd {
        ServerCmd::Create { file } => {
            let spec: VmSpec = load_spec(&file)?;
            let created = servers.create(&spec).await?;
            print_json(&created)
        }
        ServerCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&servers.read(&id).await?)
        }
        ServerCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: VmSpec = load_spec(&file)?;
            let mut observed = servers.read(&id).await?;
            servers.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        ServerCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            servers.delete(&id).await?;
            Ok(())
        }
        ServerCmd::Find(find) => {
            let picked = servers
                .find(find.id.as_deref(), &find.filters, find.most_recent)
                .await?;
            print_json(&picked)
        }
    }
}

async fn run_lb(
    cmd: LbCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let appliances = LoadBalancers::new(client, account);
    match cmd {
        LbCmd::Create { file } => {
            let spec: LbSpec = load_spec(&file)?;
            let id = appliances.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        LbCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&appliances.read(&id).await?)
        }
        LbCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: LbSpec = load_spec(&file)?;
            let mut observed = appliances.read(&id).await?;
            appliances.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        LbCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            appliances.delete(&id).await?;
            Ok(())
        }
    }
}

async fn run_system_storage(
    cmd: SystemStorageCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let devices = SystemStorages::new(client, account);
    match cmd {
        SystemStorageCmd::Create { file } => {
            let spec: SystemStorageSpec = load_spec(&file)?;
            let id = devices.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        SystemStorageCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&devices.read(&id).await?)
        }
        SystemStorageCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: SystemStorageSpec = load_spec(&file)?;
            let mut observed = devices.read(&id).await?;
            devices.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        SystemStorageCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            devices.delete(&id).await?;
            Ok(())
        }
        SystemStorageCmd::Find(find) => {
            let picked = devices
                .find(find.id.as_deref(), &find.filters, find.most_recent)
                .await?;
            print_json(&picked)
        }
    }
}

async fn run_data_storage(
    cmd: DataStorageCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let devices = DataStorages::new(client, account);
    match cmd {
        DataStorageCmd::Create { file } => {
            let spec: DataStorageSpec = load_spec(&file)?;
            let id = devices.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        DataStorageCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&devices.read(&id).await?)
        }
        DataStorageCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: DataStorageSpec = load_spec(&file)?;
            let mut observed = devices.read(&id).await?;
            devices.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        DataStorageCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            devices.delete(&id).await?;
            Ok(())
        }
        DataStorageCmd::Find(find) => {
            let picked = devices
                .find(find.id.as_deref(), &find.filters, find.most_recent)
                .await?;
            print_json(&picked)
        }
    }
}

async fn run_network(
    cmd: NetworkCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let networks = PrivateNetworks::new(client, account);
    match cmd {
        NetworkCmd::Create { file } => {
            let spec: PrivateNetworkSpec = load_spec(&file)?;
            let id = networks.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        NetworkCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&networks.read(&id).await?)
        }
        NetworkCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: PrivateNetworkSpec = load_spec(&file)?;
            let mut observed = networks.read(&id).await?;
            networks.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        NetworkCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            networks.delete(&id).await?;
            Ok(())
        }
    }
}

async fn run_address(
    cmd: AddressCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let blocks = GlobalAddresses::new(client, account);
    match cmd {
        AddressCmd::Create { file } => {
            let spec: GlobalAddressSpec = load_spec(&file)?;
            let id = blocks.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        AddressCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&blocks.read(&id).await?)
        }
        AddressCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: GlobalAddressSpec = load_spec(&file)?;
            let mut observed = blocks.read(&id).await?;
            blocks.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        AddressCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            blocks.delete(&id).await?;
            Ok(())
        }
    }
}

async fn run_archive(
    cmd: ArchiveCmd,
    client: Arc<dyn ControlPlane>,
    account: String,
) -> anyhow::Result<()> {
    let archives = StorageArchives::new(client, account);
    match cmd {
        ArchiveCmd::Create { file } => {
            let spec: ArchiveSpec = load_spec(&file)?;
            let id = archives.create(&spec).await?;
            println!("{id}");
            Ok(())
        }
        ArchiveCmd::Show { id } => {
            let id = parse_resource_id(&id)?;
            print_json(&archives.read(&id).await?)
        }
        ArchiveCmd::Update { id, file } => {
            let id = parse_resource_id(&id)?;
            let desired: ArchiveSpec = load_spec(&file)?;
            let mut observed = archives.read(&id).await?;
            archives.update(&id, &mut observed, &desired).await?;
            print_json(&observed)
        }
        ArchiveCmd::Delete { id } => {
            let id = parse_resource_id(&id)?;
            archives.delete(&id).await?;
            Ok(())
        }
        ArchiveCmd::FindImage(find) => {
            let picked = archives
                .find_image(find.id.as_deref(), &find.filters, find.most_recent)
                .await?;
            print_json(&picked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn filters_parse_as_name_value_pairs() {
        let filter = parse_filter("label=^web-").unwrap();
        assert_eq!(filter.name, "label");
        assert_eq!(filter.value, "^web-");

        assert!(parse_filter("label").is_err());
        assert!(parse_filter("=x").is_err());
    }
}
