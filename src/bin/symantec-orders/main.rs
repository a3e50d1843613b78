use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use clap::Parser;
use log::{info, warn};
use symantec_ca_plugin::{
    certificate,
    config::PluginConfig,
    plugin::{CertificatePlugin, CertificateStatus, OrderMeta, ResultDto, SymantecPlugin},
    storage::{Db, PluginMetaStore},
};

/// Drive Symantec/GeoTrust certificate orders from the command line.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// JSON file with vendor account settings.
    ///
    /// Any value may be overridden by the SYMANTEC_* environment variables.
    #[arg(long, short, env = "SYMANTEC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the order metadata database.
    #[arg(long, env = "SYMANTEC_DATA_DIR", default_value = "symantec-data")]
    data_dir: PathBuf,

    /// Comma-separated log directives, e.g. "warn,symantec_ca_plugin=debug".
    #[arg(
        long,
        env = "SYMANTEC_LOG",
        default_value = "warn,symantec_ca_plugin=info,symantec_orders=info"
    )]
    log_filter: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Submit a new order.
    Issue {
        order_id: String,
        /// JSON object with the order fields (ProductCode, ApproverEmail, CSR, ...).
        #[arg(long)]
        meta: PathBuf,
    },
    /// Reissue the certificate of an existing order.
    Reissue {
        order_id: String,
        /// JSON object with ReissueEmail and optionally CSR, OrderChanges, PartnerOrderID.
        #[arg(long)]
        meta: PathBuf,
    },
    /// Cancel an order.
    Cancel { order_id: String },
    /// Ask the CA where an order stands.
    Status {
        order_id: String,
        /// Write the issued certificate and chain here when available.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// List orders with stored metadata.
    List,
}

fn main() -> anyhow::Result<()> {
    let opts = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&opts.log_filter)
        .init();

    let store = PluginMetaStore::initialize(Db::initialize_with_path(&opts.data_dir)?)?;

    if let Command::List = opts.command {
        let orders = store.list_orders()?;
        println!("{}", serde_json::to_string_pretty(&orders)?);
        return Ok(());
    }

    let config = PluginConfig::load(opts.config.as_deref())?;
    let plugin = SymantecPlugin::from_config(&config);
    info!(
        "[symantec-orders] using order endpoint {}",
        plugin.ca().order_url()
    );

    let result = match &opts.command {
        Command::Issue { order_id, meta } => {
            let order_meta = read_order_meta(meta)?;
            let mut plugin_meta = store.load(order_id)?;
            let result = plugin.issue_certificate_request(order_id, &order_meta, &mut plugin_meta);
            store.save(order_id, &plugin_meta)?;
            result
        }
        Command::Reissue { order_id, meta } => {
            let order_meta = read_order_meta(meta)?;
            let plugin_meta = store.load(order_id)?;
            plugin.modify_certificate_request(order_id, &order_meta, &plugin_meta)
        }
        Command::Cancel { order_id } => plugin.cancel_certificate_request(order_id),
        Command::Status { order_id, out_dir } => {
            let result = plugin.check_certificate_status(order_id);
            if result.status == CertificateStatus::CertificateGenerated {
                describe_certificate(&result);
                if let Some(out_dir) = out_dir {
                    write_certificates(out_dir, order_id, &result)?;
                }
            }
            result
        }
        Command::List => unreachable!("Command handled prior to this match"),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn read_order_meta(path: &Path) -> anyhow::Result<OrderMeta> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read order metadata {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("order metadata {} is not valid JSON", path.display()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("order metadata {} must be a JSON object", path.display()),
    }
}

fn describe_certificate(result: &ResultDto) {
    let Some(leaf) = &result.certificate else {
        return;
    };
    match certificate::inspect(leaf) {
        Ok(summary) => info!(
            "[symantec-orders] issued {} (serial {}, expires {}, sha256 {})",
            summary.subject, summary.serial, summary.not_after, summary.fingerprint
        ),
        Err(err) => warn!("[symantec-orders] could not parse issued certificate: {err:#}"),
    }
}

fn write_certificates(out_dir: &Path, order_id: &str, result: &ResultDto) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    if let Some(leaf) = &result.certificate {
        let path = out_dir.join(format!("{order_id}.crt"));
        fs::write(&path, certificate::to_pem(leaf))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("[symantec-orders] wrote {}", path.display());
    }
    if !result.intermediates.is_empty() {
        let chain: String = result
            .intermediates
            .iter()
            .map(|entry| certificate::to_pem(&entry.cert))
            .collect();
        let path = out_dir.join(format!("{order_id}.chain.pem"));
        fs::write(&path, chain).with_context(|| format!("failed to write {}", path.display()))?;
        info!("[symantec-orders] wrote {}", path.display());
    }
    Ok(())
}
