//! `twallet` — developer CLI for the digital wallet issuer API.
//!
//! Usage:
//!   twallet template --name "Member Card" --field name:姓名:9:cover
//!   twallet instance --template-id 318 --field name=王小明 --wait
//!   twallet status --id 9001

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twallet_core::{
    CardIssuer, ExpireUnit, ExpiryLength, FieldSpec, InstanceFieldValue, IssuerConfig,
    PollState, TemplateSpec, ValidationRule, SANDBOX_BASE_URL,
};

#[derive(Parser, Debug)]
#[command(name = "twallet")]
#[command(about = "Register card templates, issue cards and watch for their activation")]
struct Cli {
    /// Access token received by mail after registering as an issuer
    #[arg(long, env = "TWALLET_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Issuer service to talk to
    #[arg(long, env = "TWALLET_BASE_URL", default_value = SANDBOX_BASE_URL)]
    base_url: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a card template
    Template {
        /// Display name of the template
        #[arg(long)]
        name: String,

        /// Unique template code; defaults to `t_<unix seconds>`
        #[arg(long)]
        serial_no: Option<String>,

        /// Validity period, at most four digits
        #[arg(long, default_value = "1")]
        expire_num: String,

        /// Validity period unit: DAY, MONTH or YEAR
        #[arg(long, default_value = "MONTH")]
        expire_unit: ExpireUnit,

        /// Let other issuers use and verify the template
        #[arg(long)]
        expose: bool,

        /// Field as `ename:cname:rule-id[:cover]`; the first one is the card caption
        #[arg(long = "field", required = true, value_parser = parse_field)]
        fields: Vec<FieldSpec>,

        /// JPEG or PNG cover image
        #[arg(long)]
        cover: Option<PathBuf>,
    },
    /// Issue a card instance and print its QR code payload
    Instance {
        /// Numeric id of the template
        #[arg(long)]
        template_id: i64,

        /// Field content as `ename=content`
        #[arg(long = "field", value_parser = parse_value)]
        fields: Vec<InstanceFieldValue>,

        /// Wait until the holder has scanned the card
        #[arg(long)]
        wait: bool,
    },
    /// Print the activation correlation id of a card instance
    Status {
        /// Numeric id of the instance
        #[arg(long)]
        id: i64,
    },
}

fn parse_field(value: &str) -> Result<FieldSpec, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let (key, label, rule, cover) = match parts.as_slice() {
        [key, label, rule] => (*key, *label, *rule, false),
        [key, label, rule, "cover"] => (*key, *label, *rule, true),
        _ => return Err(format!("`{value}` is not `ename:cname:rule-id[:cover]`")),
    };
    let rule: u32 = rule
        .parse()
        .map_err(|_| format!("`{rule}` is not a validation rule id"))?;

    let field = FieldSpec::basic(label, key, ValidationRule::from(rule));
    Ok(if cover { field.on_cover() } else { field })
}

fn parse_value(value: &str) -> Result<InstanceFieldValue, String> {
    value
        .split_once('=')
        .map(|(ename, content)| InstanceFieldValue::new(ename, content))
        .ok_or_else(|| format!("`{value}` is not `ename=content`"))
}

fn default_serial_no() -> Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    Ok(format!("t_{}", now.as_secs()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = IssuerConfig::default().with_base_url(&cli.base_url);
    let issuer = CardIssuer::with_config(config, SecretString::from(cli.access_token));

    match cli.command {
        Command::Template {
            name,
            serial_no,
            expire_num,
            expire_unit,
            expose,
            fields,
            cover,
        } => {
            let serial_no = match serial_no {
                Some(serial_no) => serial_no,
                None => default_serial_no()?,
            };
            let mut spec =
                TemplateSpec::new(&serial_no, &name, ExpiryLength::new(&expire_num)?, expire_unit)
                    .exposed(expose);
            spec.fields = fields;
            if let Some(path) = cover {
                let bytes = std::fs::read(&path)
                    .wrap_err_with(|| format!("reading cover {}", path.display()))?;
                spec = spec.with_cover(bytes);
            }

            let echoed = issuer.create_template(&spec).await?;
            info!("template {serial_no} registered");
            println!("{}", serde_json::to_string_pretty(&echoed.into_inner())?);
        }
        Command::Instance {
            template_id,
            fields,
            wait,
        } => {
            let on_activated = wait.then(|| -> twallet_core::ActivationCallback {
                Box::new(|vc_cid: String| info!("card scanned, vcCid={vc_cid}"))
            });
            let issued = issuer
                .create_instance(template_id, &fields, on_activated)
                .await?;
            println!("id: {}", issued.record.id);
            println!("deep link: {}", issued.record.deep_link);
            println!("qr code: {}", issued.record.qr_code);

            if let Some(handle) = issued.activation {
                info!(
                    "waiting up to {}s for the holder to scan the card",
                    issuer.config().polling.ceiling().as_secs()
                );
                match handle.wait().await {
                    PollState::Activated(vc_cid) => println!("vcCid: {vc_cid}"),
                    PollState::TimedOut => {
                        warn!("the card was not scanned in time");
                        return Err(eyre!("activation timed out"));
                    }
                    other => return Err(eyre!("activation session ended: {other:?}")),
                }
            }
        }
        Command::Status { id } => match issuer.fetch_status(id).await? {
            Some(vc_cid) => println!("activated, vcCid: {vc_cid}"),
            None => println!("not activated yet"),
        },
    }

    Ok(())
}
