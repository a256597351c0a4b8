use std::{error::Error, fs, path::PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use qrkit::service::{Config, GenerateRequest, QrResponse, QrService};

const CALLER: &str = "cli";

#[derive(Debug, Parser)]
#[command(name = "qrkit", version, about = "Generate, style and read QR codes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encode data and write the rendered image
    Generate {
        data: String,
        #[arg(long, default_value = "png")]
        format: String,
        #[arg(long, default_value_t = 256)]
        size: u32,
        #[arg(long, default_value = "#000000")]
        fg: String,
        #[arg(long, default_value = "#FFFFFF")]
        bg: String,
        #[arg(long, default_value = "M")]
        ec: String,
        #[arg(long, default_value = "square")]
        style: String,
        /// Image placed in the center, forces error correction H
        #[arg(long)]
        logo: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        logo_size: u8,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the payload of the QR code in an image
    Decode { image: PathBuf },
    /// Render a wifi, vcard or url template from a JSON object of fields
    Template {
        kind: String,
        fields: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qrkit=info")))
        .with_writer(std::io::stderr)
        .init();

    let service = QrService::new(Config::from_env())?;

    match Cli::parse().command {
        Command::Generate { data, format, size, fg, bg, ec, style, logo, logo_size, output } => {
            let mut req = GenerateRequest::new(data);
            req.format = format;
            req.size = size;
            req.fg_color = fg;
            req.bg_color = bg;
            req.error_correction = ec;
            req.style = style;
            req.logo_size = logo_size;
            if let Some(path) = logo {
                req.logo = Some(STANDARD.encode(fs::read(path)?));
            }

            let resp = service.generate(CALLER, &req)?.value;
            save(&resp, output)?;
        }
        Command::Decode { image } => {
            let decoded = service.decode(CALLER, &fs::read(image)?)?.value;
            println!("{}", decoded.data);
        }
        Command::Template { kind, fields, output } => {
            let fields: serde_json::Value = serde_json::from_str(&fields)?;
            let resp = service.template(CALLER, &kind, &fields)?.value;
            save(&resp, output)?;
        }
    }

    Ok(())
}

fn save(resp: &QrResponse, output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let path = output.unwrap_or_else(|| PathBuf::from(format!("qr.{}", resp.format)));
    fs::write(&path, &resp.bytes)?;
    info!(path = %path.display(), bytes = resp.bytes.len(), "Wrote QR code");
    println!("{}", resp.share_url);
    Ok(())
}
