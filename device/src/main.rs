use chrono::Local;
use clap::Parser;
use device::{ClientError, DeviceIdentity, RewriteClient};
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;

fn setup_logger() {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Where the device id and secret are kept between runs.
    #[arg(long, default_value = "device_identity.json")]
    identity: PathBuf,

    #[arg(long)]
    french: bool,

    /// Text to rewrite.
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    setup_logger();

    let args = Args::parse();

    let mut identity = DeviceIdentity::load_or_generate(&args.identity)?;
    info!("Device ID: {}", identity.device_id);
    if !identity.registered {
        info!("Device not registered yet, sending bootstrap secret");
    }

    let client = RewriteClient::new(&args.server)?;
    let was_registered = identity.registered;

    match client.rewrite(&mut identity, &args.text, args.french).await {
        Ok(rewritten) => {
            if identity.registered != was_registered {
                identity.save(&args.identity)?;
            }
            println!("{}", rewritten);
            Ok(())
        }
        Err(e) => {
            error!("Rewrite failed: {}", e);
            Err(e)
        }
    }
}
