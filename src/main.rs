use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "overlay-composer",
    version,
    about = "Overlay outlined, centered text on an image"
)]
struct Cli {
    /// Image to draw on (png, jpeg, webp, ...)
    #[arg(short = 'i', long = "image", required_unless_present = "server")]
    image: Option<PathBuf>,

    /// Overlay text (read from stdin when omitted)
    #[arg(short = 't', long = "text")]
    text: Option<String>,

    /// Text color (#RRGGBB, rgb(...), or a color name; default from settings)
    #[arg(short = 'c', long = "color")]
    color: Option<String>,

    /// Output backend: raster (png), css (html preview), document (pdf)
    #[arg(short = 'b', long = "backend", default_value = "raster")]
    backend: String,

    /// Output path (default: result.<ext>)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Font family name, font file path, URL, or "builtin"
    #[arg(short = 'f', long = "font-family")]
    font_family: Option<String>,

    /// Font size in pixels (default: image width / 20, at least 12)
    #[arg(short = 's', long = "font-size")]
    font_size: Option<f32>,

    /// Outline color (default from settings)
    #[arg(long = "outline-color")]
    outline_color: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Run the HTTP server on the given address (e.g. 127.0.0.1:11223)
    #[arg(long = "server")]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    overlay_composer::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server {
        let settings = overlay_composer::settings::load_settings(
            cli.read_settings.as_deref().map(Path::new),
        )?;
        return overlay_composer::server::run_server(settings, addr).await;
    }

    let image = cli
        .image
        .ok_or_else(|| anyhow!("--image is required"))?;
    let input = if cli.text.is_none() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| anyhow!("stdin must be UTF-8 text: {}", err))?;
        Some(buffer.trim_end_matches(['\r', '\n']).to_string())
    } else {
        None
    };

    let config = overlay_composer::Config {
        image,
        text: cli.text,
        color: cli.color,
        backend: cli.backend,
        output: cli.output,
        font_family: cli.font_family,
        font_size: cli.font_size,
        outline_color: cli.outline_color,
        settings_path: cli.read_settings,
    };
    let output = overlay_composer::run(config, input).await?;
    println!("{}", output.display());
    Ok(())
}
