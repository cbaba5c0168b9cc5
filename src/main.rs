use clap::Parser;
use pagecut::cdp::CdpLauncher;
use pagecut::{ConversionConfig, Converter, ExclusionSet, Orientation, PageFormat, RenderRequest};
use std::path::PathBuf;
use std::time::Duration;

/// Render a web page to PDF, removing matching elements first.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// The page URL to render.
    #[clap(short, long)]
    url: String,
    /// Output file name, written under `output/`.
    #[clap(short, long, default_value = "output.pdf")]
    output: String,
    /// Extra wait before export, in milliseconds.
    #[clap(short, long, default_value_t = 1000)]
    wait: u64,
    /// Paper format: A4, Letter or Legal.
    #[clap(short, long, default_value = "A4")]
    format: PageFormat,
    /// Landscape orientation
    #[clap(short, long)]
    landscape: bool,
    /// Page scale factor.
    #[clap(short, long, default_value_t = 1.0)]
    scale: f64,
    /// Comma separated selectors of elements to remove. ex: ".ad, #cookie-banner"
    #[clap(short, long, default_value = "")]
    exclude: String,
    /// Navigation timeout in milliseconds.
    #[clap(long, default_value_t = 60_000)]
    timeout: u64,
    /// How long inserted elements keep being removed, in milliseconds.
    #[clap(long, default_value_t = 3_000)]
    watch_window: u64,
    /// Chrome executable to launch instead of the auto-detected one.
    #[clap(long)]
    chrome: Option<PathBuf>,
    /// Print the conversion summary as JSON on stdout.
    #[clap(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    use env_logger::Env;
    let env = Env::default()
        .filter_or("RUST_LOG", "info")
        .write_style_or("RUST_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let request = RenderRequest::new(cli.url)
        .with_output(cli.output)
        .with_wait(Duration::from_millis(cli.wait))
        .with_format(cli.format)
        .with_orientation(if cli.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        })
        .with_scale(cli.scale)
        .with_exclusions(ExclusionSet::parse(&cli.exclude));

    let config = ConversionConfig {
        navigation_timeout: Duration::from_millis(cli.timeout),
        watch_window: Duration::from_millis(cli.watch_window),
        ..Default::default()
    };
    let launcher = CdpLauncher {
        chrome_path: cli.chrome,
    };

    match Converter::new(launcher, config).run(&request) {
        Ok(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(js) => println!("{}", js),
                    Err(e) => eprintln!("Failed to serialize summary: {}", e),
                }
            }
        }
        Err(e) => {
            eprintln!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
