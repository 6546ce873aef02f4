#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use std::io::IsTerminal;

#[cfg(feature = "cli")]
use clap::Parser;

/// Find paint recipes for target colors
#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "paint-recipe", version, about)]
struct Args {
    /// Palette file: a JSON array of {"label", "rgb", "recipe"?} entries
    #[arg(short, long)]
    palette: PathBuf,

    /// Maximum number of distinct paints per recipe (1-3)
    #[arg(long)]
    max_colors: Option<usize>,

    /// Maximum total parts per recipe
    #[arg(long)]
    max_total_parts: Option<u32>,

    /// Flag suggestions whose match is below this percentage
    #[arg(long)]
    threshold: Option<f64>,

    /// Print the batch response as JSON
    #[arg(long)]
    json: bool,

    /// Show result swatches in color even when stdout is not a terminal
    #[arg(long)]
    color: bool,

    /// Target colors: "#rrggbb", "#rgb" or "rgb(r, g, b)"
    #[arg(required = true)]
    targets: Vec<paint_recipe::Rgb>,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::{bail, Context};
    use paint_recipe::services::worker::BatchResponse;
    use paint_recipe::{config::RecipeConfig, state::AppState, BasePalette, Paint, SuggestOptions};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    // Load env vars
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = RecipeConfig::from_env().context("invalid environment configuration")?;

    let palette_json = std::fs::read_to_string(&args.palette)
        .with_context(|| format!("failed to read palette {}", args.palette.display()))?;
    let palette: Vec<Paint> = serde_json::from_str(&palette_json)
        .with_context(|| format!("failed to parse palette {}", args.palette.display()))?;
    let base = BasePalette::from_paints(&palette);
    info!(
        paints = palette.len(),
        mixable = base.len(),
        path = %args.palette.display(),
        "palette loaded"
    );

    let options = SuggestOptions::new(
        args.max_colors.unwrap_or(config.options.max_colors),
        args.max_total_parts.unwrap_or(config.options.max_total_parts),
    );
    let threshold = args.threshold.unwrap_or(config.low_match_threshold);

    let state = AppState::new(config);
    let Some(response) = state
        .dispatcher
        .request(base.paints().to_vec(), args.targets.clone(), options)
        .await
    else {
        bail!("recipe batch was superseded");
    };

    if args.json {
        // Report indices into the palette file, not into its mixable subset
        let suggestions = response
            .suggestions
            .into_iter()
            .map(|suggestion| match suggestion {
                Some(s) => base
                    .to_display(s)
                    .map(Some)
                    .context("suggestion refers to a paint outside the palette"),
                None => Ok(None),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let response = BatchResponse {
            suggestions,
            ..response
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let color = args.color || std::io::stdout().is_terminal();

    for (target, suggestion) in args.targets.iter().zip(&response.suggestions) {
        match suggestion {
            Some(recipe) => {
                let flag = if recipe.is_low_match(threshold) {
                    "  (low match)"
                } else {
                    ""
                };
                println!(
                    "{} -> {}  = {}  dE {:.2}, {:.0}% match{}",
                    target.to_hex(),
                    recipe.describe(base.paints()),
                    swatch(recipe.result_rgb, color),
                    recipe.delta_e,
                    recipe.match_pct,
                    flag
                );
            }
            None => println!("{} -> no recipe", target.to_hex()),
        }
    }

    Ok(())
}

/// Hex code of `rgb`, printed on a background of that color when `color` is set
#[cfg(feature = "cli")]
fn swatch(rgb: paint_recipe::Rgb, color: bool) -> String {
    use paint_recipe::services::perceptual::is_dark;

    if !color {
        return rgb.to_hex();
    }
    let fg = if is_dark(rgb) { "97" } else { "30" };
    format!(
        "\x1b[{fg};48;2;{};{};{}m {} \x1b[0m",
        rgb.r,
        rgb.g,
        rgb.b,
        rgb.to_hex()
    )
}

#[cfg(not(feature = "cli"))]
fn main() {
    // Library-only build; the command line needs the `cli` feature
}
