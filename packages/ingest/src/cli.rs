//! Command-line interface for catalog ingestion.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{validate_domain, validate_version, DOMAINS};
use crate::coverage::{overview_layers, property_layers, Coverage, LayerSettings};
use crate::document::{objects_from_json, Bundle, StixObject};
use crate::edition::Edition;
use crate::error::{IngestError, Result};
use crate::linkage::LinkagePolicy;
use crate::listing::{mapping_rows, render, ListingFormat};
use crate::output::{save_bundle, save_layers, write_atomic};
use crate::pipeline::{build, BuildInputs, BuildOptions};
use crate::substitute::substitute;

/// Controlmap - Turn control catalogs and mapping tables into STIX documents.
#[derive(Parser)]
#[command(name = "controlmap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the controls and mappings bundles from tab-delimited tables.
    Build {
        /// Catalog table (tab-delimited)
        catalog: PathBuf,

        /// Mapping table (tab-delimited)
        mappings: PathBuf,

        /// Taxonomy dataset (JSON with an "objects" array)
        taxonomy: PathBuf,

        /// Catalog edition: r4 or r5
        #[arg(short, long, default_value = "r4")]
        edition: Edition,

        /// Controls bundle of a previous run, to keep its ids
        #[arg(long)]
        previous_controls: Option<PathBuf>,

        /// Mappings bundle of a previous run, to keep its ids
        #[arg(long)]
        previous_mappings: Option<PathBuf>,

        /// Skip enhancement ids unless a pattern names one explicitly
        #[arg(long)]
        exclude_parenthesized: bool,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render coverage heatmap layers.
    Heatmaps {
        /// Controls bundle
        controls: PathBuf,

        /// Mappings bundle
        mappings: PathBuf,

        /// Taxonomy dataset
        taxonomy: PathBuf,

        /// Framework id used in layer names (e.g., nist800-53-r4)
        #[arg(short, long)]
        framework: String,

        /// Taxonomy domain
        #[arg(short, long, default_value = DOMAINS[0])]
        domain: String,

        /// Taxonomy version (e.g., v9.0)
        #[arg(long = "taxonomy-version", default_value = "v9.0")]
        version: String,

        /// Output directory
        #[arg(short, long, default_value = "layers")]
        output: PathBuf,

        /// Remove the output directory before writing
        #[arg(long)]
        clear: bool,

        /// Write a README.md index of the layers
        #[arg(long)]
        build_directory: bool,

        /// List every entry instead of one marker per fully mapped family
        #[arg(long)]
        no_collapse: bool,
    },

    /// Replace a taxonomy dataset's mitigations with catalog entries.
    Substitute {
        /// Taxonomy bundle to substitute into
        base: PathBuf,

        /// Controls bundle
        controls: PathBuf,

        /// Mappings bundle
        mappings: PathBuf,

        /// Also add entries without any mapping
        #[arg(long)]
        keep_unmapped: bool,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List mappings as a table (.tsv, .csv or .md).
    List {
        /// Mappings bundle
        mappings: PathBuf,

        /// Controls bundle
        controls: PathBuf,

        /// Taxonomy dataset
        taxonomy: PathBuf,

        /// Output file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            catalog,
            mappings,
            taxonomy,
            edition,
            previous_controls,
            previous_mappings,
            exclude_parenthesized,
            output,
        } => {
            let options = BuildOptions::new(edition).with_policy(
                LinkagePolicy::new().exclude_parenthesized_keys(exclude_parenthesized),
            );
            build_command(
                &catalog,
                &mappings,
                &taxonomy,
                previous_controls.as_deref(),
                previous_mappings.as_deref(),
                &options,
                output.as_deref().unwrap_or(Path::new(".")),
            )
        }
        Commands::Heatmaps {
            controls,
            mappings,
            taxonomy,
            framework,
            domain,
            version,
            output,
            clear,
            build_directory,
            no_collapse,
        } => {
            validate_domain(&domain)?;
            validate_version(&version)?;
            let settings = LayerSettings {
                framework,
                domain,
                version,
            };
            heatmaps_command(
                &controls,
                &mappings,
                &taxonomy,
                &settings,
                &output,
                clear,
                build_directory,
                !no_collapse,
            )
        }
        Commands::Substitute {
            base,
            controls,
            mappings,
            keep_unmapped,
            output,
        } => substitute_command(&base, &controls, &mappings, keep_unmapped, &output),
        Commands::List {
            mappings,
            controls,
            taxonomy,
            output,
        } => list_command(&mappings, &controls, &taxonomy, &output),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn read_taxonomy(path: &Path) -> Result<Vec<StixObject>> {
    objects_from_json(&fs::read_to_string(path)?)
}

fn require_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(IngestError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Output path is not a directory: {}", dir.display()),
        )));
    }
    Ok(())
}

/// Execute the build command.
fn build_command(
    catalog: &Path,
    mappings: &Path,
    taxonomy: &Path,
    previous_controls: Option<&Path>,
    previous_mappings: Option<&Path>,
    options: &BuildOptions,
    output: &Path,
) -> Result<()> {
    require_dir(output)?;

    println!(
        "{} {} catalog {}",
        style("Building").bold(),
        style(options.edition).cyan(),
        style(catalog.display()).green()
    );
    println!();

    let catalog_text = fs::read_to_string(catalog)?;
    let mappings_text = fs::read_to_string(mappings)?;
    let taxonomy = read_taxonomy(taxonomy)?;
    let previous_controls = previous_controls.map(Bundle::from_path).transpose()?;
    let previous_mappings = previous_mappings.map(Bundle::from_path).transpose()?;

    let pb = spinner();
    pb.set_message("Assembling catalog...");

    let result = match build(
        BuildInputs {
            catalog: &catalog_text,
            mappings: &mappings_text,
            taxonomy: &taxonomy,
            previous_controls: previous_controls.as_ref(),
            previous_mappings: previous_mappings.as_ref(),
        },
        options,
    ) {
        Ok(result) => result,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message("Saving bundles...");

    let framework_id = options.edition.framework_id();
    let controls_path = output.join(format!("{framework_id}-controls.json"));
    let mappings_path = output.join(format!("{framework_id}-mappings.json"));
    let saved = save_bundle(&result.controls, &controls_path)
        .and_then(|()| save_bundle(&result.mappings, &mappings_path));
    pb.finish_and_clear();
    saved?;

    println!("  Entries: {}", result.entries.len());
    println!(
        "  Relationships: {}",
        result.controls.relationships().count()
    );
    println!("  Mappings: {}", result.mappings.objects.len());
    if !result.diagnostics.is_empty() {
        println!(
            "  Warnings: {}",
            style(result.diagnostics.len()).yellow().bold()
        );
    }

    println!();
    println!("{} {}", style("Saved to:").green().bold(), controls_path.display());
    println!("{} {}", style("Saved to:").green().bold(), mappings_path.display());

    Ok(())
}

/// Execute the heatmaps command.
#[allow(clippy::too_many_arguments)]
fn heatmaps_command(
    controls: &Path,
    mappings: &Path,
    taxonomy: &Path,
    settings: &LayerSettings,
    output: &Path,
    clear: bool,
    build_directory: bool,
    collapse: bool,
) -> Result<()> {
    require_dir(output)?;

    println!(
        "{} {} layers for {} {}",
        style("Rendering").bold(),
        style(&settings.framework).cyan(),
        settings.domain,
        style(&settings.version).green()
    );
    println!();

    let controls = Bundle::from_path(controls)?;
    let mappings = Bundle::from_path(mappings)?;
    let taxonomy = read_taxonomy(taxonomy)?;

    let pb = spinner();
    pb.set_message("Aggregating coverage...");

    let coverage = match Coverage::new(&controls, &mappings, &taxonomy) {
        Ok(coverage) => coverage.with_collapse(collapse),
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    let mut layers = overview_layers(&coverage, settings);
    layers.extend(property_layers(&coverage, &controls, settings));

    pb.set_message("Saving layers...");

    let index = build_directory.then_some(settings.framework.as_str());
    let written = save_layers(&layers, output, clear, index);
    pb.finish_and_clear();
    let written = written?;

    println!("  Layers: {}", layers.len());
    println!();
    println!(
        "{} {} ({} files)",
        style("Saved to:").green().bold(),
        output.display(),
        written.len()
    );

    Ok(())
}

/// Execute the substitute command.
fn substitute_command(
    base: &Path,
    controls: &Path,
    mappings: &Path,
    keep_unmapped: bool,
    output: &Path,
) -> Result<()> {
    println!(
        "{} catalog into {}",
        style("Substituting").bold(),
        style(base.display()).cyan()
    );

    let base = Bundle::from_path(base)?;
    let controls = Bundle::from_path(controls)?;
    let mappings = Bundle::from_path(mappings)?;

    let bundle = substitute(&base, &controls, &mappings, keep_unmapped);
    save_bundle(&bundle, output)?;

    println!("  Objects: {}", bundle.objects.len());
    println!();
    println!("{} {}", style("Saved to:").green().bold(), output.display());

    Ok(())
}

/// Execute the list command.
fn list_command(mappings: &Path, controls: &Path, taxonomy: &Path, output: &Path) -> Result<()> {
    let format = ListingFormat::from_path(output)?;

    let mappings = Bundle::from_path(mappings)?;
    let controls = Bundle::from_path(controls)?;
    let taxonomy = read_taxonomy(taxonomy)?;

    let rows = mapping_rows(&mappings, &controls, &taxonomy)?;
    write_atomic(output, &render(&rows, format)?)?;

    println!("  Rows: {}", rows.len());
    println!("{} {}", style("Saved to:").green().bold(), output.display());

    Ok(())
}
