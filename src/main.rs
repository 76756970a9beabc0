use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

use bim_qr::config::{
    display_base_url, parse_base_url, GenerateConfig, SheetLayout, DEFAULT_BASE_URL,
    DEFAULT_OUTPUT_DIR,
};
use bim_qr::filter::discipline_counts;
use bim_qr::model::discipline::{category_for_class, DISCIPLINE_CLASSES};
use bim_qr::parser::InputEncoding;
use bim_qr::pipeline::{generate, load_records, select_records};
use bim_qr::report::{log_invalid, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "bim-qr")]
#[command(about = "BIM QR - QR label sheets and a lookup site from a model's element schedule")]
#[command(version)]
struct Args {
    /// Element schedule (.csv, .tsv, .txt) or IFC model (.ifc)
    #[arg(required_unless_present = "list_disciplines")]
    input: Option<PathBuf>,

    /// Project name shown on labels and pages
    #[arg(short, long, required_unless_present = "list_disciplines")]
    project: Option<String>,

    /// Only generate elements of this discipline (case-insensitive)
    #[arg(short, long)]
    discipline: Option<String>,

    /// Public URL the site is deployed at
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL, value_parser = parse_base_url)]
    base_url: Url,

    /// Skip the PDF label sheet
    #[arg(long)]
    no_pdf: bool,

    /// Skip the static site
    #[arg(long)]
    no_site: bool,

    /// List disciplines in INPUT, or the built-in IFC class catalogue
    #[arg(long)]
    list_disciplines: bool,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Directory with element.hbs, index.hbs or 404.hbs overrides
    #[arg(long, value_name = "DIR")]
    templates: Option<PathBuf>,

    /// Text encoding of a delimited input
    #[arg(long, value_enum, default_value_t = InputEncoding::Auto)]
    encoding: InputEncoding,

    /// Label columns per page
    #[arg(long, default_value_t = 3)]
    columns: usize,

    /// Label rows per page
    #[arg(long, default_value_t = 6)]
    rows: usize,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(input) = &args.input else {
        print_catalogue();
        return Ok(());
    };

    let layout = SheetLayout::with_grid(args.columns, args.rows)?;
    let loaded = load_records(input, args.encoding)?;
    log_invalid(&loaded.normalized);

    if args.list_disciplines {
        let counts = discipline_counts(&loaded.normalized.records);
        println!("Disciplines in {} ({}):", input.display(), loaded.kind);
        for (discipline, count) in &counts {
            println!("  {discipline}: {count}");
        }
        return Ok(());
    }

    let project = args
        .project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| eyre!("a project name is required (--project)"))?;
    if let Some(model_name) = &loaded.model_project_name {
        debug!("Model project name: {model_name}");
    }

    let discipline = args
        .discipline
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let records = select_records(&loaded.normalized, discipline)?;

    let mut config = GenerateConfig::new(project, args.base_url.clone(), args.output.clone());
    config.discipline = discipline.map(str::to_string);
    config.generate_labels = !args.no_pdf;
    config.generate_site = !args.no_site;
    config.template_dir = args.templates.clone();
    config.layout = layout;

    let output = generate(&records, &config)?;

    let summary = RunSummary::new(&loaded.normalized, loaded.unmarked, &records);
    println!();
    print!("{summary}");
    if summary.has_rejections() {
        println!("Skipped rows are listed in the warnings above.");
    }
    println!();
    if let Some(site_dir) = &output.site_dir {
        println!("Site: {} ({} pages)", site_dir.display(), output.site_pages);
    }
    if let Some(hosting) = &output.hosting_config {
        println!("Hosting config: {}", hosting.display());
    }
    if let Some(pdf) = &output.label_sheet {
        println!("Labels: {}", pdf.display());
    }
    println!(
        "QR URLs: {}/e/{{mark}}/",
        display_base_url(&config.base_url)
    );

    Ok(())
}

fn print_catalogue() {
    println!("IFC class → discipline / category:");
    for (discipline, classes) in DISCIPLINE_CLASSES {
        println!();
        println!("{discipline}");
        for class in *classes {
            println!("  {class:<30} {}", category_for_class(class));
        }
    }
}
