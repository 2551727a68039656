use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use province_scores::aggregator::{AggregationRequest, Aggregator, ProvinceAggregateScore, RankingReport};
use province_scores::compare::{compare_provinces, ProvinceComparison};
use province_scores::config::{Config, ConfigOverrides};
use province_scores::lookup::{province_history, search_provinces, ProvinceHistory};
use province_scores::output::csv::{
    categories_to_csv, comparison_to_csv, history_to_csv, province_to_csv, provinces_to_csv,
    ranking_to_csv, weights_to_csv,
};
use province_scores::output::render_json;
use province_scores::output::table::{
    render_categories_table, render_comparison_table, render_history_table, render_import_table,
    render_province_table, render_provinces_table, render_ranking_table, render_weights_table,
};
use province_scores::scoring::weights::{
    parse_weight_list, rebalance_after_edit, resolve_weights, WeightSummary,
};
use province_scores::scoring::{
    parse_id_list, Category, CategoryId, Province, ProvinceId, Sector,
};
use province_scores::server::run_server;
use province_scores::source::{source_from_config, ScoreSource};
use province_scores::store::ScoreStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "province-scores",
    about = "Weighted investment score rankings for Turkish provinces"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// SQLite store to read from (switches the source to sqlite)
    #[arg(long)]
    db: Option<String>,
    /// Remote score service base URL (switches the source to http)
    #[arg(long = "source-url")]
    source_url: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
struct SelectionArgs {
    /// Comma-separated category ids, 1 to 3; the last one balances
    #[arg(long)]
    categories: String,
    /// Comma-separated weights aligned with --categories
    #[arg(long)]
    weights: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rank {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        sector: Option<Sector>,
        #[arg(long)]
        top: Option<usize>,
    },
    Province {
        id: ProvinceId,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        sector: Option<Sector>,
    },
    Compare {
        left: ProvinceId,
        right: ProvinceId,
        #[arg(long)]
        category: CategoryId,
        #[arg(long)]
        sector: Option<Sector>,
    },
    Weights {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Edit one weight, e.g. `--adjust 3=0.4`
        #[arg(long, value_parser = parse_adjustment)]
        adjust: Option<(CategoryId, f64)>,
    },
    Import {
        file: PathBuf,
        #[arg(long)]
        force: bool,
    },
    Provinces,
    Categories,
    Search {
        query: String,
    },
    /// Yearly scores for a province given by id or name
    History {
        province: String,
        #[arg(long)]
        category: Option<CategoryId>,
    },
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        source_url: cli.source_url.clone(),
    });
    init_tracing(&config);

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }
    if let Commands::Import { file, force } = &cli.command {
        let store = ScoreStore::open(&config.resolved_db_path())?;
        let summary = store.import_csv(file, *force)?;
        match cli.output {
            OutputFormat::Table => println!("{}", render_import_table(&summary)),
            OutputFormat::Json => println!("{}", render_json(&summary)?),
            OutputFormat::Csv => {
                warn!("CSV output for import not implemented, using JSON");
                println!("{}", render_json(&summary)?);
            }
        }
        return Ok(());
    }
    if let Commands::Weights { selection, adjust } = &cli.command {
        let ids = parse_id_list(&selection.categories)?;
        let proposed = selection
            .weights
            .as_deref()
            .map(|raw| parse_weight_list(&ids, raw));
        let mut weights = resolve_weights(config.scoring.weight_policy, &ids, proposed.as_ref())?;
        if let Some((edited, value)) = adjust {
            weights = rebalance_after_edit(&ids, &weights.to_map(), *edited, *value)?;
        }
        return print_weights(&WeightSummary::new(weights), cli.output);
    }

    let source = source_from_config(&config)?;
    info!(source = source.name(), "using score source");
    let aggregator = Aggregator::new(
        source.clone(),
        config.scoring.weight_policy,
        config.scoring.default_sector,
    );

    match &cli.command {
        Commands::Rank {
            selection,
            sector,
            top,
        } => {
            let request = build_request(selection, *sector, None)?;
            let report = aggregator.ranking(&request).await?;
            print_ranking(&report, *top, cli.output)?;
        }
        Commands::Province {
            id,
            selection,
            sector,
        } => {
            let request = build_request(selection, *sector, Some(*id))?;
            let score = aggregator.province(&request, *id).await?;
            let categories = category_labels(source.as_ref(), cli.output).await;
            print_province(&score, &categories, cli.output)?;
        }
        Commands::Compare {
            left,
            right,
            category,
            sector,
        } => {
            let sector = sector.unwrap_or(config.scoring.default_sector);
            let comparison =
                compare_provinces(source.as_ref(), *left, *right, *category, sector).await?;
            print_comparison(&comparison, cli.output)?;
        }
        Commands::Provinces => {
            let provinces = source.provinces().await?;
            print_provinces(&provinces, cli.output)?;
        }
        Commands::Search { query } => {
            let found = search_provinces(source.as_ref(), query).await?;
            if found.is_empty() {
                warn!("no province matches `{query}`");
            }
            print_provinces(&found, cli.output)?;
        }
        Commands::History { province, category } => {
            let history = province_history(source.as_ref(), province, *category).await?;
            let categories = category_labels(source.as_ref(), cli.output).await;
            print_history(&history, &categories, cli.output)?;
        }
        Commands::Categories => {
            let categories = source.categories().await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_categories_table(&categories)),
                OutputFormat::Json => println!("{}", render_json(&categories)?),
                OutputFormat::Csv => println!("{}", categories_to_csv(&categories)?),
            }
        }
        Commands::Weights { .. }
        | Commands::Import { .. }
        | Commands::Serve { .. }
        | Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_config_command(command: &Commands, config: &Config, path: &Path) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(path)?;
        println!("Wrote config template to {}", path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn build_request(
    selection: &SelectionArgs,
    sector: Option<Sector>,
    province_id: Option<ProvinceId>,
) -> Result<AggregationRequest> {
    let category_ids = parse_id_list(&selection.categories)?;
    let weights = selection
        .weights
        .as_deref()
        .map(|raw| parse_weight_list(&category_ids, raw));
    Ok(AggregationRequest {
        category_ids,
        weights,
        sector,
        province_id,
    })
}

fn parse_adjustment(raw: &str) -> std::result::Result<(CategoryId, f64), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got `{raw}`"))?;
    let id = id
        .trim()
        .parse::<CategoryId>()
        .map_err(|e| format!("invalid category id `{id}`: {e}"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight `{value}`: {e}"))?;
    if !value.is_finite() {
        return Err(format!("weight must be finite, got `{value}`"));
    }
    Ok((id, value))
}

/// Category names are only needed for table labels.
async fn category_labels(source: &dyn ScoreSource, format: OutputFormat) -> Vec<Category> {
    if !matches!(format, OutputFormat::Table) {
        return Vec::new();
    }
    match source.categories().await {
        Ok(categories) => categories,
        Err(err) => {
            warn!("could not load category names: {err:#}");
            Vec::new()
        }
    }
}

fn print_ranking(report: &RankingReport, top: Option<usize>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_ranking_table(report, top)),
        OutputFormat::Json => {
            let mut trimmed = report.clone();
            if let Some(top) = top {
                trimmed.provinces.truncate(top);
            }
            println!("{}", render_json(&trimmed)?)
        }
        OutputFormat::Csv => println!("{}", ranking_to_csv(report, top)?),
    }
    Ok(())
}

fn print_province(
    score: &ProvinceAggregateScore,
    categories: &[Category],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_province_table(score, categories)),
        OutputFormat::Json => println!("{}", render_json(score)?),
        OutputFormat::Csv => println!("{}", province_to_csv(score)?),
    }
    Ok(())
}

fn print_comparison(comparison: &ProvinceComparison, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_comparison_table(comparison)),
        OutputFormat::Json => println!("{}", render_json(comparison)?),
        OutputFormat::Csv => println!("{}", comparison_to_csv(comparison)?),
    }
    Ok(())
}

fn print_provinces(provinces: &[Province], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_provinces_table(provinces)),
        OutputFormat::Json => println!("{}", render_json(provinces)?),
        OutputFormat::Csv => println!("{}", provinces_to_csv(provinces)?),
    }
    Ok(())
}

fn print_history(
    history: &ProvinceHistory,
    categories: &[Category],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_history_table(history, categories)),
        OutputFormat::Json => println!("{}", render_json(history)?),
        OutputFormat::Csv => println!("{}", history_to_csv(history)?),
    }
    Ok(())
}

fn print_weights(summary: &WeightSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_weights_table(summary, &[])),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => println!("{}", weights_to_csv(summary)?),
    }
    Ok(())
}
