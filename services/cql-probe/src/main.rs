mod config;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use rxkit::database::ScyllaConnection;
use rxkit::shape::{DaoMethod, DaoResult};
use rxkit::{EntityMapper, ReactiveError, ReactiveSession, Row, RowFacade, Statement};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cql-probe")]
#[command(about = "Runs CQL statements through the reactive result layer")]
struct Args {
    #[arg(short, long, default_value = "config/cql-probe.yaml")]
    config: String,

    /// Ad-hoc statement; the configured DAO methods run when omitted
    #[arg(short, long)]
    query: Option<String>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long)]
    tracing: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(&args.config)?;

    let level = &config.observability.log_level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cql_probe={0},rxkit={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cql-probe against {:?}", config.database.hosts);

    let connection = ScyllaConnection::new(&config.database)
        .await
        .context("connecting to cluster")?;
    let session = ReactiveSession::from_config(Arc::new(connection), config.reactive.clone());

    session.health_check().await.context("health check")?;
    info!("Health check passed");

    match &args.query {
        Some(query) => {
            let mut statement = Statement::new(query.clone()).with_tracing(args.tracing);
            if let Some(page_size) = args.page_size {
                statement = statement.with_page_size(page_size);
            }
            print_result(session.execute(&statement)).await?;
        }
        None if config.dao.is_empty() => warn!("No query given and no DAO methods configured"),
        None => {
            for method in &config.dao {
                run_method(&session, method).await?;
            }
        }
    }

    if args.metrics {
        println!("{}", rxkit::metrics::gather_text());
    }

    Ok(())
}

async fn print_result(facade: RowFacade) -> Result<()> {
    let mut rows = facade.subscribe();
    let mut count = 0usize;
    while let Some(row) = rows.next().await {
        let row = row?;
        info!("{}", row.to_json());
        count += 1;
    }

    if let Some(columns) = facade.column_definitions().to_single_value().await? {
        let names: Vec<&str> = columns.columns.iter().map(|c| c.name.as_str()).collect();
        info!("Columns: {}", names.join(", "));
    }
    let applied = facade.was_applied().to_single_value().await?;
    let infos = facade.execution_infos().collect().await?;
    info!(
        "{} rows in {} pages (applied: {:?})",
        count,
        infos.len(),
        applied
    );
    for page in infos.iter().filter(|i| !i.warnings.is_empty()) {
        warn!("Page {} warnings: {:?}", page.page, page.warnings);
    }
    Ok(())
}

async fn run_method(session: &ReactiveSession, method: &DaoMethod) -> Result<()> {
    let mapper: Arc<dyn EntityMapper<serde_json::Value>> =
        Arc::new(|row: &Row| Ok::<_, ReactiveError>(row.to_json()));
    let result = session
        .run_dao(method, Vec::new(), mapper)
        .await
        .with_context(|| format!("running {}", method.name))?;

    match result {
        DaoResult::Rows(facade) => print_result(facade).await?,
        DaoResult::Entities(facade) => {
            let entities = facade.items().collect().await?;
            info!("{}: {} entities", method.name, entities.len());
        }
        DaoResult::Entity(entity) => info!("{}: {}", method.name, entity),
        DaoResult::OptionalEntity(entity) => info!("{}: {:?}", method.name, entity),
        DaoResult::Boolean(applied) => info!("{}: applied={}", method.name, applied),
        DaoResult::Count(count) => info!("{}: count={}", method.name, count),
        DaoResult::Void => info!("{}: done", method.name),
    }
    Ok(())
}
