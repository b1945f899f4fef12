//! CLI runner - executes commands

use crate::batch::ProgressTracker;
use crate::cli::commands::{Cli, Commands};
use crate::config::HarvestConfig;
use crate::engine::{HarvestOutcome, Harvester};
use crate::error::{Error, Result};
use crate::schema::FieldKind;
use crate::source::HttpSource;
use crate::sources::{list_builtin, load_source};
use crate::template::TemplateContext;
use crate::types::QueryDescriptor;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Log level selected by `--verbose` / `--quiet`
    pub fn log_level(&self) -> Level {
        if self.cli.verbose {
            Level::DEBUG
        } else if self.cli.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch {
                queries,
                filter,
                select,
                sort,
                facets,
                metric,
                params,
                limit,
                max_parallel,
            } => {
                let mut template = QueryDescriptor::default();
                template.filter = filter.clone();
                template.select = select.clone();
                template.sort = sort.clone();
                template.ceiling = *limit;
                for facet in facets {
                    template = template.with_reference(FieldKind::Facet, facet);
                }
                if let Some(metric) = metric {
                    template = template.with_reference(FieldKind::Metric, metric);
                }
                for param in params {
                    let (key, value) = parse_param(param)?;
                    template = template.with_param(key, value);
                }
                self.fetch(template, queries, *max_parallel).await
            }
            Commands::Validate {
                select,
                facets,
                filter_fields,
                metric,
            } => {
                let mut descriptor = QueryDescriptor::default();
                descriptor.select = select.clone();
                for facet in facets {
                    descriptor = descriptor.with_reference(FieldKind::Facet, facet);
                }
                for field in filter_fields {
                    descriptor = descriptor.with_reference(FieldKind::Filter, field);
                }
                if let Some(metric) = metric {
                    descriptor = descriptor.with_reference(FieldKind::Metric, metric);
                }
                self.validate(descriptor).await
            }
            Commands::Describe => self.describe().await,
            Commands::Sources => self.list_sources(),
        }
    }

    /// Harvest settings: file, then command-line overrides
    fn harvest_config(&self) -> Result<HarvestConfig> {
        let mut config = match &self.cli.config {
            Some(path) => HarvestConfig::from_file(path)?,
            None => HarvestConfig::default(),
        };
        if let Some(dir) = &self.cli.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(format) = self.cli.format {
            config.format = format;
        }
        if let Some(rps) = self.cli.rps {
            config.requests_per_second = rps;
        }
        config.validate()?;
        Ok(config)
    }

    /// Harvester with the selected source registered
    async fn harvester(&self, config: HarvestConfig) -> Result<(Harvester, String)> {
        let source_config = load_source(&self.cli.source)?;
        let source = HttpSource::with_client_config(
            source_config,
            config.http_client_config(),
            &TemplateContext::from_env(),
        )?;
        let name = source.name().to_string();

        let mut harvester = Harvester::new(config);
        harvester.add_http_source(source).await;
        Ok((harvester, name))
    }

    /// Retrieve and persist one result set per query
    async fn fetch(
        &self,
        template: QueryDescriptor,
        queries: &[String],
        max_parallel: Option<usize>,
    ) -> Result<()> {
        let mut config = self.harvest_config()?;
        if let Some(workers) = max_parallel {
            config.max_parallel = workers.max(1);
        }
        let (harvester, source) = self.harvester(config).await?;

        let descriptor_for = |query: Option<&String>| {
            let mut descriptor = template.clone();
            descriptor.source.clone_from(&source);
            match query {
                Some(query) => descriptor.with_query(query),
                None => descriptor,
            }
        };

        if queries.len() <= 1 {
            let outcome = harvester.harvest(&descriptor_for(queries.first())).await?;
            self.output_message(&outcome_message(&outcome));
            return Ok(());
        }

        let descriptors: Vec<_> = queries.iter().map(|q| descriptor_for(Some(q))).collect();
        let tracker = Arc::new(ProgressTracker::new("Harvest", descriptors.len()));
        let results = harvester.harvest_many(descriptors, Arc::clone(&tracker)).await;

        for outcome in results.iter().flatten() {
            self.output_message(&outcome_message(outcome));
        }
        eprintln!("{}", tracker.summary());

        let failed = tracker.failed_count();
        if failed > 0 {
            return Err(Error::Other(format!(
                "{failed} of {} harvests failed",
                results.len()
            )));
        }
        Ok(())
    }

    /// Validate field references without fetching records
    async fn validate(&self, mut descriptor: QueryDescriptor) -> Result<()> {
        let (harvester, source) = self.harvester(self.harvest_config()?).await?;
        descriptor.source.clone_from(&source);

        harvester.validate_descriptor(&descriptor).await?;

        let schema = harvester.context().registry.describe(&source).await;
        self.output_message(&json!({
            "type": "VALID",
            "source": source,
            "checked": descriptor.references.len() + usize::from(descriptor.select.is_some()),
            "permissive": schema.is_permissive(),
        }));
        Ok(())
    }

    /// Print the discovered schema
    async fn describe(&self) -> Result<()> {
        let (harvester, source) = self.harvester(self.harvest_config()?).await?;
        let schema = harvester.context().registry.describe(&source).await;

        let counts: Value = [
            FieldKind::Facet,
            FieldKind::Filter,
            FieldKind::Select,
            FieldKind::Metric,
        ]
        .into_iter()
        .map(|kind| (kind.plural().to_string(), json!(schema.count(kind))))
        .collect::<serde_json::Map<_, _>>()
        .into();

        self.output_message(&json!({
            "type": "SCHEMA",
            "source": source,
            "counts": counts,
            "schema": &*schema,
        }));
        Ok(())
    }

    /// List built-in sources
    fn list_sources(&self) -> Result<()> {
        let sources = list_builtin()
            .into_iter()
            .map(|name| -> Result<Value> {
                let config = load_source(name)?;
                Ok(json!({
                    "name": config.name,
                    "description": config.description,
                    "base_url": config.base_url,
                    "pagination": config.pagination_mode().name(),
                    "discovery": config.discovery.is_some(),
                }))
            })
            .collect::<Result<Vec<Value>>>()?;

        self.output_message(&json!({
            "type": "SOURCES",
            "sources": sources
        }));
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        if self.cli.pretty {
            println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
        } else {
            println!("{}", serde_json::to_string(msg).unwrap_or_default());
        }
    }
}

/// Split a `key=value` argument
fn parse_param(param: &str) -> Result<(&str, &str)> {
    param
        .split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim(), value))
        .ok_or_else(|| Error::config(format!("expected key=value, got '{param}'")))
}

fn outcome_message(outcome: &HarvestOutcome) -> Value {
    json!({
        "type": "RESULT",
        "outcome": outcome,
    })
}
