//! CLI commands and argument parsing

use crate::types::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paginated, schema-validated harvests from research data APIs
#[derive(Parser, Debug)]
#[command(name = "harvestkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source: built-in name or YAML definition file
    #[arg(short, long, global = true, default_value = "openalex-works")]
    pub source: String,

    /// Harvest settings file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory result files are written to
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Which files to write
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Requests per second across all sources
    #[arg(long, global = true)]
    pub rps: Option<u32>,

    /// Pretty-print JSON messages
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve a result set and write it to disk
    Fetch {
        /// Free-text query; repeat to run several harvests
        #[arg(long = "query")]
        queries: Vec<String>,

        /// Filter expression in the source's syntax
        #[arg(long)]
        filter: Option<String>,

        /// Comma-separated fields to return
        #[arg(long)]
        select: Option<String>,

        /// Sort expression
        #[arg(long)]
        sort: Option<String>,

        /// Facet (group-by) field; repeatable
        #[arg(long = "facet")]
        facets: Vec<String>,

        /// Aggregation expression, e.g. `count, sum(funding)`
        #[arg(long)]
        metric: Option<String>,

        /// Extra request parameter as key=value; repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        /// Maximum records to retrieve
        #[arg(short, long)]
        limit: Option<u64>,

        /// Harvests run at once when several queries are given
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Check field names against the source schema without fetching
    Validate {
        /// Comma-separated select fields
        #[arg(long)]
        select: Option<String>,

        /// Facet field; repeatable
        #[arg(long = "facet")]
        facets: Vec<String>,

        /// Filterable field; repeatable
        #[arg(long = "filter-field")]
        filter_fields: Vec<String>,

        /// Aggregation expression
        #[arg(long)]
        metric: Option<String>,
    },

    /// Show the fields the source accepts
    Describe,

    /// List built-in sources
    Sources,
}
