use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use extraction_eval::model::EvaluationMethod;

#[derive(Parser, Debug)]
#[command(
    name = "extraction-eval",
    version,
    about = "Evaluate extracted document data against ground truth"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    DocSplit(DocSplitArgs),
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub config: PathBuf,

    #[arg(long)]
    pub document: PathBuf,

    /// Writes the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub max_concurrency: Option<usize>,

    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub discovery_method: Option<LeafMethod>,

    #[arg(long)]
    pub llm_endpoint: Option<String>,

    #[arg(long)]
    pub llm_model: Option<String>,

    #[arg(long)]
    pub embedding_endpoint: Option<String>,

    #[arg(long, default_value_t = false)]
    pub count_both_absent_as_true_negative: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DocSplitArgs {
    #[arg(long)]
    pub ground_truth: PathBuf,

    #[arg(long)]
    pub predicted: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    #[arg(long)]
    pub config: PathBuf,
}

/// Methods that can score a single leaf.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LeafMethod {
    Exact,
    NumericExact,
    Fuzzy,
    Semantic,
    Llm,
}

impl LeafMethod {
    pub fn as_method(self) -> EvaluationMethod {
        match self {
            Self::Exact => EvaluationMethod::Exact,
            Self::NumericExact => EvaluationMethod::NumericExact,
            Self::Fuzzy => EvaluationMethod::Fuzzy,
            Self::Semantic => EvaluationMethod::Semantic,
            Self::Llm => EvaluationMethod::Llm,
        }
    }
}
