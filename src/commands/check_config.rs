use anyhow::{Context, Result};
use tracing::info;

use extraction_eval::load_config;
use extraction_eval::model::{AttributeSpec, AttributeType};

use crate::cli::CheckConfigArgs;

pub fn run(args: CheckConfigArgs) -> Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;

    let settings = &config.evaluation;
    info!(
        path = %args.config.display(),
        classes = config.classes.len(),
        default_method = %settings.default_method,
        discovery_method = %settings.discovery_method,
        max_concurrency = settings.max_concurrency,
        timeout_ms = settings.timeout_ms,
        llm_configured = settings.llm.endpoint.is_some(),
        embedding_configured = settings.embedding.endpoint.is_some(),
        "configuration is valid"
    );

    for class in &config.classes {
        let counts = LeafCounts::of(&class.attributes);
        info!(
            class = %class.name,
            top_level = class.attributes.len(),
            leaves = counts.leaves,
            groups = counts.groups,
            lists = counts.lists,
            "document class"
        );
    }

    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct LeafCounts {
    leaves: usize,
    groups: usize,
    lists: usize,
}

impl LeafCounts {
    fn of(attributes: &[AttributeSpec]) -> Self {
        let mut counts = Self::default();
        counts.add(attributes);
        counts
    }

    fn add(&mut self, attributes: &[AttributeSpec]) {
        for attribute in attributes {
            match attribute.attribute_type {
                AttributeType::Simple => self.leaves += 1,
                AttributeType::Group => {
                    self.groups += 1;
                    self.add(&attribute.group_attributes);
                }
                AttributeType::List => {
                    self.lists += 1;
                    self.add(attribute.item_attributes());
                }
            }
        }
    }
}
