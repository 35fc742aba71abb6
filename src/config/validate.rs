// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{GraphConfig, RawGraphConfig};
use crate::errors::{Result, TaskgraphError};

impl TryFrom<RawGraphConfig> for GraphConfig {
    type Error = crate::errors::TaskgraphError;

    fn try_from(raw: RawGraphConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(GraphConfig::new_unchecked(raw.taskgraph, raw.templates, raw.kind))
    }
}

fn validate_raw_config(cfg: &RawGraphConfig) -> Result<()> {
    ensure_has_kinds(cfg)?;
    validate_taskgraph_section(cfg)?;
    validate_kind_dependencies(cfg)?;
    validate_kind_dag(cfg)?;
    Ok(())
}

fn ensure_has_kinds(cfg: &RawGraphConfig) -> Result<()> {
    if cfg.kind.is_empty() {
        return Err(TaskgraphError::ConfigError(
            "config must contain at least one [kind.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_taskgraph_section(cfg: &RawGraphConfig) -> Result<()> {
    let section = &cfg.taskgraph;

    if section.trust_domain.trim().is_empty() {
        return Err(TaskgraphError::ConfigError(
            "[taskgraph].trust-domain must not be empty".to_string(),
        ));
    }

    if section.max_routes == 0 {
        return Err(TaskgraphError::ConfigError(
            "[taskgraph].max-routes must be >= 1 (got 0)".to_string(),
        ));
    }

    if section.concurrency == 0 {
        return Err(TaskgraphError::ConfigError(
            "[taskgraph].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_kind_dependencies(cfg: &RawGraphConfig) -> Result<()> {
    for (name, kind) in cfg.kind.iter() {
        for dep in kind.kind_dependencies.iter() {
            if !cfg.kind.contains_key(dep) {
                return Err(TaskgraphError::ConfigError(format!(
                    "kind '{}' has unknown dependency '{}' in `kind-dependencies`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(TaskgraphError::ConfigError(format!(
                    "kind '{}' cannot depend on itself in `kind-dependencies`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_kind_dag(cfg: &RawGraphConfig) -> Result<()> {
    // Edge direction: dependency kind -> dependent kind.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.kind.keys() {
        graph.add_node(name.as_str());
    }

    for (name, kind) in cfg.kind.iter() {
        for dep in kind.kind_dependencies.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskgraphError::KindCycle(format!(
            "cycle detected in kind dependencies involving kind '{}'",
            cycle.node_id()
        ))),
    }
}
