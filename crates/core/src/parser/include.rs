//! `@include` resolution.
//!
//! Directives are replaced depth-first by the parsed content of the target,
//! resolved relative to the directory of the document holding the directive.
//! The chain of documents currently being resolved is threaded through the
//! recursion; reaching a document already on the chain is a cycle error.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;

use sc_protocol::PipelineIssue;
use tracing::{debug, instrument, warn};

use super::error::{IncludeError, ParseResult};
use super::node::{ConfigMap, ConfigNode, SPLICE_KEY};
use super::{parse_text, ParsedDocument};
use crate::cache::{CacheError, SharedCache};

type BoxFuture<'b, T> = Pin<Box<dyn Future<Output = T> + Send + 'b>>;

/// Parses documents through a [`SharedCache`] and expands their includes.
pub struct HybridParser<'a> {
    cache: &'a SharedCache,
}

struct ResolveState {
    document: PathBuf,
    chain: Vec<PathBuf>,
    sources: Vec<(PathBuf, SystemTime)>,
    warnings: Vec<PipelineIssue>,
    errors: Vec<PipelineIssue>,
}

impl ResolveState {
    fn record(&mut self, error: &IncludeError) {
        warn!(document = %self.document.display(), %error, "include failed");
        self.errors.push(error.to_issue(&self.document));
    }
}

impl<'a> HybridParser<'a> {
    pub fn new(cache: &'a SharedCache) -> Self {
        Self { cache }
    }

    /// Reads, parses and include-expands the document at `path`.
    ///
    /// Include failures do not fail the document: the failing directive
    /// removes the feature-level entry that contains it (a depth-two entry,
    /// or a depth-one entry when the directive sits directly under a
    /// top-level key) and the error is recorded in
    /// [`ParsedDocument::errors`].
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the document cannot be read or contains no
    /// YAML in any supported encoding.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn parse_file(&self, path: &Path) -> ParseResult<ParsedDocument> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| CacheError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let raw = self.cache.get_file(&canonical).await?;
        let parsed = parse_text(&raw.text(), path)?;

        let mut state = ResolveState {
            document: path.to_path_buf(),
            chain: vec![canonical.clone()],
            sources: vec![(canonical.clone(), raw.modified)],
            warnings: parsed.warnings,
            errors: parsed.errors,
        };
        let base = parent_dir(&canonical);
        let root = self.resolve_document(parsed.root, &base, &mut state).await;

        Ok(ParsedDocument {
            path: path.to_path_buf(),
            encoding: parsed.encoding,
            root,
            warnings: state.warnings,
            errors: state.errors,
            sources: state.sources,
        })
    }

    async fn resolve_document(
        &self,
        root: ConfigNode,
        base: &Path,
        state: &mut ResolveState,
    ) -> ConfigNode {
        let ConfigNode::Map(map) = root else {
            return match self.resolve_node(root, base, state).await {
                Ok(node) => node,
                Err(error) => {
                    state.record(&error);
                    ConfigNode::Null
                }
            };
        };

        let mut resolved = ConfigMap::new();
        for (key, value) in map {
            match value {
                ConfigNode::Map(children) if key != SPLICE_KEY => {
                    let mut section = ConfigMap::new();
                    for (child_key, child) in children {
                        match self.resolve_entry(&child_key, child, base, state).await {
                            Ok(entries) => entries.into_iter().for_each(|(k, v)| {
                                section.insert(k, v);
                            }),
                            Err(error) => state.record(&error),
                        }
                    }
                    resolved.insert(key, ConfigNode::Map(section));
                }
                value => match self.resolve_entry(&key, value, base, state).await {
                    Ok(entries) => entries.into_iter().for_each(|(k, v)| {
                        resolved.insert(k, v);
                    }),
                    Err(error) => state.record(&error),
                },
            }
        }
        ConfigNode::Map(resolved)
    }

    /// Resolves one map entry; a splice marker expands into several entries.
    async fn resolve_entry(
        &self,
        key: &str,
        value: ConfigNode,
        base: &Path,
        state: &mut ResolveState,
    ) -> Result<Vec<(String, ConfigNode)>, IncludeError> {
        let resolved = self.resolve_node(value, base, state).await?;
        if key != SPLICE_KEY {
            return Ok(vec![(key.to_string(), resolved)]);
        }
        match resolved {
            ConfigNode::Map(map) => Ok(map.into_iter().collect()),
            _ => Err(IncludeError::NotAMap {
                path: state.document.clone(),
            }),
        }
    }

    fn resolve_node<'b>(
        &'b self,
        node: ConfigNode,
        base: &'b Path,
        state: &'b mut ResolveState,
    ) -> BoxFuture<'b, Result<ConfigNode, IncludeError>> {
        Box::pin(async move {
            if let Some(target) = node.include_target().map(str::to_string) {
                return self.resolve_include(target, base, state).await;
            }
            match node {
                ConfigNode::Map(map) => {
                    let mut resolved = ConfigMap::new();
                    for (key, value) in map {
                        for (k, v) in self.resolve_entry(&key, value, base, state).await? {
                            resolved.insert(k, v);
                        }
                    }
                    Ok(ConfigNode::Map(resolved))
                }
                ConfigNode::Sequence(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.resolve_node(item, base, state).await?);
                    }
                    Ok(ConfigNode::Sequence(resolved))
                }
                scalar => Ok(scalar),
            }
        })
    }

    fn resolve_include<'b>(
        &'b self,
        token: String,
        base: &'b Path,
        state: &'b mut ResolveState,
    ) -> BoxFuture<'b, Result<ConfigNode, IncludeError>> {
        Box::pin(async move {
            let (relative, section) = match token.split_once('#') {
                Some((file, section)) => (file, Some(section)),
                None => (token.as_str(), None),
            };
            let target = base.join(relative);
            let canonical = tokio::fs::canonicalize(&target)
                .await
                .map_err(|_| IncludeError::NotFound {
                    path: target.clone(),
                })?;

            if state.chain.contains(&canonical) {
                return Err(IncludeError::Cycle {
                    path: canonical,
                    chain: state.chain.clone(),
                });
            }

            debug!(target = %canonical.display(), "resolving include");
            let raw = self
                .cache
                .get_file(&canonical)
                .await
                .map_err(|source| IncludeError::Unreadable {
                    path: canonical.clone(),
                    source,
                })?;
            state.sources.push((canonical.clone(), raw.modified));

            let parsed = parse_text(&raw.text(), &canonical).map_err(|source| IncludeError::Target {
                path: canonical.clone(),
                source: Box::new(source),
            })?;
            state.warnings.extend(parsed.warnings);
            state.errors.extend(parsed.errors);

            let target_base = parent_dir(&canonical);
            state.chain.push(canonical.clone());
            let resolved = self.resolve_node(parsed.root, &target_base, state).await;
            state.chain.pop();
            let resolved = resolved?;

            match section {
                None => Ok(resolved),
                Some(section) => resolved
                    .find_section(section)
                    .cloned()
                    .ok_or_else(|| IncludeError::MissingSection {
                        path: canonical,
                        section: section.to_string(),
                    }),
            }
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
