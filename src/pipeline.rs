//! Batch reweighting with checkpoint/resume.
//!
//! `run` scores every edge of a graph in input order. Each computed edge is appended to
//! `<output>.cache` and flushed immediately; a later run with `resume` reads that cache,
//! skips the prefix it covers, and only scores the remaining edges. Cached weights are
//! carried into the output as written, so an interrupted-then-resumed run produces the same
//! bytes as an uninterrupted one.
//!
//! Invariants:
//! - output has one line per input edge, in input order
//! - a cache that does not match a prefix of the edge list is rejected, never realigned
//! - one run per output path at a time (`<output>.lock`)

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, trace, Span};

use crate::config::{output_path_for_depth, ReweightConfig};
use crate::database::InteractionDatabase;
use crate::graph::Ppin;
use crate::scoring::ScoringEngine;
use crate::{Error, Result};

/// A per-edge scoring function.
pub trait EdgeScorer {
    fn score(&mut self, source: &str, target: &str) -> Result<f64>;

    /// Called once at the end of every pipeline run.
    fn clear_memo(&mut self) {}

    fn label(&self) -> String {
        "custom".to_string()
    }
}

/// Wraps a closure as an [`EdgeScorer`].
pub struct FnScorer<F>(pub F);

impl<F> EdgeScorer for FnScorer<F>
where
    F: FnMut(&str, &str) -> Result<f64>,
{
    fn score(&mut self, source: &str, target: &str) -> Result<f64> {
        (self.0)(source, target)
    }
}

/// Logging context handed to the pipeline. Everything a run logs is emitted inside `span`.
#[derive(Debug, Clone)]
pub struct RunContext {
    span: Span,
    verbose: bool,
}

impl RunContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            span: info_span!("reweight"),
            verbose,
        }
    }

    pub fn with_span(span: Span, verbose: bool) -> Self {
        Self { span, verbose }
    }

    /// No span, no per-edge progress.
    pub fn quiet() -> Self {
        Self {
            span: Span::none(),
            verbose: false,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::quiet()
    }
}

/// One output line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    /// Rendered weight. Fresh scores use 16 decimals; cached ones keep their original text.
    text: String,
}

impl ScoredEdge {
    pub fn new(source: &str, target: &str, weight: f64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            text: format!("{weight:.16}"),
        }
    }

    /// `source\ttarget\tweight`, without a newline.
    pub fn line(&self) -> String {
        format!("{}\t{}\t{}", self.source, self.target, self.text)
    }

    fn parse(line: &str, path: &Path, lineno: usize) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedCache {
            path: path.to_path_buf(),
            line: lineno,
            reason,
        };
        let fields: Vec<&str> = line.split('\t').collect();
        let [source, target, text] = fields[..] else {
            return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
        };
        let weight: f64 = text
            .parse()
            .map_err(|_| malformed(format!("weight `{text}` is not a number")))?;
        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            text: text.to_string(),
        })
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineReport {
    pub total: usize,
    /// Edges taken from the cache.
    pub resumed: usize,
    /// Edges scored in this run.
    pub computed: usize,
    pub output: PathBuf,
}

/// `<output>.cache`
pub fn cache_path(output: &Path) -> PathBuf {
    with_suffix(output, ".cache")
}

fn lock_path(output: &Path) -> PathBuf {
    with_suffix(output, ".lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Read a cache file. Every line must be a complete `u\tv\tweight` triple; a final line
/// without its newline is a torn write and is rejected.
pub fn read_cache(path: &Path) -> Result<Vec<ScoredEdge>> {
    let raw = fs::read_to_string(path)?;
    if !raw.is_empty() && !raw.ends_with('\n') {
        let line = raw.lines().count();
        return Err(Error::MalformedCache {
            path: path.to_path_buf(),
            line,
            reason: "truncated line (no trailing newline)".to_string(),
        });
    }
    let mut out = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        out.push(ScoredEdge::parse(line, path, i + 1)?);
    }
    Ok(out)
}

/// Exclusive advisory lock on `<output>.lock`.
///
/// The lock lives on the open handle, so the OS releases it when the holder exits, however
/// it exits. The file itself is left in place; its presence means nothing.
struct OutputLock {
    _file: File,
}

impl OutputLock {
    fn acquire(output: &Path) -> Result<Self> {
        let path = lock_path(output);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock() {
            Ok(()) => Ok(Self { _file: file }),
            Err(TryLockError::WouldBlock) => Err(Error::OutputLocked(output.to_path_buf())),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReweightPipeline {
    cache: bool,
    ctx: RunContext,
}

impl ReweightPipeline {
    /// `cache` enables appending each computed edge to `<output>.cache`.
    pub fn new(cache: bool, ctx: RunContext) -> Self {
        Self { cache, ctx }
    }

    /// Score every edge of `graph` and write the reweighted edge list to `output`.
    ///
    /// With `resume`, an existing cache supplies the leading edges. Scorer memo tables are
    /// cleared once scoring stops, whether or not it succeeded.
    pub fn run<S: EdgeScorer + ?Sized>(
        &self,
        graph: &Ppin,
        scorer: &mut S,
        output: &Path,
        resume: bool,
    ) -> Result<PipelineReport> {
        let _entered = self.ctx.span().enter();
        if let Some(dir) = output.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let _lock = OutputLock::acquire(output)?;

        let edges = graph.edges();
        let total = edges.len();
        let cache_file = cache_path(output);

        let mut results = if resume && cache_file.exists() {
            read_cache(&cache_file)?
        } else {
            Vec::new()
        };
        if results.len() > total {
            return Err(Error::MalformedCache {
                path: cache_file,
                line: total + 1,
                reason: format!("cache has {} lines but the graph has {total} edges", results.len()),
            });
        }
        for (i, (cached, edge)) in results.iter().zip(edges).enumerate() {
            let (u, v) = (graph.name(edge.source), graph.name(edge.target));
            if cached.source != u || cached.target != v {
                return Err(Error::MalformedCache {
                    path: cache_file,
                    line: i + 1,
                    reason: format!(
                        "cached edge {}-{} does not match input edge {u}-{v}",
                        cached.source, cached.target
                    ),
                });
            }
        }
        let resumed = results.len();
        if resumed > 0 {
            info!(resumed, total, cache = %cache_file.display(), "resuming from cache");
        }

        let cache = if self.cache {
            let file = if resumed > 0 {
                OpenOptions::new().append(true).open(&cache_file)?
            } else {
                debug!(cache = %cache_file.display(), "starting fresh cache");
                File::create(&cache_file)?
            };
            Some(LineWriter::new(file))
        } else {
            None
        };

        info!(scorer = %scorer.label(), total, output = %output.display(), "reweighting");
        let scored = self.score_pending(graph, scorer, &mut results, cache);
        scorer.clear_memo();
        scored?;

        let body = results
            .iter()
            .map(ScoredEdge::line)
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(output, body)?;

        let report = PipelineReport {
            total,
            resumed,
            computed: total - resumed,
            output: output.to_path_buf(),
        };
        info!(computed = report.computed, resumed, output = %output.display(), "done");
        Ok(report)
    }

    /// Score the edges after the resumed prefix, appending each to `results` (and the cache).
    fn score_pending<S: EdgeScorer + ?Sized>(
        &self,
        graph: &Ppin,
        scorer: &mut S,
        results: &mut Vec<ScoredEdge>,
        mut cache: Option<LineWriter<File>>,
    ) -> Result<()> {
        let edges = graph.edges();
        let total = edges.len();
        for (i, edge) in edges.iter().enumerate().skip(results.len()) {
            let (u, v) = (graph.name(edge.source), graph.name(edge.target));
            if self.ctx.verbose() {
                info!(edge = i + 1, total, "computing weight");
            } else {
                trace!(edge = i + 1, total, "computing weight");
            }
            let scored = ScoredEdge::new(u, v, scorer.score(u, v)?);
            if let Some(w) = cache.as_mut() {
                writeln!(w, "{}", scored.line())?;
            }
            results.push(scored);
        }
        if let Some(mut w) = cache {
            w.flush()?;
        }
        Ok(())
    }
}

/// Run the pipeline once per depth in the configured range, writing each pass to its
/// versioned output path (`<name>v<depth>.<ext>`).
pub fn run_depths<D: InteractionDatabase>(
    engine: &mut ScoringEngine<D>,
    config: &ReweightConfig,
    input: &Path,
    output_template: &Path,
    ctx: &RunContext,
) -> Result<Vec<PipelineReport>> {
    config.validate()?;
    let pipeline = ReweightPipeline::new(config.cache, ctx.clone());
    let graph = engine.graph().clone();
    let mut reports = Vec::new();
    for depth in config.depths() {
        engine.set_depth_checked(depth)?;
        let output = output_path_for_depth(output_template, input, engine.depth());
        info!(input = %input.display(), depth, "running {}", config.algorithm);
        let mut scorer = engine.scorer(config.algorithm);
        reports.push(pipeline.run(&graph, &mut scorer, &output, config.resume)?);
    }
    Ok(reports)
}
