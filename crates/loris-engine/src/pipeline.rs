//! The end-to-end analysis pipeline.
//!
//! `analyze` normalizes the tree, computes symmetries and the
//! relevant-events set, generates the chain, and evaluates each property
//! through the numeric checker, returning one value per property.

use thiserror::Error;
use tracing::info;

use loris_dft::model::Dft;
use loris_dft::properties::Property;
use loris_dft::relevance::{compute_relevant_events, RelevanceError, RelevantEvents};
use loris_dft::state::DependencyOrder;
use loris_dft::symmetry::{compute_symmetries, SymmetryGroup};
use loris_dft::transform::{transform, TransformError, TransformOptions};
use loris_dft::wellformed::is_well_formed;
use loris_prob::{expected_hitting_time, reachability_probability, NumericsError};

use crate::builder::{BuilderOptions, ExplicitBuilder, ModelBuildError};
use crate::conflicts::{compute_dependency_conflicts, ConflictOptions, ConflictVerdict};
use crate::ctmc::Ctmc;
use crate::result::BuildStatistics;

/// Options for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Collapse symmetric states.
    pub symmetry_reduction: bool,
    /// Hitting-mass bound for the partial models; 0 is exact.
    pub approximation_bound: f64,
    /// Resolution policy for simultaneously triggered dependencies.
    pub dependency_order: DependencyOrder,
    /// Normalizations applied before any analysis.
    pub transform: TransformOptions,
    /// Certify the dependency-resolution policy before building and
    /// refuse order-dependent trees.
    pub check_conflicts: bool,
    /// Use the SMT strategy for that certification.
    pub use_smt_conflicts: bool,
    /// Solver budget per conflict query in seconds; 0 is unbounded.
    pub solver_timeout_secs: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            symmetry_reduction: true,
            approximation_bound: 0.0,
            dependency_order: DependencyOrder::default(),
            transform: TransformOptions::default(),
            check_conflicts: false,
            use_smt_conflicts: false,
            solver_timeout_secs: 0,
        }
    }
}

/// Failure of an analysis run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("ill-formed tree: {0}")]
    IllFormed(String),
    #[error("dependency conflict: {0}")]
    Conflict(String),
    #[error("relevance error: {0}")]
    Relevance(#[from] RelevanceError),
    #[error("model build error: {0}")]
    Build(#[from] ModelBuildError),
    #[error("numerics error: {0}")]
    Numerics(#[from] NumericsError),
    #[error("property error: {0}")]
    Property(String),
}

/// Compute one numeric result per property.
///
/// `relevant_events = None` tracks every event; a supplied set is
/// re-resolved by name against the normalized tree. Every label a
/// property references must be inside the tracked set.
pub fn analyze(
    dft: &Dft,
    properties: &[Property],
    relevant_events: Option<RelevantEvents>,
    options: &AnalysisOptions,
) -> Result<Vec<f64>, PipelineError> {
    let prepared = prepare(dft, properties, relevant_events, options)?;
    let mut builder = ExplicitBuilder::new(&prepared.dft, prepared.builder_options.clone());
    let ctmc = builder.build()?;
    info!(stats = %builder.statistics(), "analysis model built");

    properties
        .iter()
        .map(|p| check_property(&ctmc, p))
        .collect()
}

/// Compute a bracketing interval per property from the approximation's
/// lower- and upper-bound partial models.
///
/// Intervals are returned `(min, max)`: the two bound models over- and
/// under-shoot in measure-dependent directions, and ordering the pair
/// gives a guaranteed enclosure of the exact value.
pub fn analyze_bounds(
    dft: &Dft,
    properties: &[Property],
    relevant_events: Option<RelevantEvents>,
    options: &AnalysisOptions,
) -> Result<Vec<(f64, f64)>, PipelineError> {
    let prepared = prepare(dft, properties, relevant_events, options)?;
    let mut builder = ExplicitBuilder::new(&prepared.dft, prepared.builder_options.clone());
    let (lower, upper) = builder.partial_models()?;

    properties
        .iter()
        .map(|p| -> Result<(f64, f64), PipelineError> {
            let a = check_property(&lower, p)?;
            let b = check_property(&upper, p)?;
            Ok((a.min(b), a.max(b)))
        })
        .collect()
}

/// Build and hand out the exact chain for an external checker.
pub fn build_model(
    dft: &Dft,
    relevant_events: Option<RelevantEvents>,
    options: &AnalysisOptions,
) -> Result<(Ctmc, BuildStatistics), PipelineError> {
    let prepared = prepare(dft, &[], relevant_events, options)?;
    let mut builder = ExplicitBuilder::new(&prepared.dft, prepared.builder_options.clone());
    let ctmc = builder.build()?;
    Ok((ctmc, builder.statistics().clone()))
}

/// Build the lower- and upper-bound partial chains for an external
/// checker.
pub fn build_partial_models(
    dft: &Dft,
    relevant_events: Option<RelevantEvents>,
    options: &AnalysisOptions,
) -> Result<(Ctmc, Ctmc, BuildStatistics), PipelineError> {
    let prepared = prepare(dft, &[], relevant_events, options)?;
    let mut builder = ExplicitBuilder::new(&prepared.dft, prepared.builder_options.clone());
    let (lower, upper) = builder.partial_models()?;
    Ok((lower, upper, builder.statistics().clone()))
}

struct Prepared {
    dft: Dft,
    builder_options: BuilderOptions,
}

fn prepare(
    dft: &Dft,
    properties: &[Property],
    relevant_events: Option<RelevantEvents>,
    options: &AnalysisOptions,
) -> Result<Prepared, PipelineError> {
    let normalized = transform(dft, &options.transform)?;

    let check = is_well_formed(&normalized);
    if !check.ok {
        return Err(PipelineError::IllFormed(check.diagnostic));
    }

    if options.check_conflicts {
        let conflict_options = ConflictOptions {
            use_smt: options.use_smt_conflicts,
            solver_timeout_secs: options.solver_timeout_secs,
            dependency_order: options.dependency_order,
        };
        match compute_dependency_conflicts(&normalized, &conflict_options) {
            ConflictVerdict::ConflictFree => {}
            ConflictVerdict::Conflicting => {
                return Err(PipelineError::Conflict(
                    "dependency firing order can change outcomes; \
                     the configured resolution policy is not safe for this tree"
                        .to_string(),
                ))
            }
            ConflictVerdict::Unknown { reason } => {
                return Err(PipelineError::Conflict(format!(
                    "conflict status unknown: {reason}"
                )))
            }
        }
    }

    // Re-resolve a supplied relevant set by name: normalization may have
    // renumbered elements.
    let relevant = match relevant_events {
        None => RelevantEvents::all(&normalized),
        Some(r) if r.is_all() => RelevantEvents::all(&normalized),
        Some(r) => {
            let names: Vec<String> = r.names().map(str::to_string).collect();
            compute_relevant_events(&normalized, &[], &names)?
        }
    };

    // Every queried label must be tracked, or its per-state labels would
    // silently be missing.
    let queried = compute_relevant_events(&normalized, properties, &[])?;
    for id in queried.ids() {
        if !relevant.is_relevant_id(id) {
            return Err(PipelineError::Property(format!(
                "property references '{}', which is outside the relevant-events set",
                normalized.name(id)
            )));
        }
    }

    let symmetries = if options.symmetry_reduction {
        compute_symmetries(&normalized)
    } else {
        SymmetryGroup::identity()
    };

    let builder_options = BuilderOptions {
        symmetries,
        relevant,
        dependency_order: options.dependency_order,
        approximation_bound: options.approximation_bound,
    };

    Ok(Prepared {
        dft: normalized,
        builder_options,
    })
}

fn check_property(ctmc: &Ctmc, property: &Property) -> Result<f64, PipelineError> {
    let value = match property {
        Property::EventuallyFailed { label } => reachability_probability(
            ctmc.rows(),
            ctmc.initial(),
            &ctmc.states_with_label(label),
        )?,
        Property::NeverFails { label } => {
            1.0 - reachability_probability(
                ctmc.rows(),
                ctmc.initial(),
                &ctmc.states_with_label(label),
            )?
        }
        Property::ExpectedTimeToFailure { label } => expected_hitting_time(
            ctmc.rows(),
            ctmc.initial(),
            &ctmc.states_with_label(label),
        )?,
    };
    Ok(value)
}
