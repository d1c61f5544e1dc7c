//! Normalization engine: standard records in, graph writes out

mod engine;

pub use engine::{
    NormalizationResult, NormalizationSummary, NormalizeError, Normalizer, RecordFailure,
    RecordGraph,
};
