//! File-based pipeline tests: parsers feeding analysis feeding report writers

mod pipelines;
mod reports;
