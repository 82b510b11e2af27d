//! Commit sampling
//!
//! Two independent, deterministic samplers:
//! - bootstrap sampling thins a full commit history down to the subset a
//!   historical scan will actually audit (interval or tag based);
//! - trend sampling picks a bounded, chronologically-ordered subset of
//!   already-stored audits over a date window for presentation.
//!
//! Both are pure functions over their input slices, so tests only need
//! fabricated dates, no clock mocking.

mod bootstrap;
mod trend;

pub use bootstrap::{sample_bootstrap, SamplingStrategy};
pub use trend::{select_sample, PointLabel, TrendPoint};
