//! Time-series aggregation and chart rendering.
//!
//! `aggregate` turns a `SampleTable` into a backend-agnostic `ChartSpec`;
//! `render` encodes one as either a PNG or an embeddable SVG.

pub mod aggregate;
pub mod render;
