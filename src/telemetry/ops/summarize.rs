use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Summarize;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Validate, Crawl, Summarize, Aggregate }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Validate => "validate",
        Phase::Crawl => "crawl",
        Phase::Summarize => "summarize",
        Phase::Aggregate => "aggregate",
    }}
    fn span(&self) -> Span { match self {
        Phase::Validate => info_span!("validate"),
        Phase::Crawl => info_span!("crawl"),
        Phase::Summarize => info_span!("summarize"),
        Phase::Aggregate => info_span!("aggregate"),
    }}
}

impl OpMarker for Summarize {
    const NAME: &'static str = "summarize";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("summarize") }
}
