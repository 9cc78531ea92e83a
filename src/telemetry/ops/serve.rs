use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Serve;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Start, Call }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Start => "start",
        Phase::Call => "call",
    }}
    fn span(&self) -> Span { match self {
        Phase::Start => info_span!("start"),
        Phase::Call => info_span!("call"),
    }}
}

impl OpMarker for Serve {
    const NAME: &'static str = "serve";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("serve") }
}
