use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Mcp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        Self::parse(
            env::var("SUMMARIZER_OUTPUT_FORMAT").ok().as_deref(),
            env::var("SUMMARIZER_OUTPUT_PRETTY").ok().as_deref(),
        )
    }

    fn parse(format: Option<&str>, pretty: Option<&str>) -> Self {
        let format = match format {
            Some("json") => OutputFormat::Json,
            Some("mcp") => OutputFormat::Mcp,
            _ => OutputFormat::Text,
        };
        let pretty = match pretty {
            Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
            _ => false,
        };
        OutputConfig { format, pretty }
    }

    /// `--json` upgrades text output to JSON; an explicit `mcp` format is kept.
    pub fn with_json_flag(mut self, json: bool) -> Self {
        if json && self.format == OutputFormat::Text {
            self.format = OutputFormat::Json;
        }
        self
    }
}
