use anyhow::{Result, anyhow};
use clap::Args;
use tokio::time::Instant;
use tracing::Instrument;

use crate::batch::BatchRequest;
use crate::config::Settings;
use crate::output::Meta;
use crate::telemetry;

#[derive(Args, Debug)]
pub struct SummarizeCmd {
    /// Pages to crawl and summarize
    pub urls: Vec<String>,
    /// Title for the URL at the same position; repeat once per URL
    #[arg(long = "title")]
    pub titles: Vec<String>,
    /// Process at most this many URLs (defaults to MAX_URLS_PER_REQUEST)
    #[arg(long)]
    pub max_urls: Option<usize>,
    /// Per-attempt crawl timeout in seconds (defaults to CRAWL_TIMEOUT_SECONDS)
    #[arg(long)]
    pub timeout_per_url: Option<u64>,
    /// Only validate and show which URLs would be processed
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl SummarizeCmd {
    fn request(self, settings: &Settings) -> BatchRequest {
        BatchRequest {
            urls: self.urls,
            titles: (!self.titles.is_empty()).then_some(self.titles),
            max_urls: self.max_urls.unwrap_or(settings.pipeline.max_urls_per_request),
            timeout_per_url: self.timeout_per_url.unwrap_or(settings.crawl_timeout_secs),
        }
    }
}

pub async fn run(settings: &Settings, args: SummarizeCmd) -> Result<()> {
    let log = telemetry::summarize();
    let span = log.root_span_kv([
        ("urls", args.urls.len().to_string()),
        ("titles", args.titles.len().to_string()),
        ("dry_run", args.dry_run.to_string()),
    ]);
    let dry_run = args.dry_run;
    let req = args.request(settings);
    let pipeline = settings.build_pipeline()?;

    if dry_run {
        return match pipeline.plan(req) {
            Ok(plan) => log.plan(&plan),
            Err(invalid) => {
                log.result(&invalid, None)?;
                Err(anyhow!(invalid))
            }
        };
    }

    let started = Instant::now();
    match pipeline.summarize_batch(req).instrument(span).await {
        Ok(report) => {
            let meta = Meta {
                duration_ms: Some(started.elapsed().as_millis()),
                urls: Some(report.summaries.len()),
            };
            log.result(&report, Some(meta))
        }
        Err(invalid) => {
            log.error(format!("❌ {}", invalid));
            log.result(&invalid, None)?;
            Err(anyhow!(invalid))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        cmd: SummarizeCmd,
    }

    #[test]
    fn titles_pair_with_urls_and_defaults_come_from_settings() {
        let h = Harness::parse_from([
            "summarize",
            "https://a.test/1",
            "https://a.test/2",
            "--title",
            "One",
            "--title",
            "Two",
        ]);
        let settings = Settings::from_env();
        let req = h.cmd.request(&settings);

        assert_eq!(req.urls.len(), 2);
        assert_eq!(req.titles, Some(vec!["One".to_string(), "Two".to_string()]));
        assert_eq!(req.max_urls, settings.pipeline.max_urls_per_request);
        assert_eq!(req.timeout_per_url, settings.crawl_timeout_secs);
    }

    #[test]
    fn flags_override_settings() {
        let h = Harness::parse_from(["summarize", "https://a.test/1", "--max-urls", "1", "--timeout-per-url", "45"]);
        let req = h.cmd.request(&Settings::from_env());

        assert_eq!(req.titles, None);
        assert_eq!(req.max_urls, 1);
        assert_eq!(req.timeout_per_url, 45);
    }
}
