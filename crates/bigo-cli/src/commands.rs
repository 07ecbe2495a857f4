//! Subcommand handlers and their terminal output.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bigo_conductor::{Classifier, Conductor, QuotaReport, RunRequest, RunResult};
use bigo_core::{Backend, ClassificationResult, Task, Tier, TierPolicy};
use bigo_ledger::{Ledger, Stats};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{config_path, Config, BIGO_DIR};
use crate::workers::build_workers;

const RULE: &str = "═══════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────";

/// Arguments of `bigo run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub title: String,
    pub description: String,
    pub tier: Option<Tier>,
    pub dry_run: bool,
}

/// Create `.bigo/` with a fresh ledger and the default config.
pub fn init(root: &Path) -> Result<(), Box<dyn Error>> {
    let bigo_dir = root.join(BIGO_DIR);
    if bigo_dir.exists() {
        return Err(format!("BigO already initialized at {}", bigo_dir.display()).into());
    }
    std::fs::create_dir_all(&bigo_dir)?;

    let config = Config::default();
    let ledger_path = config.ledger_path(root);
    Ledger::init(&ledger_path)?;
    Config::write_default(&config_path(root))?;
    info!(path = %bigo_dir.display(), "Initialized BigO");

    println!("Initialized BigO in {}", bigo_dir.display());
    println!("  Ledger: {}", ledger_path.display());
    println!("  Config: {}", config_path(root).display());
    println!();
    println!("Next steps:");
    println!("  1. Start Ollama and pull the configured models");
    println!("  2. Edit {} to match your setup", config_path(root).display());
    println!("  3. Try: bigo run --dry-run \"fix the typo in README\"");
    Ok(())
}

fn open_or_init_ledger(path: &Path) -> Result<Ledger, Box<dyn Error>> {
    if path.exists() {
        Ok(Ledger::open(path)?)
    } else {
        info!(path = %path.display(), "Creating ledger");
        Ok(Ledger::init(path)?)
    }
}

/// Classify and execute one task. Returns whether the run succeeded.
pub async fn run(root: &Path, args: RunArgs) -> Result<bool, Box<dyn Error>> {
    let mut config = Config::load(&config_path(root))?;
    let policy = Arc::new(config.routing_policy()?);

    let mut request = RunRequest::new(&args.title, &args.description)
        .with_context_path(root.display().to_string());
    if let Some(tier) = args.tier {
        request = request.with_tier(tier);
    }

    if args.dry_run {
        // Nothing is written, so an in-memory ledger stands in.
        let mut conductor = Conductor::new(policy, Arc::new(Ledger::open_in_memory()?));
        for worker in build_workers(&config)? {
            conductor.register_worker(worker);
        }
        let result = conductor.dry_run_request(&request);
        let report = RunReport {
            title: &args.title,
            result: &result,
            tier_policy: conductor.policy().get(result.classification.tier),
        };
        print!("{report}");
        return Ok(true);
    }

    let ledger = Arc::new(open_or_init_ledger(&config.ledger_path(root))?);
    let mut conductor = Conductor::new(policy, ledger);
    for worker in build_workers(&config)? {
        conductor.register_worker(worker);
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                cancel.cancel();
            }
        })
    };

    let reports = conductor.preflight(&cancel).await;
    for line in apply_quota_reports(&mut config, &reports) {
        eprintln!("warning: {line}");
    }
    if !reports.is_empty() {
        eprintln!("routing with: {}", backend_list(&config.enabled_backends()));
    }

    let outcome = conductor.run_request(&cancel, request).await;
    interrupt.abort();
    let result = outcome?;

    let report = RunReport {
        title: &args.title,
        result: &result,
        tier_policy: conductor.policy().get(result.classification.tier),
    };
    print!("{report}");
    Ok(result.is_success())
}

/// Disable the config entry of every backend that failed its quota check.
///
/// Returns one warning line per backend that was still configured.
fn apply_quota_reports(config: &mut Config, reports: &[QuotaReport]) -> Vec<String> {
    reports
        .iter()
        .filter_map(|report| {
            let model = config.disable(report.backend)?;
            debug!(backend = %report.backend, worker = %report.worker_id, "Disabled backend");
            Some(format!(
                "{} ({model}) disabled for this run: {}",
                report.backend, report.message
            ))
        })
        .collect()
}

fn backend_list(backends: &[Backend]) -> String {
    if backends.is_empty() {
        return "none".to_string();
    }
    backends
        .iter()
        .map(|backend| backend.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classify without routing or executing.
pub fn classify(root: &Path, title: &str) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&config_path(root))?;
    let classifier = Classifier::new(Arc::new(config.routing_policy()?));
    let classification = classifier.classify(title, "");
    print!(
        "{}",
        ClassificationReport {
            title,
            classification: &classification,
        }
    );
    Ok(())
}

/// Ledger statistics plus the most recent tasks.
pub fn status(root: &Path, limit: usize) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&config_path(root))?;
    let ledger = Ledger::open(config.ledger_path(root))?;
    let stats = ledger.get_stats()?;
    let tasks = ledger.list_tasks(limit)?;
    print!(
        "{}",
        StatusReport {
            stats: &stats,
            recent: &tasks,
        }
    );
    Ok(())
}

/// Print the effective configuration.
pub fn show_config(root: &Path) -> Result<(), Box<dyn Error>> {
    let path = config_path(root);
    let config = Config::load(&path)?;
    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Terminal report for `bigo run`, dry or executed.
pub(crate) struct RunReport<'a> {
    pub title: &'a str,
    pub result: &'a RunResult,
    pub tier_policy: &'a TierPolicy,
}

impl RunReport<'_> {
    fn fmt_dry_run(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        writeln!(f, "Backend:    {}", result.classification.recommended_backend)?;
        if !result.worker_available {
            writeln!(f, "! Primary worker not available")?;
            match result.fallback_backend {
                Some(fallback) => writeln!(f, "  Fallback: {fallback}")?,
                None => writeln!(f, "  No fallback available")?,
            }
        }
        if self.tier_policy.requires_validation() {
            writeln!(
                f,
                "Validation: {} validator(s), {} approval(s) required",
                self.tier_policy.validator_count, self.tier_policy.required_approvals
            )?;
        } else {
            writeln!(f, "Validation: none")?;
        }
        writeln!(f, "{THIN_RULE}")?;
        writeln!(f, "[DRY RUN] No execution performed")
    }

    fn fmt_executed(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        let backend = result
            .actual_backend
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "{THIN_RULE}")?;
        writeln!(f, "Status:   {}", result.status)?;
        if result.used_fallback {
            writeln!(
                f,
                "Backend:  {} (fallback from {})",
                backend, result.classification.recommended_backend
            )?;
        } else {
            writeln!(f, "Backend:  {backend}")?;
        }
        writeln!(f, "Duration: {}ms", result.duration.as_millis())?;

        if let Some(execution) = &result.execution {
            writeln!(f, "Tokens:   {}", execution.tokens_used)?;
            writeln!(f, "Cost:     ${:.4}", execution.cost_usd)?;
            if execution.success {
                writeln!(f, "{THIN_RULE}")?;
                writeln!(f, "Output:")?;
                writeln!(f, "{}", execution.output.trim_end())?;
            }
        }
        if result.validation_pending {
            writeln!(
                f,
                "Validation pending: {} approval(s) required",
                self.tier_policy.required_approvals
            )?;
        }
        if let Some(error) = &result.error {
            writeln!(f, "{THIN_RULE}")?;
            writeln!(f, "Error: {error}")?;
        }
        Ok(())
    }
}

impl fmt::Display for RunReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.result.classification;
        writeln!(f, "BigO Task Execution")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Task: {}", self.title)?;
        writeln!(f, "{THIN_RULE}")?;
        writeln!(f, "Tier:       {} (T{})", c.tier, c.tier.ordinal())?;
        writeln!(f, "Confidence: {}", percent(c.confidence))?;

        if self.result.dry_run {
            self.fmt_dry_run(f)
        } else {
            self.fmt_executed(f)
        }
    }
}

/// Terminal report for `bigo classify`.
pub(crate) struct ClassificationReport<'a> {
    pub title: &'a str,
    pub classification: &'a ClassificationResult,
}

impl fmt::Display for ClassificationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.classification;
        writeln!(f, "Task:       {}", self.title)?;
        writeln!(f, "Tier:       {} (T{})", c.tier, c.tier.ordinal())?;
        writeln!(f, "Confidence: {}", percent(c.confidence))?;
        writeln!(f, "Backend:    {}", c.recommended_backend)?;
        if c.patterns.is_empty() {
            writeln!(f, "Patterns:   none")?;
        } else {
            writeln!(f, "Patterns:   {}", c.patterns.join(", "))?;
        }
        writeln!(
            f,
            "Scope:      ~{} lines across {} file(s)",
            c.estimated_lines, c.estimated_files
        )?;
        writeln!(f, "Reasoning:  {}", c.reasoning)
    }
}

/// Terminal report for `bigo status`.
pub(crate) struct StatusReport<'a> {
    pub stats: &'a Stats,
    pub recent: &'a [Task],
}

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        writeln!(f, "BigO Status")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "Tasks:      {} total ({} in progress, {} completed)",
            stats.total_tasks, stats.non_terminal_tasks, stats.completed_tasks
        )?;
        writeln!(f, "Executions: {} total", stats.total_executions)?;
        writeln!(f, "{THIN_RULE}")?;
        writeln!(f, "Cost Breakdown:")?;
        for (label, class) in [
            ("Local", &stats.local),
            ("Claude", &stats.claude),
            ("Gemini", &stats.gemini),
        ] {
            writeln!(
                f,
                "  {:<8}${:.4} ({} executions)",
                format!("{label}:"),
                class.cost_usd,
                class.executions
            )?;
        }
        writeln!(
            f,
            "  {:<8}${:.4} ({:.1}%)",
            "Savings:", stats.estimated_savings, stats.savings_percent
        )?;

        if !self.recent.is_empty() {
            writeln!(f, "{THIN_RULE}")?;
            writeln!(f, "{:<36} {:<10} {:<11} TITLE", "ID", "TIER", "STATUS")?;
            for task in self.recent {
                writeln!(
                    f,
                    "{:<36} {:<10} {:<11} {}",
                    task.id.as_str(),
                    task.tier.to_string(),
                    task.status.to_string(),
                    task.title
                )?;
            }
        }
        writeln!(f, "{RULE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigo_conductor::Worker;
    use bigo_core::{RoutingPolicy, TaskStatus};

    fn conductor() -> Conductor {
        Conductor::new(
            Arc::new(RoutingPolicy::default()),
            Arc::new(Ledger::open_in_memory().unwrap()),
        )
    }

    #[test]
    fn test_report_dry_run_without_workers() {
        let c = conductor();
        let result = c.dry_run("refactor the parser", "");
        let out = RunReport {
            title: "refactor the parser",
            result: &result,
            tier_policy: c.policy().get(Tier::Standard),
        }
        .to_string();

        assert!(out.contains("Tier:       STANDARD (T2)"));
        assert!(out.contains("Backend:    claude:sonnet"));
        assert!(out.contains("No fallback available"));
        assert!(out.contains("Validation: 2 validator(s), 2 approval(s) required"));
        assert!(out.ends_with("[DRY RUN] No execution performed\n"));
    }

    #[tokio::test]
    async fn test_report_failed_run_shows_error() {
        let c = conductor();
        let result = c
            .run(&CancellationToken::new(), "fix the typo", "")
            .await
            .unwrap();
        let out = RunReport {
            title: "fix the typo",
            result: &result,
            tier_policy: c.policy().get(Tier::Trivial),
        }
        .to_string();

        assert!(out.contains("Status:   failed"));
        assert!(out.contains("Backend:  -"));
        assert!(out.contains("Error: no available worker for this task tier"));
        assert!(!out.contains("Output:"));
    }

    #[test]
    fn test_report_classification() {
        let classifier = Classifier::new(Arc::new(RoutingPolicy::default()));
        let title = "implement authentication for the payment API";
        let classification = classifier.classify(title, "");
        let out = ClassificationReport {
            title,
            classification: &classification,
        }
        .to_string();

        assert!(out.contains("Tier:       CRITICAL (T4)"));
        assert!(out.contains("Backend:    claude:opus"));
        assert!(out.contains("Patterns:   security, payments"));
    }

    #[test]
    fn test_report_status_lists_recent_tasks() {
        let ledger = Ledger::open_in_memory().unwrap();
        let task = Task::new("fix the typo", "", Tier::Trivial).with_backend(Backend::OllamaFast);
        ledger.create_task(&task).unwrap();

        let stats = ledger.get_stats().unwrap();
        let tasks = ledger.list_tasks(10).unwrap();
        let out = StatusReport {
            stats: &stats,
            recent: &tasks,
        }
        .to_string();

        assert!(out.contains("Tasks:      1 total (1 in progress, 0 completed)"));
        assert!(out.contains("Local:  $0.0000 (0 executions)"));
        assert!(out.contains(task.id.as_str()));
        assert!(out.contains("TRIVIAL"));
        assert_eq!(tasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn test_init_then_status_and_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).unwrap();
        assert!(dir.path().join(".bigo/ledger.db").exists());
        assert!(dir.path().join(".bigo/config.toml").exists());

        status(dir.path(), 5).unwrap();
        assert!(init(dir.path()).is_err());
    }

    #[test]
    fn test_status_before_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status(dir.path(), 5).is_err());
    }

    fn quota_report(backend: Backend) -> QuotaReport {
        QuotaReport {
            backend,
            worker_id: backend.as_str().replace(':', "-"),
            message: "daily quota exhausted".into(),
        }
    }

    #[test]
    fn test_quota_reports_disable_config_entries() {
        let mut config = Config::default();
        config.workers.gemini.enabled = false;
        let reports = vec![
            quota_report(Backend::ClaudeSonnet),
            quota_report(Backend::ClaudeSonnet),
        ];

        let warnings = apply_quota_reports(&mut config, &reports);
        assert_eq!(
            warnings,
            vec!["claude:sonnet (claude-sonnet-4-20250514) disabled for this run: daily quota exhausted"]
        );
        assert_eq!(config.model_for(Backend::ClaudeSonnet), None);
        assert_eq!(
            backend_list(&config.enabled_backends()),
            "ollama:fast, ollama:default, ollama:reasoning, claude:haiku, claude:opus"
        );
        assert!(!build_workers(&config)
            .unwrap()
            .iter()
            .any(|w| w.backend() == Backend::ClaudeSonnet));
    }

    #[test]
    fn test_backend_list_when_everything_is_disabled() {
        let mut config = Config::default();
        config.workers.ollama.enabled = false;
        config.workers.claude.enabled = false;
        config.workers.gemini.enabled = false;
        assert_eq!(backend_list(&config.enabled_backends()), "none");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            title: "fix the typo".into(),
            description: String::new(),
            tier: None,
            dry_run: true,
        };
        assert!(run(dir.path(), args).await.unwrap());
        assert!(!dir.path().join(BIGO_DIR).exists());
    }
}
