use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};
use recon_hunter::models::{JobStatusRecord, ScanPayload};
use recon_hunter::output::{append_status_jsonl, ensure_dir, write_result};
use recon_hunter::{Config, JobId, Orchestrator, ScanResult, ScanType};

static HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("hostname pattern is valid")
});

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Keep external crates (reqwest/hyper/hickory) quiet unless something is wrong.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!(
        "recon_hunter={level},reqwest=info,hyper=info,h2=info,hickory_resolver=warn,hickory_proto=warn",
        level = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scan { target, scan_type, out, job_id, config, timing, concurrency, per_host, timeout, ports } => {
            let domain = normalize_domain(&target)?;
            let scan_type: ScanType = scan_type.parse()?;

            let mut cfg = match config {
                Some(path) => Config::from_file(Path::new(&path))?,
                None => Config::default(),
            };
            if let Some(t) = timing {
                cfg = cfg.with_timing(t);
            }
            if let Some(c) = concurrency {
                cfg.concurrency = c;
            }
            if let Some(p) = per_host {
                cfg.per_host = p;
            }
            if let Some(secs) = timeout {
                cfg.http_timeout_secs = secs;
            }
            if let Some(ports) = ports {
                cfg.ports = ports;
            }
            let cfg = cfg.validated()?;

            let job_id = JobId::from(job_id.unwrap_or_else(|| {
                format!("{}-{}", domain.replace('.', "-"), Utc::now().format("%Y%m%d%H%M%S"))
            }));

            tracing::info!(job_id = %job_id, domain = %domain, scan_type = %scan_type, concurrency = cfg.concurrency, per_host = cfg.per_host, "Starting scan");
            println!("[>] Target: {}", domain);
            println!("[~] Scan: {} (job {}, concurrency: {}, per-host: {})", scan_type, job_id, cfg.concurrency, cfg.per_host);
            println!("\n{}\n", "-".repeat(60));

            run_scan(cfg, job_id, domain, scan_type, PathBuf::from(out)).await?;
        }
    }
    Ok(())
}

/// Trim, lower-case and strip any URL scheme/path from the user's target.
fn normalize_domain(target: &str) -> anyhow::Result<String> {
    let target = target.trim().to_lowercase();
    let domain = if target.starts_with("http://") || target.starts_with("https://") {
        match url::Url::parse(&target) {
            Ok(u) => u.host_str().map(|s| s.to_string()).unwrap_or(target.clone()),
            Err(_) => target.clone(),
        }
    } else {
        target.clone()
    };
    let domain = domain.trim_end_matches('.').to_string();

    if domain.is_empty() {
        anyhow::bail!("Domain cannot be empty");
    }
    if !HOSTNAME.is_match(&domain) {
        anyhow::bail!("Not a valid domain name: {}", domain);
    }
    Ok(domain)
}

async fn run_scan(cfg: Config, job_id: JobId, domain: String, scan_type: ScanType, out_dir: PathBuf) -> anyhow::Result<()> {
    ensure_dir(&out_dir)?;
    let status_path = out_dir.join(format!("{}.status.jsonl", job_id));
    let result_path = out_dir.join(format!("{}.json", job_id));

    let orchestrator = Arc::new(Orchestrator::from_config(&cfg)?);
    orchestrator.mark_pending(&job_id);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[!] Interrupted, cancelling scan...");
                cancel.cancel();
            }
        });
    }

    let handle = {
        let orchestrator = orchestrator.clone();
        let job_id = job_id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run_with_cancel(&job_id, &domain, scan_type, &cancel).await })
    };

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")?.progress_chars("=> "));

    let mut last: Option<JobStatusRecord> = None;
    let mut tick = tokio::time::interval(Duration::from_millis(200));
    loop {
        tick.tick().await;
        let finished = handle.is_finished();
        let status = orchestrator.get_status(&job_id);
        if last.as_ref().map_or(true, |l| l.progress != status.progress || l.message != status.message || l.status != status.status) {
            bar.set_position(status.progress as u64);
            bar.set_message(format!("[{}] {}", status.phase, status.message));
            if let Err(e) = append_status_jsonl(&status_path, &job_id, &[&status]) {
                tracing::warn!(error = %e, path = %status_path.display(), "failed to record status");
            }
            last = Some(status);
        }
        if finished {
            break;
        }
    }

    match handle.await? {
        Ok(result) => {
            bar.finish_with_message("done");
            write_result(&result_path, &result)?;
            print_summary(&result);
            println!("\n[+] Results written to {}", result_path.display());
            Ok(())
        }
        Err(e) => {
            let status = orchestrator.get_status(&job_id);
            bar.abandon_with_message(status.message.clone());
            eprintln!("[!] {}", status.message);
            Err(e.into())
        }
    }
}

fn print_summary(result: &ScanResult) {
    println!("\n[*] Scan of {} ({})", result.target_domain, result.scan_type());
    match &result.payload {
        ScanPayload::Full { summary, .. } => {
            println!("    Subdomains:              {}", summary.total_subdomains);
            println!("    Targets:                 {}", summary.total_targets);
            println!("    Targets with open ports: {}", summary.targets_with_open_ports);
            println!("    Vulnerabilities:         {}", summary.total_vulnerabilities);
        }
        ScanPayload::Subdomain { subdomains, total_found } => {
            println!("    Subdomains found: {}", total_found);
            for s in subdomains {
                println!("      - {}", s);
            }
        }
        ScanPayload::Port { port_scan_results } => {
            for (target, res) in port_scan_results {
                let ports: Vec<String> = res.open_ports.iter().map(|p| format!("{}/{}", p.port, p.service)).collect();
                println!("    {}: {}", target, ports.join(", "));
            }
        }
        ScanPayload::Vuln { vulnerabilities, total_vulnerabilities } => {
            println!("    Vulnerabilities: {}", total_vulnerabilities);
            for v in vulnerabilities {
                println!("      [{}] {}:{} {}", v.severity, v.target, v.port, v.description);
            }
        }
    }
}
