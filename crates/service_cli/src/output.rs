//! Report rendering
//!
//! Writes trial results, simulation reports and sweeps as a table, JSON or
//! CSV. Every writer takes `impl Write` so output can be captured in tests.
//!
//! Report CSV holds one `trial,z,n` record per completed trial, where `trial`
//! is the run's 0-based trial index, followed by `#`-prefixed summary lines
//! that CSV readers configured with a comment character skip.

use std::io::Write;

use serde::Serialize;
use snoop_kernel::{RunStatus, SimulationReport, SweepPoint, TrialResult};

use crate::config::OutputFormat;
use crate::Result;

#[derive(Serialize)]
struct TrialRow {
    trial: usize,
    z: f64,
    n: u64,
}

#[derive(Serialize)]
struct SweepRow {
    nmin: u64,
    nmax: u64,
    proportion_not_capped: f64,
    standard_error: f64,
    trials: usize,
    status: &'static str,
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Complete => "complete",
        RunStatus::Partial => "partial",
    }
}

/// Write one trial as `sum n z reason`.
pub fn write_trial<W: Write>(out: &mut W, result: &TrialResult) -> Result<()> {
    writeln!(out, "sum\tn\tz\treason")?;
    writeln!(
        out,
        "{:.6}\t{}\t{:.6}\t{}",
        result.sum,
        result.n,
        result.z(),
        result.stop_reason
    )?;
    Ok(())
}

/// Write a simulation report; table output shows at most `rows` trials.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &SimulationReport,
    format: OutputFormat,
    rows: usize,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            {
                let mut wtr = csv::Writer::from_writer(&mut *out);
                for row in &report.rows {
                    wtr.serialize(TrialRow {
                        trial: row.trial,
                        z: row.z,
                        n: row.n,
                    })?;
                }
                wtr.flush()?;
            }
            write_csv_summary(out, report)?;
        }
        OutputFormat::Table => write_report_table(out, report, rows)?,
    }
    Ok(())
}

fn write_csv_summary<W: Write>(out: &mut W, report: &SimulationReport) -> Result<()> {
    let summary = &report.summary;
    writeln!(out, "# status,{}", status_label(report.status))?;
    writeln!(out, "# completed,{}", report.rows.len())?;
    writeln!(out, "# requested,{}", report.requested)?;
    writeln!(out, "# proportion_not_capped,{}", summary.proportion_not_capped)?;
    writeln!(out, "# standard_error,{}", summary.standard_error)?;
    writeln!(out, "# z_mean,{}", report.z_stats.mean)?;
    writeln!(out, "# z_std_dev,{}", report.z_stats.std_dev)?;
    writeln!(out, "# z_exceedance_rate,{}", report.z_stats.exceedance_rate)?;
    Ok(())
}

fn write_report_table<W: Write>(
    out: &mut W,
    report: &SimulationReport,
    rows: usize,
) -> Result<()> {
    let params = &report.params;
    let completed = report.rows.len();

    writeln!(out, "Optional stopping simulation")?;
    match report.confidence {
        Some(level) => writeln!(out, "  crit      {:.7} (confidence {})", params.crit(), level)?,
        None => writeln!(out, "  crit      {:.7}", params.crit())?,
    }
    writeln!(out, "  nmin      {}", params.nmin())?;
    writeln!(out, "  nmax      {}", params.nmax())?;
    writeln!(out, "  seed      {} ({} streams)", report.seed, report.layout)?;
    writeln!(
        out,
        "  trials    {} of {} ({})",
        completed,
        report.requested,
        status_label(report.status)
    )?;
    if report.is_partial() {
        writeln!(out, "  PARTIAL: run cancelled before all trials completed")?;
        // Long-running trials are the ones left unfinished, so p leans high
        writeln!(
            out,
            "  proportion covers completed trials only; unfinished trials were likely capped"
        )?;
    }

    if rows > 0 {
        writeln!(out)?;
        writeln!(out, "┌────────┬──────────────┬──────────────┐")?;
        writeln!(out, "│ Trial  │ z            │ n            │")?;
        writeln!(out, "├────────┼──────────────┼──────────────┤")?;
        for row in report.rows.iter().take(rows) {
            writeln!(out, "│ {:<6} │ {:>12.6} │ {:>12} │", row.trial, row.z, row.n)?;
        }
        writeln!(out, "└────────┴──────────────┴──────────────┘")?;
        if completed > rows {
            writeln!(out, "  ({} more rows not shown)", completed - rows)?;
        }
    }

    let summary = &report.summary;
    let z = &report.z_stats;
    writeln!(out)?;
    writeln!(
        out,
        "Proportion not capped: {:.4} ± {:.4} (95% CI ± {:.4})",
        summary.proportion_not_capped,
        summary.standard_error,
        summary.confidence_95()
    )?;
    writeln!(
        out,
        "z: mean {:.4}, std dev {:.4}, exceeding crit {:.4}",
        z.mean, z.std_dev, z.exceedance_rate
    )?;
    Ok(())
}

/// Write one summary row per sweep point.
pub fn write_sweep<W: Write>(
    out: &mut W,
    points: &[SweepPoint],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, points)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(&mut *out);
            for p in points {
                wtr.serialize(SweepRow {
                    nmin: p.nmin,
                    nmax: p.nmax,
                    proportion_not_capped: p.summary.proportion_not_capped,
                    standard_error: p.summary.standard_error,
                    trials: p.summary.trials,
                    status: status_label(p.status),
                })?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table => {
            writeln!(out, "┌────────────┬──────────────┬────────────┬────────────┬──────────┐")?;
            writeln!(out, "│ nmin       │ nmax         │ p          │ std error  │ status   │")?;
            writeln!(out, "├────────────┼──────────────┼────────────┼────────────┼──────────┤")?;
            for p in points {
                writeln!(
                    out,
                    "│ {:<10} │ {:<12} │ {:>10.4} │ {:>10.4} │ {:<8} │",
                    p.nmin,
                    p.nmax,
                    p.summary.proportion_not_capped,
                    p.summary.standard_error,
                    status_label(p.status)
                )?;
            }
            writeln!(out, "└────────────┴──────────────┴────────────┴────────────┴──────────┘")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snoop_kernel::{
        CancellationToken, NormalizedTrial, Simulation, SimulationConfig, StopReason,
        SummaryEstimate, Threshold,
    };

    fn report() -> SimulationReport {
        let config = SimulationConfig::builder()
            .seed(3)
            .trial_count(25)
            .threshold(Threshold::Confidence(0.95))
            .nmin(5)
            .nmax(500)
            .build()
            .unwrap();
        Simulation::new(config).run(&CancellationToken::new()).unwrap()
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_trial_line() {
        let result = TrialResult {
            sum: 8.0,
            n: 16,
            stop_reason: StopReason::RuleTriggered,
        };
        let text = render(|out| write_trial(out, &result));
        assert_eq!(text, "sum\tn\tz\treason\n8.000000\t16\t2.000000\trule\n");
    }

    #[test]
    fn test_table_limits_rows() {
        let report = report();
        let text = render(|out| write_report(out, &report, OutputFormat::Table, 5));

        assert!(text.contains("confidence 0.95"));
        assert!(text.contains("25 of 25 (complete)"));
        assert!(text.contains("(20 more rows not shown)"));
        assert!(text.contains("Proportion not capped"));
        assert!(!text.contains("PARTIAL"));
    }

    #[test]
    fn test_table_flags_partial_run() {
        let mut report = report();
        report.status = RunStatus::Partial;
        report.requested = 100;
        let text = render(|out| write_report(out, &report, OutputFormat::Table, 0));

        assert!(text.contains("25 of 100 (partial)"));
        assert!(text.contains("PARTIAL"));
        assert!(text.contains("completed trials only"));
        assert!(!text.contains("Trial"));
    }

    #[test]
    fn test_rows_show_trial_index_not_position() {
        let mut report = report();
        report.status = RunStatus::Partial;
        report.rows = vec![
            NormalizedTrial { trial: 0, z: 1.5, n: 12 },
            NormalizedTrial { trial: 4, z: -0.25, n: 500 },
        ];

        let csv = render(|out| write_report(out, &report, OutputFormat::Csv, 0));
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("trial,z,n"));
        assert_eq!(lines.next(), Some("0,1.5,12"));
        assert_eq!(lines.next(), Some("4,-0.25,500"));

        let table = render(|out| write_report(out, &report, OutputFormat::Table, 5));
        assert!(table.contains("│ 4      │"));
        assert!(!table.contains("│ 1      │"));
    }

    #[test]
    fn test_json_report() {
        let report = report();
        let text = render(|out| write_report(out, &report, OutputFormat::Json, 0));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["seed"], 3);
        assert_eq!(value["status"], "complete");
        assert_eq!(value["layout"], "shared");
        assert_eq!(value["rows"].as_array().unwrap().len(), 25);
        assert!(value["summary"]["proportion_not_capped"].is_number());
    }

    #[test]
    fn test_csv_report() {
        let report = report();
        let text = render(|out| write_report(out, &report, OutputFormat::Csv, 0));
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("trial,z,n"));
        assert_eq!(lines.next().map(|l| l.starts_with("0,")), Some(true));

        // Summary trailer is skipped by a comment-aware reader
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());
        assert_eq!(rdr.records().count(), 25);

        let expected = format!(
            "# proportion_not_capped,{}",
            report.summary.proportion_not_capped
        );
        assert!(text.lines().any(|l| l == expected));
        assert!(text.contains("# status,complete"));
        assert!(text.contains("# completed,25"));
        assert!(text.contains("# standard_error,"));
    }

    #[test]
    fn test_sweep_formats() {
        let points = vec![
            SweepPoint {
                nmin: 10,
                nmax: 100,
                summary: SummaryEstimate::from_counts(3, 10),
                status: RunStatus::Complete,
            },
            SweepPoint {
                nmin: 10,
                nmax: 1000,
                summary: SummaryEstimate::from_counts(6, 10),
                status: RunStatus::Partial,
            },
        ];

        let csv = render(|out| write_sweep(out, &points, OutputFormat::Csv));
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("nmin,nmax,proportion_not_capped,standard_error,trials,status")
        );
        assert!(lines.next().unwrap().starts_with("10,100,0.3,"));
        assert!(lines.next().unwrap().ends_with(",10,partial"));

        let table = render(|out| write_sweep(out, &points, OutputFormat::Table));
        assert!(table.contains("0.6000"));
        assert!(table.contains("partial"));
    }
}
