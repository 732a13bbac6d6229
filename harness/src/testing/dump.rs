//! Human-readable dump of every unit, rendered when a test fails

use std::fmt;

use super::enricher::{EnrichOptions, EnrichedLog, EnrichedUnit, ResultEnricher};
use crate::error::{HarnessError, HarnessResult};
use shared::{DataApi, LineType, ResourcePath, ResultCode};

const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const LOG_INDENT: &str = "        ";

pub const DUMP_HEADER: &str = "FAILED! dumping unit db for debug";

/// Display adapter rendering one enriched unit
///
/// Log content is only shown for steps that did not succeed.
pub struct UnitDump<'a>(pub &'a EnrichedUnit);

impl fmt::Display for UnitDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = &self.0.unit;
        writeln!(
            f,
            "*** UNIT {} *** ==> {} ({})",
            unit.unitid,
            unit.state_string,
            ResultCode::describe(unit.results)
        )?;

        for step in self.0.steps.iter().flatten() {
            writeln!(
                f,
                "    *** STEP {} *** ==> {} ({})",
                step.step.name,
                step.step.state_string,
                ResultCode::describe(step.step.results)
            )?;
            for url in &step.step.urls {
                writeln!(f, "       url:{} ({})", url.name, url.url)?;
            }
            for log in step.logs.iter().flatten() {
                writeln!(f, "        log:{} ({})", log.log.name, log.log.num_lines)?;
                if step.step.results != Some(ResultCode::Success) {
                    write_log(f, log)?;
                }
            }
        }
        Ok(())
    }
}

fn write_log(f: &mut fmt::Formatter<'_>, log: &EnrichedLog) -> fmt::Result {
    writeln!(f, "{LOG_INDENT}*********** LOG: {} *********", log.log.name)?;
    let content = log.content.as_ref().map(|c| c.content.as_str()).unwrap_or("");
    if log.log.log_type.is_structured() {
        for line in content.lines() {
            match LineType::split(line) {
                (LineType::Header, text) => writeln!(f, "{LOG_INDENT}{CYAN}{text}{RESET}")?,
                (LineType::Stderr, text) => writeln!(f, "{LOG_INDENT}{RED}{text}{RESET}")?,
                (LineType::Stdout, text) => writeln!(f, "{LOG_INDENT}{text}")?,
            }
        }
    } else {
        writeln!(f, "{}", content.trim_end_matches('\n'))?;
    }
    writeln!(f, "{LOG_INDENT}********************************")
}

pub fn render_unit(unit: &EnrichedUnit) -> String {
    UnitDump(unit).to_string()
}

/// Fetch every unit with all descendants and render them under the failure header
pub async fn render_failure_dump<D: DataApi + ?Sized>(api: &D) -> HarnessResult<String> {
    let units = api
        .get_units()
        .await
        .map_err(|e| HarnessError::read_failed(ResourcePath::Units, e))?;

    let enricher = ResultEnricher::new(api);
    let mut dump = format!("{DUMP_HEADER}\n");
    for unit in units {
        let enriched = enricher.enrich(unit, EnrichOptions::all()).await?;
        dump.push_str(&render_unit(&enriched));
    }
    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::enricher::EnrichedStep;
    use chrono::Utc;
    use shared::{
        LogContent, LogId, LogRecord, LogType, StepId, StepRecord, StepUrl, UnitId, UnitRecord,
    };

    fn unit(results: Option<ResultCode>) -> UnitRecord {
        UnitRecord {
            unitid: UnitId(4),
            number: 4,
            scheduler: "force".into(),
            state_string: "finished".into(),
            results,
            started_at: Utc::now(),
            complete_at: None,
        }
    }

    fn step_with_log(results: ResultCode, log_type: LogType, content: &str) -> EnrichedStep {
        EnrichedStep {
            step: StepRecord {
                stepid: StepId(1),
                unitid: UnitId(4),
                number: 0,
                name: "compile".into(),
                state_string: results.to_string(),
                results: Some(results),
                urls: vec![StepUrl {
                    name: "report".into(),
                    url: "http://example.invalid/report".into(),
                }],
            },
            logs: Some(vec![EnrichedLog {
                log: LogRecord {
                    logid: LogId(9),
                    stepid: StepId(1),
                    name: "stdio".into(),
                    log_type,
                    num_lines: content.lines().count(),
                },
                content: Some(LogContent {
                    logid: LogId(9),
                    firstline: 0,
                    content: content.into(),
                }),
            }]),
        }
    }

    #[test]
    fn test_unit_header_describes_unfinished_result() {
        let rendered = render_unit(&EnrichedUnit::bare(unit(None)));
        assert_eq!(rendered, "*** UNIT 4 *** ==> finished (not finished)\n");
    }

    #[test]
    fn test_successful_step_hides_log_content() {
        let mut enriched = EnrichedUnit::bare(unit(Some(ResultCode::Success)));
        enriched.steps = Some(vec![step_with_log(
            ResultCode::Success,
            LogType::Stdio,
            "hmake\noall good\n",
        )]);

        let rendered = render_unit(&enriched);
        assert!(rendered.contains("    *** STEP compile *** ==> success (success)\n"));
        assert!(rendered.contains("       url:report (http://example.invalid/report)\n"));
        assert!(rendered.contains("        log:stdio (2)\n"));
        assert!(!rendered.contains("LOG: stdio"));
    }

    #[test]
    fn test_failed_step_colours_structured_lines() {
        let mut enriched = EnrichedUnit::bare(unit(Some(ResultCode::Failure)));
        enriched.steps = Some(vec![step_with_log(
            ResultCode::Failure,
            LogType::Stdio,
            "hmake all\nocompiling\neerror: boom\n",
        )]);

        let rendered = render_unit(&enriched);
        let expected = concat!(
            "        *********** LOG: stdio *********\n",
            "        \x1b[36mmake all\x1b[0m\n",
            "        compiling\n",
            "        \x1b[31merror: boom\x1b[0m\n",
            "        ********************************\n",
        );
        assert!(rendered.ends_with(expected), "got:\n{rendered}");
    }

    #[test]
    fn test_failed_step_prints_text_logs_verbatim() {
        let mut enriched = EnrichedUnit::bare(unit(Some(ResultCode::Failure)));
        enriched.steps = Some(vec![step_with_log(
            ResultCode::Failure,
            LogType::Text,
            "plain text\nsecond line\n",
        )]);

        let rendered = render_unit(&enriched);
        assert!(rendered.contains("LOG: stdio *********\nplain text\nsecond line\n        ***"));
    }
}
