// tests/commands.rs

use std::error::Error;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use taro::cli::{
    EnvArgs, HistoryArgs, InstanceArgs, MatchArg, PatternArgs, PhaseArgs, ResumeArgs, StageArg,
    StopArgs, TailArgs, WaitArgs,
};
use taro::commands::{
    self, control, env, history, instance, listen, ps, stats, tail, wait, CommandContext,
};
use taro::connector::{EnvironmentConnector, MemoryEnvironment};
use taro::engine::{open_detail, shutdown_channel, DetailView};
use taro::errors::TaroError;
use taro::job::{ControlPoint, TerminationStatus};
use taro_test_utils::builders::{ConfigFileBuilder, JobRunBuilder};
use taro_test_utils::{init_tracing, with_timeout};
use tokio::time::sleep;

type TestResult = Result<(), Box<dyn Error>>;

fn setup() -> (Arc<MemoryEnvironment>, CommandContext) {
    init_tracing();
    let env = Arc::new(MemoryEnvironment::new("test"));
    let ctx = CommandContext::new(env.clone(), false);
    (env, ctx)
}

fn patterns(list: &[&str]) -> PatternArgs {
    PatternArgs {
        patterns: list.iter().map(|s| s.to_string()).collect(),
        matching: MatchArg::Partial,
    }
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).expect("utf-8 output")
}

#[tokio::test]
async fn ps_prints_matching_active_runs() -> TestResult {
    let (env, ctx) = setup();
    env.create("backup", "1");
    env.create("report", "1");

    let mut out = Vec::new();
    ps::run(&ctx, &patterns(&["back"]), &mut out).await?;
    let printed = text(out);

    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 2, "{printed}");
    assert!(lines[0].starts_with("JOB ID"));
    assert!(lines[0].contains("TERM STATUS"));
    assert!(lines[1].starts_with("backup"));
    assert!(lines[1].contains("CREATED"));
    Ok(())
}

#[tokio::test]
async fn ps_without_runs_says_so() -> TestResult {
    let (_env, ctx) = setup();
    let mut out = Vec::new();
    ps::run(&ctx, &patterns(&[]), &mut out).await?;
    assert_eq!(text(out).trim(), "No active runs");
    Ok(())
}

#[tokio::test]
async fn history_lists_ended_runs_up_to_limit() -> TestResult {
    let (env, ctx) = setup();
    for n in 1..=3 {
        let run_id = env.create("job", &n.to_string()).instance_id;
        env.end(&run_id, TerminationStatus::Completed);
    }
    env.create("job", "live");

    let mut out = Vec::new();
    let args = HistoryArgs {
        filter: patterns(&[]),
        limit: 2,
    };
    history::run(&ctx, &args, &mut out).await?;
    let printed = text(out);

    assert_eq!(printed.lines().count(), 3, "{printed}");
    assert!(printed.contains("COMPLETED"));
    assert!(!printed.contains("live"));
    Ok(())
}

#[tokio::test]
async fn stop_asks_for_confirmation() -> TestResult {
    let (env, ctx) = setup();
    env.create("backup", "1");
    let args = StopArgs {
        patterns: vec!["back*".to_string()],
        force: false,
    };

    let mut out = Vec::new();
    let stopped = control::stop(&ctx, &args, &mut Cursor::new("n\n"), &mut out).await?;
    assert_eq!(stopped, 0);
    assert!(text(out).contains("[Y/n]"));
    assert_eq!(env.get_active_runs(&Default::default()).await?.len(), 1);

    let mut out = Vec::new();
    let stopped = control::stop(&ctx, &args, &mut Cursor::new("\n"), &mut out).await?;
    assert_eq!(stopped, 1);
    assert!(text(out).contains("backup@1 -> APPLIED"));
    assert!(env.get_active_runs(&Default::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn forced_stop_skips_the_prompt() -> TestResult {
    let (env, ctx) = setup();
    env.create("a", "1");
    env.create("a", "2");
    let args = StopArgs {
        patterns: vec!["a".to_string()],
        force: true,
    };

    let mut out = Vec::new();
    let stopped = control::stop(&ctx, &args, &mut Cursor::new(""), &mut out).await?;

    assert_eq!(stopped, 2);
    assert!(!text(out).contains("[Y/n]"));
    Ok(())
}

#[tokio::test]
async fn stop_without_match_reports_patterns() -> TestResult {
    let (_env, ctx) = setup();
    let args = StopArgs {
        patterns: vec!["ghost".to_string()],
        force: true,
    };
    let mut out = Vec::new();
    control::stop(&ctx, &args, &mut Cursor::new(""), &mut out).await?;
    assert_eq!(text(out).trim(), "No instances to stop: ghost");
    Ok(())
}

#[tokio::test]
async fn approve_releases_waiting_phase_of_matching_runs() -> TestResult {
    let (env, ctx) = setup();
    let waiting = env.create("deploy", "1").instance_id;
    env.enter_phase(&waiting, "gate", Some(ControlPoint::Approval));
    env.create("deploy", "2");

    let args = PhaseArgs {
        patterns: vec!["deploy".to_string()],
        phase_id: "gate".to_string(),
    };
    let mut out = Vec::new();
    let approved = control::approve(&ctx, &args, &mut out).await?;

    assert_eq!(approved, 1);
    assert_eq!(text(out), "Approved:\ndeploy@1\n");
    Ok(())
}

#[tokio::test]
async fn approve_leaves_checkpoints_for_resume() -> TestResult {
    let (env, ctx) = setup();
    let parked = env.create("deploy", "1").instance_id;
    env.enter_phase(&parked, "gate", Some(ControlPoint::Checkpoint));

    let args = PhaseArgs {
        patterns: vec!["deploy".to_string()],
        phase_id: "gate".to_string(),
    };
    let mut out = Vec::new();
    assert_eq!(control::approve(&ctx, &args, &mut out).await?, 0);
    assert!(out.is_empty());

    let resume = ResumeArgs {
        target: args,
        force: true,
    };
    let mut out = Vec::new();
    assert_eq!(control::resume(&ctx, &resume, &mut Cursor::new(""), &mut out).await?, 1);
    Ok(())
}

#[tokio::test]
async fn resume_reports_per_pattern_and_total() -> TestResult {
    let (env, ctx) = setup();
    let parked = env.create("etl", "1").instance_id;
    env.enter_phase(&parked, "checkpoint", Some(ControlPoint::Checkpoint));
    env.create("idle", "1");

    let args = ResumeArgs {
        target: PhaseArgs {
            patterns: vec!["etl".to_string(), "idle".to_string(), "ghost".to_string()],
            phase_id: "checkpoint".to_string(),
        },
        force: true,
    };
    let mut out = Vec::new();
    let resumed = control::resume(&ctx, &args, &mut Cursor::new(""), &mut out).await?;
    let printed = text(out);

    assert_eq!(resumed, 1);
    assert!(printed.contains("Resumed etl@1"), "{printed}");
    assert!(printed.contains("none is waiting at checkpoint 'checkpoint'"), "{printed}");
    assert!(printed.contains("No instances found for pattern: ghost"), "{printed}");
    assert!(printed.trim_end().ends_with("Total resumed: 1"), "{printed}");
    Ok(())
}

#[tokio::test]
async fn declined_resume_is_skipped() -> TestResult {
    let (env, ctx) = setup();
    let parked = env.create("etl", "1").instance_id;
    env.enter_phase(&parked, "checkpoint", Some(ControlPoint::Checkpoint));

    let args = ResumeArgs {
        target: PhaseArgs {
            patterns: vec!["etl".to_string()],
            phase_id: "checkpoint".to_string(),
        },
        force: false,
    };
    let mut out = Vec::new();
    let resumed = control::resume(&ctx, &args, &mut Cursor::new("no\n"), &mut out).await?;

    assert_eq!(resumed, 0);
    assert!(text(out).contains("Skipped"));
    Ok(())
}

#[test]
fn confirmation_defaults_to_yes_and_closed_input_to_no() -> TestResult {
    let mut sink = Vec::new();
    assert!(commands::confirm(&mut Cursor::new("\n"), &mut sink)?);
    assert!(commands::confirm(&mut Cursor::new("Y\n"), &mut sink)?);
    assert!(!commands::confirm(&mut Cursor::new("nope\n"), &mut sink)?);
    assert!(!commands::confirm(&mut Cursor::new(""), &mut sink)?);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn listen_prints_lifecycle_transitions_until_shutdown() -> TestResult {
    let (env, ctx) = setup();
    let (handle, signal) = shutdown_channel();
    let args = patterns(&["job"]);
    let mut out = Vec::new();

    let producer = async {
        sleep(Duration::from_millis(100)).await;
        let run_id = env.create("job", "1").instance_id;
        env.start(&run_id);
        env.update_status(&run_id, "noise");
        env.create("other", "1");
        env.end(&run_id, TerminationStatus::Completed);
        sleep(Duration::from_millis(100)).await;
        handle.trigger();
    };

    let (printed, ()) = with_timeout(async {
        tokio::join!(listen::run(&ctx, &args, signal, &mut out), producer)
    })
    .await;
    let printed = printed?;
    let output = text(out);

    assert_eq!(printed, 3, "{output}");
    assert!(output.contains("Listening for events"));
    assert!(output.contains("job@1  CREATED"));
    assert!(output.contains("job@1  RUNNING"));
    assert!(output.contains("job@1  ENDED"));
    assert!(!output.contains("other@1"));
    assert_eq!(env.observer_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_stops_after_the_requested_number_of_transitions() -> TestResult {
    let (env, ctx) = setup();
    let (_handle, signal) = shutdown_channel();
    let args = WaitArgs {
        filter: patterns(&["job"]),
        stage: Some(StageArg::Running),
        count: 2,
        timeout: None,
    };
    let mut out = Vec::new();

    let producer = async {
        sleep(Duration::from_millis(100)).await;
        for run_id in ["1", "2", "3"] {
            let id = env.create("job", run_id).instance_id;
            env.start(&id);
        }
        let other = env.create("other", "1").instance_id;
        env.start(&other);
    };

    let (seen, ()) = with_timeout(async {
        tokio::join!(wait::run(&ctx, &args, signal, &mut out), producer)
    })
    .await;
    let output = text(out);

    assert_eq!(seen?, 2, "{output}");
    assert!(output.contains("job@1  RUNNING"));
    assert!(output.contains("job@2  RUNNING"));
    assert!(!output.contains("job@3"));
    assert!(!output.contains("CREATED"));
    assert_eq!(env.observer_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_gives_up_after_the_timeout() -> TestResult {
    let (env, ctx) = setup();
    let (_handle, signal) = shutdown_channel();
    let args = WaitArgs {
        filter: patterns(&["job"]),
        stage: Some(StageArg::Ended),
        count: 1,
        timeout: Some(Duration::from_secs(2)),
    };
    env.create("job", "1");

    let mut out = Vec::new();
    let result = with_timeout(wait::run(&ctx, &args, signal, &mut out)).await;

    assert!(
        matches!(&result, Err(TaroError::Timeout(msg)) if msg.contains("0 of 1")),
        "{result:?}"
    );
    assert!(text(out).is_empty());
    assert_eq!(env.observer_count(), 0);
    Ok(())
}

#[tokio::test]
async fn tail_prints_recent_output_per_active_run() -> TestResult {
    let (env, ctx) = setup();
    let backup = env.create("backup", "1").instance_id;
    let report = env.create("report", "1").instance_id;
    env.print(&backup, "copying");
    env.print(&backup, "verifying");
    env.print(&report, "rendering");

    let mut out = Vec::new();
    let (_handle, signal) = shutdown_channel();
    let args = TailArgs {
        filter: patterns(&["backup"]),
        follow: false,
    };
    let printed = tail::run(&ctx, &args, signal, &mut out).await?;

    assert_eq!(printed, 2);
    assert_eq!(text(out), " ---> backup@1\ncopying\nverifying\n");
    Ok(())
}

#[tokio::test]
async fn tail_without_runs_says_so() -> TestResult {
    let (_env, ctx) = setup();
    let (_handle, signal) = shutdown_channel();
    let args = TailArgs {
        filter: patterns(&[]),
        follow: false,
    };
    let mut out = Vec::new();
    assert_eq!(tail::run(&ctx, &args, signal, &mut out).await?, 0);
    assert_eq!(text(out).trim(), "No active runs");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn followed_tail_streams_output_until_shutdown() -> TestResult {
    let (env, ctx) = setup();
    let (handle, signal) = shutdown_channel();
    let args = TailArgs {
        filter: patterns(&["job"]),
        follow: true,
    };
    let first = env.create("job", "1").instance_id;
    let second = env.create("job", "2").instance_id;
    let other = env.create("other", "1").instance_id;
    env.print(&first, "before subscribing");
    let mut out = Vec::new();

    let producer = async {
        sleep(Duration::from_millis(100)).await;
        env.print(&first, "a");
        env.print(&first, "b");
        env.print(&other, "ignored");
        env.print(&second, "c");
        env.print(&first, "d");
        sleep(Duration::from_millis(100)).await;
        handle.trigger();
    };

    let (printed, ()) = with_timeout(async {
        tokio::join!(tail::run(&ctx, &args, signal, &mut out), producer)
    })
    .await;

    assert_eq!(printed?, 4);
    assert_eq!(
        text(out),
        " ---> job@1\na\nb\n ---> job@2\nc\n ---> job@1\nd\n"
    );
    assert_eq!(env.observer_count(), 0);
    Ok(())
}

#[tokio::test]
async fn stats_aggregate_ended_runs_per_job() -> TestResult {
    let (env, ctx) = setup();
    env.insert(
        JobRunBuilder::new("backup", "1")
            .ended(TerminationStatus::Completed, 10)
            .build(),
    );
    env.insert(
        JobRunBuilder::new("backup", "2")
            .created_after(100)
            .ended(TerminationStatus::Failed, 30)
            .warning("disk almost full")
            .build(),
    );
    env.insert(
        JobRunBuilder::new("backup", "3")
            .created_after(200)
            .ended(TerminationStatus::Completed, 20)
            .build(),
    );
    env.insert(
        JobRunBuilder::new("report", "1")
            .ended(TerminationStatus::Stopped, 5)
            .build(),
    );
    env.create("backup", "live");

    let runs = env.read_history_runs(&taro::criteria::RunCriteria::all(), usize::MAX).await?;
    let all = stats::job_stats(&runs, chrono::Utc::now());
    assert_eq!(all.len(), 2);
    let backup = &all[0];
    assert_eq!(backup.job_id, "backup");
    assert_eq!(backup.count, 3);
    assert_eq!(backup.average, chrono::Duration::seconds(20));
    assert_eq!(backup.slowest, chrono::Duration::seconds(30));
    assert_eq!(backup.last_time, chrono::Duration::seconds(20));
    assert_eq!(backup.last_status, Some(TerminationStatus::Completed));
    assert_eq!(backup.faults, 1);
    assert_eq!(backup.warnings, 1);
    assert_eq!(all[1].faults, 0);

    let mut out = Vec::new();
    stats::run(&ctx, &patterns(&["backup"]), &mut out).await?;
    let printed = text(out);
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 2, "{printed}");
    assert!(lines[0].starts_with("JOB ID"));
    assert!(lines[0].contains("LAST STATUS"));
    assert!(lines[1].starts_with("backup"));
    assert!(lines[1].contains("00:00:20"));
    assert!(lines[1].contains("00:00:30"));
    assert!(lines[1].contains("COMPLETED"));
    Ok(())
}

#[tokio::test]
async fn stats_without_history_says_so() -> TestResult {
    let (env, ctx) = setup();
    env.create("job", "1");
    let mut out = Vec::new();
    stats::run(&ctx, &patterns(&[]), &mut out).await?;
    assert_eq!(text(out).trim(), "No ended runs");
    Ok(())
}

#[tokio::test]
async fn instance_shows_selected_run_detail() -> TestResult {
    let (env, ctx) = setup();
    let first = env.create("job", "1").instance_id;
    env.start(&first);
    env.enter_phase(&first, "gate", Some(ControlPoint::Approval));
    env.update_status(&first, "waiting for gate");

    let mut out = Vec::new();
    let args = InstanceArgs {
        pattern: "job".to_string(),
        index: 0,
    };
    let detail = instance::run(&ctx, &args, &mut out).await?;
    let printed = text(out);

    assert!(matches!(detail, DetailView::Live(ref i) if i.id() == &first));
    assert!(printed.starts_with("job@1\n"), "{printed}");
    assert!(printed.contains("phase gate: CREATED (waiting for approval)"), "{printed}");
    assert!(printed.contains("status:  waiting for gate"), "{printed}");

    let err = instance::run(
        &ctx,
        &InstanceArgs {
            pattern: "job".to_string(),
            index: 5,
        },
        &mut Vec::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TaroError::InstanceNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn detail_of_run_ended_after_selection_is_unavailable() -> TestResult {
    let (env, _ctx) = setup();
    let run_id = env.create("job", "1").instance_id;

    env.end(&run_id, TerminationStatus::Completed);
    let detail = open_detail(env.as_ref(), &run_id).await?;

    assert_eq!(detail, DetailView::Unavailable(run_id));
    Ok(())
}

#[test]
fn env_prints_selected_or_all_environments() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_memory_env("local")
        .with_memory_env("prod")
        .default_env("prod")
        .build();

    let mut out = Vec::new();
    env::run(&cfg, None, &EnvArgs { all: false }, &mut out)?;
    let printed = text(out);
    assert!(printed.starts_with("default_env = \"prod\""));
    assert!(printed.contains("[env.prod]"));
    assert!(!printed.contains("[env.local]"));

    let mut out = Vec::new();
    env::run(&cfg, None, &EnvArgs { all: true }, &mut out)?;
    assert!(text(out).contains("[env.local]"));

    let err = env::run(&cfg, Some("staging"), &EnvArgs { all: false }, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, TaroError::EnvironmentNotFound(_)));
    Ok(())
}
