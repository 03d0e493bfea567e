use clap::Subcommand;
use kidtimer_core::{
    CategoryId, ChildId, Clock, Config, Event, SystemClock, TimerMode, TimerOrchestrator,
    TimerService, VisualizationMode,
};
use tracing::debug;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a timer for a child, replacing any timer it already has
    Start {
        /// Child id or name
        child: String,
        /// Category id or name
        category: String,
        /// Countdown length; defaults to the category's recommendation,
        /// then to `timer.default_duration_min`
        #[arg(long)]
        minutes: Option<u64>,
        /// Count up instead of down
        #[arg(long, conflicts_with = "minutes")]
        stopwatch: bool,
    },
    /// Pause a running timer
    Pause { child: String },
    /// Resume a paused timer
    Resume { child: String },
    /// Stop a timer and cancel its alerts
    Stop { child: String },
    /// Add minutes to a countdown (negative to remove)
    Add {
        child: String,
        #[arg(allow_hyphen_values = true)]
        minutes: i64,
    },
    /// Change how the UI renders a child's timer
    Visual {
        child: String,
        mode: String,
    },
    /// Print timer state as JSON
    Status {
        /// Only this child
        child: Option<String>,
    },
    /// Drive the tick loop and stream events until Ctrl-C
    Watch,
    /// Persist every timer as if the app moved to the background
    Background,
    /// List unacknowledged completions, oldest first
    Completed,
    /// Acknowledge completions (the oldest one, or all of a child's)
    Dismiss { child: Option<String> },
    /// Print the restoration notice raised by this launch, if any
    Restored,
    /// Clear the restoration notice
    AckRestore,
    /// Record a start request for the next foreground launch
    QueueStart { child: String, category: String },
    /// Take the pending start request if it is still fresh
    ConsumeStart,
}

fn resolve_child(config: &Config, needle: &str) -> Result<ChildId, String> {
    config
        .find_child(needle)
        .map(|c| c.id)
        .ok_or_else(|| format!("unknown child: {needle}"))
}

fn resolve_category(config: &Config, needle: &str) -> Result<(CategoryId, u64), String> {
    config
        .find_category(needle)
        .map(|c| (c.id, config.countdown_minutes(c)))
        .ok_or_else(|| format!("unknown category: {needle}"))
}

/// Every invocation is a launch: build, restore, then hand back.
fn launch(config: &Config) -> Result<TimerOrchestrator, Box<dyn std::error::Error>> {
    let mut orchestrator = TimerOrchestrator::from_config(config)?;
    let report = orchestrator.restore_on_launch();
    if !report.is_empty() {
        debug!(
            resumed = report.resumed.len(),
            finalized = report.finalized.len(),
            "restored on launch"
        );
    }
    Ok(orchestrator)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_state(orchestrator: &TimerOrchestrator, child_id: ChildId) -> Result<(), Box<dyn std::error::Error>> {
    match orchestrator.state_snapshot(child_id) {
        Some(event) => print_json(&event),
        None => print_json(&serde_json::json!({ "child_id": child_id, "state": "idle" })),
    }
}

fn ensure(applied: bool, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if applied {
        Ok(())
    } else {
        Err(format!("{what} rejected in the current timer state").into())
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut orchestrator = launch(&config)?;
    // Completions found here are logged by the orchestrator.
    orchestrator.tick();

    match action {
        TimerAction::Start {
            child,
            category,
            minutes,
            stopwatch,
        } => {
            let child_id = resolve_child(&config, &child)?;
            let (category_id, recommended) = resolve_category(&config, &category)?;
            let (mode, duration_ms) = if stopwatch {
                (TimerMode::Stopwatch, 0)
            } else {
                let minutes = minutes.unwrap_or(recommended);
                (TimerMode::Countdown, minutes.saturating_mul(60_000))
            };
            ensure(
                orchestrator.start_timer(child_id, category_id, mode, duration_ms),
                "start",
            )?;
            print_state(&orchestrator, child_id)?;
        }
        TimerAction::Pause { child } => {
            let child_id = resolve_child(&config, &child)?;
            ensure(orchestrator.pause_timer(child_id), "pause")?;
            print_state(&orchestrator, child_id)?;
        }
        TimerAction::Resume { child } => {
            let child_id = resolve_child(&config, &child)?;
            ensure(orchestrator.resume_timer(child_id), "resume")?;
            print_state(&orchestrator, child_id)?;
        }
        TimerAction::Stop { child } => {
            let child_id = resolve_child(&config, &child)?;
            // Stopping a child with no timer is not an error.
            orchestrator.stop_timer(child_id);
            print_state(&orchestrator, child_id)?;
        }
        TimerAction::Add { child, minutes } => {
            let child_id = resolve_child(&config, &child)?;
            ensure(
                orchestrator.add_time(child_id, minutes.saturating_mul(60_000)),
                "add time",
            )?;
            print_state(&orchestrator, child_id)?;
        }
        TimerAction::Visual { child, mode } => {
            let child_id = resolve_child(&config, &child)?;
            let mode: VisualizationMode =
                serde_json::from_value(serde_json::Value::String(mode.to_lowercase()))
                    .map_err(|_| {
                        let known: Vec<&str> = VisualizationMode::ALL
                            .iter()
                            .map(|m| m.as_str())
                            .collect();
                        format!("unknown visualization: {mode} (one of {})", known.join(", "))
                    })?;
            ensure(orchestrator.set_visualization(child_id, mode), "visualization")?;
            println!("{}", mode.display_name());
        }
        TimerAction::Status { child } => match child {
            Some(child) => print_state(&orchestrator, resolve_child(&config, &child)?)?,
            None => {
                let now = orchestrator.now_ms();
                let states: Vec<Event> = orchestrator
                    .timer_states()
                    .map(|t| Event::snapshot(t, now))
                    .collect();
                print_json(&states)?;
            }
        },
        TimerAction::Background => {
            let snapshot = orchestrator.persist_states_on_background();
            println!("persisted {} timer(s)", snapshot.timers.len());
        }
        TimerAction::Completed => print_json(&orchestrator.completed_timers())?,
        TimerAction::Dismiss { child: None } => match orchestrator.acknowledge_next_completed() {
            Some(record) => print_json(&record)?,
            None => println!("nothing to dismiss"),
        },
        TimerAction::Dismiss { child: Some(child) } => {
            let child_id = resolve_child(&config, &child)?;
            if !orchestrator.dismiss_completed(child_id) {
                println!("nothing to dismiss");
            }
        }
        TimerAction::Restored => match orchestrator.take_restoration_notice() {
            Some(notice) => print_json(&notice)?,
            None => println!("null"),
        },
        TimerAction::AckRestore => {
            orchestrator.acknowledge_timer_restoration();
            println!("ok");
        }
        TimerAction::QueueStart { child, category } => {
            let child_id = resolve_child(&config, &child)?;
            let (category_id, _) = resolve_category(&config, &category)?;
            orchestrator.queue_pending_start(child_id, category_id);
            println!("ok");
        }
        TimerAction::ConsumeStart => match orchestrator.consume_pending_start() {
            Some(pending) => print_json(&pending)?,
            None => println!("null"),
        },
        TimerAction::Watch => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            // The service persists on its way out.
            return runtime.block_on(watch(orchestrator, &config));
        }
    }

    orchestrator.persist_states_on_background();
    Ok(())
}

async fn watch(
    orchestrator: TimerOrchestrator,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let children: Vec<ChildId> = config.children.iter().map(|c| c.id).collect();
    let (handle, task) = TimerService::spawn(orchestrator);
    let mut events = handle.subscribe();
    let mut ticker = tokio::time::interval(config.timer.tick_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                let now = SystemClock.now_ms();
                for &child_id in &children {
                    if let Some(timer) = handle.timer_state(child_id).await {
                        if timer.is_active() {
                            println!("{}", serde_json::to_string(&Event::snapshot(&timer, now))?);
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.enter_background().await;
    drop(handle);
    task.await?;
    Ok(())
}
