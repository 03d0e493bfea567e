//! Tokio actor around [`TimerOrchestrator`].
//!
//! One task owns the orchestrator. Commands arrive over an mpsc channel and
//! are applied in the order they were sent, so each child sees a single
//! writer; different children never wait on anything but that queue, and
//! every command is a handful of arithmetic plus at most one snapshot write.
//!
//! The tick driver skips missed ticks instead of bursting to catch up.
//! Between `EnterBackground` and `EnterForeground` it does not tick at all;
//! foregrounding reconciles once from wall-clock anchors.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{RestoreReport, TimerOrchestrator};
use crate::events::{CompletedTimerRecord, Event};
use crate::intent::{PendingTimerStart, RestorationNotice};
use crate::timer::{CategoryId, ChildId, ChildTimerState, TimerMode, VisualizationMode};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Messages understood by the timer task.
#[derive(Debug)]
pub enum TimerCommand {
    Start {
        child_id: ChildId,
        category_id: CategoryId,
        mode: TimerMode,
        duration_ms: u64,
        reply: oneshot::Sender<bool>,
    },
    Pause {
        child_id: ChildId,
        reply: oneshot::Sender<bool>,
    },
    Resume {
        child_id: ChildId,
        reply: oneshot::Sender<bool>,
    },
    Stop {
        child_id: ChildId,
        reply: oneshot::Sender<bool>,
    },
    AddTime {
        child_id: ChildId,
        delta_ms: i64,
        reply: oneshot::Sender<bool>,
    },
    SetVisualization {
        child_id: ChildId,
        mode: VisualizationMode,
        reply: oneshot::Sender<bool>,
    },
    GetState {
        child_id: ChildId,
        reply: oneshot::Sender<Option<ChildTimerState>>,
    },
    GetCompleted(oneshot::Sender<Vec<CompletedTimerRecord>>),
    AcknowledgeNextCompleted(oneshot::Sender<Option<CompletedTimerRecord>>),
    DismissCompleted {
        child_id: ChildId,
        reply: oneshot::Sender<bool>,
    },
    Restore(oneshot::Sender<RestoreReport>),
    TakeRestorationNotice(oneshot::Sender<Option<RestorationNotice>>),
    AcknowledgeRestoration,
    QueuePendingStart {
        child_id: ChildId,
        category_id: CategoryId,
    },
    ConsumePendingStart(oneshot::Sender<Option<PendingTimerStart>>),
    /// Reconcile immediately, outside the tick cadence.
    TickNow(oneshot::Sender<Vec<CompletedTimerRecord>>),
    /// Persist everything and stop ticking.
    EnterBackground(oneshot::Sender<()>),
    /// Resume ticking after a reconcile.
    EnterForeground(oneshot::Sender<Vec<CompletedTimerRecord>>),
}

pub struct TimerService {
    orchestrator: TimerOrchestrator,
    commands: mpsc::Receiver<TimerCommand>,
    tick_interval: Duration,
    suspended: bool,
}

impl TimerService {
    /// Spawn the timer task. The task ends, persisting on the way out, when
    /// every [`TimerHandle`] has been dropped; it hands the orchestrator
    /// back through the join handle.
    pub fn spawn(orchestrator: TimerOrchestrator) -> (TimerHandle, JoinHandle<TimerOrchestrator>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = TimerHandle {
            commands: tx,
            events: orchestrator.event_sender(),
        };
        let service = TimerService {
            tick_interval: orchestrator.config().tick_interval(),
            orchestrator,
            commands: rx,
            suspended: false,
        };
        (handle, tokio::spawn(service.run()))
    }

    async fn run(mut self) -> TimerOrchestrator {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "timer service started");
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle(command) {
                            ticker.reset();
                        }
                    }
                    None => break,
                },
                _ = ticker.tick(), if !self.suspended => {
                    self.orchestrator.tick();
                }
            }
        }

        self.orchestrator.persist_states_on_background();
        info!("timer service stopped");
        self.orchestrator
    }

    /// Apply one command. Returns true when the tick cadence should restart.
    fn handle(&mut self, command: TimerCommand) -> bool {
        let o = &mut self.orchestrator;
        match command {
            TimerCommand::Start {
                child_id,
                category_id,
                mode,
                duration_ms,
                reply,
            } => {
                let _ = reply.send(o.start_timer(child_id, category_id, mode, duration_ms));
            }
            TimerCommand::Pause { child_id, reply } => {
                let _ = reply.send(o.pause_timer(child_id));
            }
            TimerCommand::Resume { child_id, reply } => {
                let _ = reply.send(o.resume_timer(child_id));
            }
            TimerCommand::Stop { child_id, reply } => {
                let _ = reply.send(o.stop_timer(child_id));
            }
            TimerCommand::AddTime {
                child_id,
                delta_ms,
                reply,
            } => {
                let _ = reply.send(o.add_time(child_id, delta_ms));
            }
            TimerCommand::SetVisualization {
                child_id,
                mode,
                reply,
            } => {
                let _ = reply.send(o.set_visualization(child_id, mode));
            }
            TimerCommand::GetState { child_id, reply } => {
                let _ = reply.send(o.timer_state(child_id).cloned());
            }
            TimerCommand::GetCompleted(reply) => {
                let _ = reply.send(o.completed_timers());
            }
            TimerCommand::AcknowledgeNextCompleted(reply) => {
                let _ = reply.send(o.acknowledge_next_completed());
            }
            TimerCommand::DismissCompleted { child_id, reply } => {
                let _ = reply.send(o.dismiss_completed(child_id));
            }
            TimerCommand::Restore(reply) => {
                let _ = reply.send(o.restore_on_launch());
            }
            TimerCommand::TakeRestorationNotice(reply) => {
                let _ = reply.send(o.take_restoration_notice());
            }
            TimerCommand::AcknowledgeRestoration => o.acknowledge_timer_restoration(),
            TimerCommand::QueuePendingStart {
                child_id,
                category_id,
            } => o.queue_pending_start(child_id, category_id),
            TimerCommand::ConsumePendingStart(reply) => {
                let _ = reply.send(o.consume_pending_start());
            }
            TimerCommand::TickNow(reply) => {
                let _ = reply.send(o.tick());
            }
            TimerCommand::EnterBackground(reply) => {
                o.persist_states_on_background();
                self.suspended = true;
                debug!("tick driver suspended");
                let _ = reply.send(());
            }
            TimerCommand::EnterForeground(reply) => {
                let finished = o.tick();
                let was_suspended = std::mem::replace(&mut self.suspended, false);
                debug!(was_suspended, "tick driver resumed");
                let _ = reply.send(finished);
                return was_suspended;
            }
        }
        false
    }
}

/// Cloneable front door to the timer task.
///
/// Every method is a no-op (`false` / `None` / empty) once the task is gone.
#[derive(Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<TimerCommand>,
    events: broadcast::Sender<Event>,
}

impl TimerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    async fn request<T: Default>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TimerCommand,
    ) -> T {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(build(tx)).await.is_err() {
            return T::default();
        }
        rx.await.unwrap_or_default()
    }

    async fn send(&self, command: TimerCommand) {
        let _ = self.commands.send(command).await;
    }

    pub async fn start_timer(
        &self,
        child_id: ChildId,
        category_id: CategoryId,
        mode: TimerMode,
        duration_ms: u64,
    ) -> bool {
        self.request(|reply| TimerCommand::Start {
            child_id,
            category_id,
            mode,
            duration_ms,
            reply,
        })
        .await
    }

    pub async fn pause_timer(&self, child_id: ChildId) -> bool {
        self.request(|reply| TimerCommand::Pause { child_id, reply })
            .await
    }

    pub async fn resume_timer(&self, child_id: ChildId) -> bool {
        self.request(|reply| TimerCommand::Resume { child_id, reply })
            .await
    }

    pub async fn stop_timer(&self, child_id: ChildId) -> bool {
        self.request(|reply| TimerCommand::Stop { child_id, reply })
            .await
    }

    pub async fn add_time(&self, child_id: ChildId, delta_ms: i64) -> bool {
        self.request(|reply| TimerCommand::AddTime {
            child_id,
            delta_ms,
            reply,
        })
        .await
    }

    pub async fn set_visualization(&self, child_id: ChildId, mode: VisualizationMode) -> bool {
        self.request(|reply| TimerCommand::SetVisualization {
            child_id,
            mode,
            reply,
        })
        .await
    }

    pub async fn timer_state(&self, child_id: ChildId) -> Option<ChildTimerState> {
        self.request(|reply| TimerCommand::GetState { child_id, reply })
            .await
    }

    pub async fn completed_timers(&self) -> Vec<CompletedTimerRecord> {
        self.request(TimerCommand::GetCompleted).await
    }

    pub async fn acknowledge_next_completed(&self) -> Option<CompletedTimerRecord> {
        self.request(TimerCommand::AcknowledgeNextCompleted).await
    }

    pub async fn dismiss_completed(&self, child_id: ChildId) -> bool {
        self.request(|reply| TimerCommand::DismissCompleted { child_id, reply })
            .await
    }

    pub async fn restore_on_launch(&self) -> RestoreReport {
        self.request(TimerCommand::Restore).await
    }

    pub async fn take_restoration_notice(&self) -> Option<RestorationNotice> {
        self.request(TimerCommand::TakeRestorationNotice).await
    }

    pub async fn acknowledge_timer_restoration(&self) {
        self.send(TimerCommand::AcknowledgeRestoration).await;
    }

    pub async fn queue_pending_start(&self, child_id: ChildId, category_id: CategoryId) {
        self.send(TimerCommand::QueuePendingStart {
            child_id,
            category_id,
        })
        .await;
    }

    pub async fn consume_pending_start(&self) -> Option<PendingTimerStart> {
        self.request(TimerCommand::ConsumePendingStart).await
    }

    pub async fn tick_now(&self) -> Vec<CompletedTimerRecord> {
        self.request(TimerCommand::TickNow).await
    }

    pub async fn enter_background(&self) {
        self.request(TimerCommand::EnterBackground).await
    }

    pub async fn enter_foreground(&self) -> Vec<CompletedTimerRecord> {
        self.request(TimerCommand::EnterForeground).await
    }
}
