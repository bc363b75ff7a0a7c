//! Consumer side: the cooperative UI loop on the main thread.

use crate::error::SurfaceError;
use crate::input::{ClearPolicy, InputAction, InputBuffer, KeyInput};
use crate::outbound::RecordReceiver;
use crate::record::ChatRecord;
use crate::session::OutgoingSender;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

pub const PROMPT: &str = "Type your message (Enter to send):";
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);
const FEED_STOPPED_NOTE: &str = "chat feed stopped (see log); Esc to quit";

/// Render and keyboard capability the UI loop drives. Every call must
/// return without waiting on the user.
pub trait ChatSurface {
    fn draw_input(&mut self, prompt: &str, buffer: &str) -> Result<(), SurfaceError>;
    fn append_line(&mut self, record: &ChatRecord) -> Result<(), SurfaceError>;
    fn set_status(&mut self, status: Option<String>) -> Result<(), SurfaceError>;
    fn refresh(&mut self) -> Result<(), SurfaceError>;
    fn poll_key(&mut self) -> Result<Option<KeyInput>, SurfaceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    pub tick_interval: Duration,
    pub clear_policy: ClearPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            clear_policy: ClearPolicy::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    Quit,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub ticks: u64,
    pub rendered: u64,
    pub sent: u64,
    pub send_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    pub exit: ConsumerExit,
    pub stats: ConsumerStats,
}

pub struct ConsumerLoop {
    config: ConsumerConfig,
    receiver: RecordReceiver,
    buffer: InputBuffer,
    feed_stopped: bool,
    stats: ConsumerStats,
}

impl ConsumerLoop {
    pub fn new(config: ConsumerConfig, receiver: RecordReceiver) -> Self {
        Self {
            config,
            receiver,
            buffer: InputBuffer::new(),
            feed_stopped: false,
            stats: ConsumerStats::default(),
        }
    }

    pub fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    pub async fn run<S, O>(
        mut self,
        surface: &mut S,
        sender: &O,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<ConsumerReport, SurfaceError>
    where
        S: ChatSurface,
        O: OutgoingSender + ?Sized,
    {
        let period = self.config.tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(event = "ui_start", tick_ms = period.as_millis() as u64);

        let exit = loop {
            if *shutdown.borrow() {
                break ConsumerExit::Stopped;
            }
            if self.tick(surface, sender).await? == TickOutcome::Quit {
                break ConsumerExit::Quit;
            }
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break ConsumerExit::Stopped,
                _ = ticker.tick() => {}
            }
        };

        info!(
            event = "ui_stop",
            exit = ?exit,
            rendered = self.stats.rendered,
            sent = self.stats.sent,
            send_failures = self.stats.send_failures
        );
        Ok(ConsumerReport {
            exit,
            stats: self.stats,
        })
    }

    /// One pass: input region, at most one key, everything queued, refresh.
    pub async fn tick<S, O>(
        &mut self,
        surface: &mut S,
        sender: &O,
    ) -> Result<TickOutcome, SurfaceError>
    where
        S: ChatSurface,
        O: OutgoingSender + ?Sized,
    {
        self.stats.ticks += 1;
        surface.draw_input(PROMPT, self.buffer.as_str())?;

        if let Some(key) = surface.poll_key()? {
            match self.buffer.apply(key) {
                InputAction::Quit => return Ok(TickOutcome::Quit),
                InputAction::Send(text) => {
                    self.submit(sender, &text).await;
                    surface.draw_input(PROMPT, self.buffer.as_str())?;
                }
                InputAction::Edited => surface.draw_input(PROMPT, self.buffer.as_str())?,
                InputAction::None => {}
            }
        }

        let drain = self.receiver.drain();
        for record in &drain.records {
            surface.append_line(record)?;
            self.stats.rendered += 1;
        }
        if drain.disconnected && !self.feed_stopped {
            self.feed_stopped = true;
            warn!(event = "feed_disconnected");
            surface.set_status(Some(FEED_STOPPED_NOTE.to_string()))?;
        }

        surface.refresh()?;
        Ok(TickOutcome::Continue)
    }

    async fn submit<O>(&mut self, sender: &O, text: &str)
    where
        O: OutgoingSender + ?Sized,
    {
        match sender.send_outgoing(text).await {
            Ok(()) => {
                self.stats.sent += 1;
                info!(event = "message_sent", chars = text.chars().count());
                self.buffer.clear();
            }
            Err(err) => {
                self.stats.send_failures += 1;
                warn!(event = "message_send_failed", error = %err);
                if self.config.clear_policy == ClearPolicy::Always {
                    self.buffer.clear();
                }
            }
        }
    }
}
