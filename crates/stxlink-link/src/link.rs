use bytes::Bytes;
use serde::Serialize;
use stxlink_channel::{Channel, Direction};
use stxlink_frame::ACK;
use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::receiver::{FrameSink, ReceiverTask};
use crate::timer::Deadline;
use crate::transmitter::{SendHandle, Transmitter, TxState, TxStatus};

/// Counters accumulated over the life of a [`Link`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub sends_completed: u64,
    /// Frame publishes, first attempts and retransmissions alike.
    pub frames_sent: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub acks_received: u64,
    pub frames_delivered: u64,
    pub frames_rejected: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub overwrites: u64,
}

/// Outcome of one acknowledged send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub handle: u64,
    pub payload_len: usize,
    pub frame_len: usize,
    pub attempts: u32,
    pub steps: u64,
}

/// Cooperative driver for one transmitter and one receiver over a shared
/// [`Channel`].
///
/// Each call to [`Link::step`] runs one scheduling round:
/// 1. Step the transmitter; arm the deadline whenever it publishes.
/// 2. Step the receiver task.
/// 3. Relay an `ACK` from the reverse slot to the transmitter.
/// 4. Poll the deadline and raise the transmitter's timeout on expiry.
///
/// The retry ceiling in [`LinkConfig::max_retries`] is enforced here, never
/// inside the transmitter.
#[derive(Debug)]
pub struct Link<S, D> {
    channel: Channel,
    tx: Transmitter,
    rx: ReceiverTask<S>,
    deadline: D,
    config: LinkConfig,
    stats: LinkStats,
    steps: u64,
}

impl<S: FrameSink, D: Deadline> Link<S, D> {
    /// Create a link with default configuration.
    pub fn new(sink: S, deadline: D) -> Self {
        Self::with_config(sink, deadline, LinkConfig::default())
    }

    /// Create a link with explicit configuration.
    pub fn with_config(sink: S, deadline: D, config: LinkConfig) -> Self {
        Self {
            channel: Channel::with_config(config.channel),
            tx: Transmitter::with_config(config.frame),
            rx: ReceiverTask::with_config(sink, config.frame),
            deadline,
            config,
            stats: LinkStats::default(),
            steps: 0,
        }
    }

    /// Queue a payload on the transmitter.
    pub fn send(&mut self, payload: impl Into<Bytes>) -> Result<SendHandle> {
        let handle = self.tx.send(payload)?;
        self.deadline.disarm();
        self.steps = 0;
        Ok(handle)
    }

    /// Run one scheduling round.
    pub fn step(&mut self) -> Result<TxStatus> {
        self.steps += 1;

        let was_waiting = self.tx.state() == TxState::FrameSent;
        let attempts = self.tx.attempts();
        let status = self.tx.step(&mut self.channel)?;

        if status == TxStatus::Completed {
            if was_waiting {
                self.stats.sends_completed += 1;
                self.deadline.disarm();
            }
            return Ok(status);
        }

        if self.tx.attempts() != attempts {
            self.deadline.arm();
            self.stats.frames_sent += 1;
            if self.tx.attempts() > 1 {
                self.stats.retransmissions += 1;
            }
        }

        self.stats.frames_delivered += self.rx.step(&mut self.channel)? as u64;

        if let Some(reply) = self.channel.take(Direction::Reverse) {
            if reply.first() == Some(&ACK) {
                self.stats.acks_received += 1;
                self.tx.notify_ack();
            } else {
                debug!(len = reply.len(), "ignored non-ack reply");
            }
        }

        if self.tx.state() == TxState::FrameSent
            && !self.tx.ack_pending()
            && self.deadline.expired()
        {
            let attempts = self.tx.attempts();
            if let Some(max) = self.config.max_retries {
                if attempts.saturating_sub(1) >= max {
                    warn!(
                        handle = self.tx.handle().map(SendHandle::id),
                        attempts, "retries exhausted"
                    );
                    self.deadline.disarm();
                    self.tx.reset();
                    return Err(LinkError::RetriesExhausted { attempts });
                }
            }
            debug!(attempts, "ack deadline expired");
            self.stats.timeouts += 1;
            self.tx.notify_timeout();
        }

        Ok(TxStatus::Running)
    }

    /// Step until the queued payload is acknowledged.
    ///
    /// Between rounds spent waiting on an `ACK` the deadline's
    /// [`Deadline::idle`] hook runs, so a wall-clock deadline sleeps rather
    /// than spinning.
    ///
    /// Fails with [`LinkError::StepLimit`] once [`LinkConfig::max_steps`]
    /// rounds have run for this send. The payload is then discarded and the
    /// link accepts a new send, as after [`LinkError::RetriesExhausted`].
    pub fn run_to_completion(&mut self) -> Result<SendReport> {
        let handle = self.tx.handle().ok_or(LinkError::NothingToSend)?;
        let payload_len = self.tx.payload().map_or(0, Bytes::len);
        let frame_len = self.tx.frame().map_or(0, Bytes::len);

        loop {
            if let Some(limit) = self.config.max_steps {
                if self.steps >= limit {
                    warn!(handle = handle.id(), steps = self.steps, "step limit reached");
                    self.deadline.disarm();
                    self.tx.reset();
                    return Err(LinkError::StepLimit(limit));
                }
            }
            if self.step()? == TxStatus::Completed {
                break;
            }
            if self.tx.state() == TxState::FrameSent && !self.tx.ack_pending() {
                self.deadline.idle();
            }
        }

        Ok(SendReport {
            handle: handle.id(),
            payload_len,
            frame_len,
            attempts: self.tx.attempts(),
            steps: self.steps,
        })
    }

    /// Queue a payload and step until it is acknowledged.
    pub fn transfer(&mut self, payload: impl Into<Bytes>) -> Result<SendReport> {
        self.send(payload)?;
        self.run_to_completion()
    }

    /// Counters for this link, including channel and receiver totals.
    pub fn stats(&self) -> LinkStats {
        let channel = self.channel.stats();
        LinkStats {
            frames_rejected: self.rx.receiver().stats().frames_rejected,
            dropped: channel.dropped,
            corrupted: channel.corrupted,
            overwrites: channel.overwrites,
            ..self.stats
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.tx
    }

    pub fn receiver_task(&self) -> &ReceiverTask<S> {
        &self.rx
    }

    pub fn sink(&self) -> &S {
        self.rx.sink()
    }

    pub fn deadline(&self) -> &D {
        &self.deadline
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Rounds run since the last [`Link::send`].
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::FrameLog;
    use crate::timer::StepDeadline;
    use stxlink_channel::{ChannelConfig, FaultPlan};

    fn link_with(faults: FaultPlan, max_retries: Option<u32>) -> Link<FrameLog, StepDeadline> {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults,
                ..ChannelConfig::default()
            },
            max_retries,
            ..LinkConfig::default()
        };
        Link::with_config(FrameLog::new(), StepDeadline::new(2), config)
    }

    #[test]
    fn clean_send_completes_in_two_rounds() {
        let mut link = Link::new(FrameLog::new(), StepDeadline::default());
        link.send(vec![0x11u8, 0x22, 0x33]).unwrap();

        let report = link.run_to_completion().unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.steps, 2);
        assert_eq!(report.payload_len, 3);
        assert_eq!(report.frame_len, 7);
        assert_eq!(link.sink().frames()[0].as_ref(), &[0x11, 0x22, 0x33]);

        let stats = link.stats();
        assert_eq!(stats.sends_completed, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.acks_received, 1);
        assert_eq!(stats.timeouts, 0);
    }

    #[test]
    fn dropped_frame_is_retransmitted() {
        let mut link = link_with(
            FaultPlan {
                drop_forward_every: Some(2),
                ..FaultPlan::default()
            },
            None,
        );

        link.transfer(&b"first"[..]).unwrap();
        let report = link.transfer(&b"second"[..]).unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(link.sink().len(), 2);
        let stats = link.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.retransmissions, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn corrupted_frame_is_rejected_then_resent() {
        let mut link = link_with(
            FaultPlan {
                corrupt_forward_every: Some(1),
                ..FaultPlan::default()
            },
            Some(3),
        );

        let err = link.transfer(vec![0x11u8, 0x22, 0x33]).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 4 }));

        let stats = link.stats();
        assert_eq!(stats.corrupted, 4);
        assert_eq!(stats.frames_rejected, 4);
        assert_eq!(stats.frames_delivered, 0);
        assert!(link.sink().is_empty());
    }

    #[test]
    fn lost_ack_delivers_duplicate() {
        let mut link = link_with(
            FaultPlan {
                drop_reverse_every: Some(1),
                ..FaultPlan::default()
            },
            Some(1),
        );

        let err = link.transfer(&b"dup"[..]).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 2 }));
        assert_eq!(link.sink().len(), 2);
        assert_eq!(link.stats().acks_received, 0);
    }

    #[test]
    fn exhausted_link_accepts_new_send() {
        let mut link = link_with(
            FaultPlan {
                drop_forward_every: Some(1),
                ..FaultPlan::default()
            },
            Some(0),
        );

        let err = link.transfer(&b"x"[..]).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 1 }));
        assert_eq!(link.transmitter().state(), TxState::Idle);
        link.send(&b"y"[..]).unwrap();
    }

    #[test]
    fn step_limit_stops_unbounded_retries() {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    drop_forward_every: Some(1),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_steps: Some(10),
            ..LinkConfig::default()
        };
        let mut link = Link::with_config(FrameLog::new(), StepDeadline::new(2), config);

        let err = link.transfer(&b"lost"[..]).unwrap_err();
        assert!(matches!(err, LinkError::StepLimit(10)));
        assert_eq!(link.steps(), 10);
        assert!(link.stats().retransmissions > 0);
    }

    #[test]
    fn link_accepts_new_send_after_step_limit() {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    drop_forward_every: Some(2),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_steps: Some(1),
            ..LinkConfig::default()
        };
        let mut link = Link::with_config(FrameLog::new(), StepDeadline::new(2), config);

        let err = link.transfer(&b"slow"[..]).unwrap_err();
        assert!(matches!(err, LinkError::StepLimit(1)));
        assert_eq!(link.transmitter().state(), TxState::Idle);
        assert!(!link.deadline().is_armed());

        link.send(&b"next"[..]).unwrap();
        assert_eq!(link.steps(), 0);
        assert!(matches!(
            link.run_to_completion(),
            Err(LinkError::StepLimit(1))
        ));
    }

    #[test]
    fn clock_deadline_waits_instead_of_spinning() {
        use crate::timer::ClockDeadline;
        use std::time::Duration;

        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    drop_forward_every: Some(1),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_retries: Some(1),
            ..LinkConfig::default()
        };
        let deadline =
            ClockDeadline::with_poll_interval(Duration::from_millis(20), Duration::from_millis(20));
        let mut link = Link::with_config(FrameLog::new(), deadline, config);

        let err = link.transfer(&b"slow"[..]).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 2 }));
        // Each wait is one sleep to expiry plus the round that notices it.
        assert!(link.steps() <= 8, "spun for {} rounds", link.steps());
    }

    #[test]
    fn run_without_send_fails() {
        let mut link = Link::new(FrameLog::new(), StepDeadline::default());
        assert!(matches!(
            link.run_to_completion(),
            Err(LinkError::NothingToSend)
        ));
    }

    #[test]
    fn invalid_payload_is_rejected_up_front() {
        let mut link = Link::new(FrameLog::new(), StepDeadline::default());
        let err = link.send(Vec::<u8>::new()).unwrap_err();
        assert!(err.is_invalid_param());
        assert_eq!(link.channel().stats().forward_publishes, 0);
    }

    #[test]
    fn stats_serialize_to_json() {
        let mut link = Link::new(FrameLog::new(), StepDeadline::default());
        let report = link.transfer(&b"json"[..]).unwrap();

        let value = serde_json::to_value(link.stats()).unwrap();
        assert_eq!(value["sends_completed"], 1);
        assert_eq!(value["frames_delivered"], 1);

        let value = serde_json::to_value(report).unwrap();
        assert_eq!(value["attempts"], 1);
        assert_eq!(value["frame_len"], 8);
    }
}
