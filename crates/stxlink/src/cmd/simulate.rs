use std::time::Duration;

use serde::Serialize;
use stxlink_channel::{ChannelConfig, FaultPlan};
use stxlink_link::{
    ClockDeadline, Deadline, FrameLog, Link, LinkConfig, LinkError, LinkStats, SendReport,
    StepDeadline,
};
use tracing::info;

use crate::cmd::SimulateArgs;
use crate::exit::{link_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct MessageOutput {
    index: u32,
    status: &'static str,
    attempts: u32,
    steps: u64,
    delivered: bool,
}

#[derive(Serialize)]
struct SimulateOutput {
    messages: Vec<MessageOutput>,
    stats: LinkStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let deadline: Box<dyn Deadline> = match &args.timeout {
        Some(timeout) => Box::new(ClockDeadline::new(parse_duration(timeout)?)),
        None => Box::new(StepDeadline::new(args.timeout_steps)),
    };
    let config = link_config(&args);
    let mut link = Link::with_config(FrameLog::new(), deadline, config);

    let (messages, failure) = send_messages(&mut link, &payload, args.count);

    let stats = link.stats();
    info!(
        sent = messages.len(),
        retransmissions = stats.retransmissions,
        "simulation finished"
    );

    let out = SimulateOutput {
        messages,
        stats,
        error: failure.as_ref().map(ToString::to_string),
    };
    print_simulation(&out, format);

    match failure {
        Some(err) => Err(link_error("simulation failed", err)),
        None => Ok(SUCCESS),
    }
}

/// Send `payload` up to `count` times, stopping at the first failure.
///
/// Attempts and delivery are read from the link counters around each
/// transfer, so a failed message still reports what reached the receiver.
fn send_messages<D: Deadline>(
    link: &mut Link<FrameLog, D>,
    payload: &[u8],
    count: u32,
) -> (Vec<MessageOutput>, Option<LinkError>) {
    let mut messages = Vec::new();
    for index in 0..count {
        let before = link.stats();
        let result = link.transfer(payload.to_vec());
        let after = link.stats();
        let delivered = after.frames_delivered > before.frames_delivered;

        match result {
            Ok(report) => messages.push(acked(index, report, delivered)),
            Err(err) => {
                messages.push(MessageOutput {
                    index,
                    status: failure_status(&err),
                    attempts: (after.frames_sent - before.frames_sent) as u32,
                    steps: link.steps(),
                    delivered,
                });
                return (messages, Some(err));
            }
        }
    }
    (messages, None)
}

fn link_config(args: &SimulateArgs) -> LinkConfig {
    let frame = args.checksum.frame_config();
    LinkConfig {
        frame,
        channel: ChannelConfig {
            faults: FaultPlan {
                drop_forward_every: args.drop_every,
                corrupt_forward_every: args.corrupt_every,
                drop_reverse_every: args.drop_ack_every,
            },
            ..ChannelConfig::default()
        },
        max_retries: Some(args.max_retries),
        max_steps: args.max_steps,
    }
}

fn acked(index: u32, report: SendReport, delivered: bool) -> MessageOutput {
    MessageOutput {
        index,
        status: "acked",
        attempts: report.attempts,
        steps: report.steps,
        delivered,
    }
}

fn failure_status(err: &LinkError) -> &'static str {
    match err {
        LinkError::RetriesExhausted { .. } => "retries-exhausted",
        LinkError::StepLimit(_) => "step-limit",
        _ => "failed",
    }
}

fn print_simulation(out: &SimulateOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let rows = out.messages.iter().map(|m| {
                vec![
                    m.index.to_string(),
                    m.status.to_string(),
                    m.attempts.to_string(),
                    m.steps.to_string(),
                    m.delivered.to_string(),
                ]
            });
            print_table(["#", "STATUS", "ATTEMPTS", "STEPS", "DELIVERED"], rows);
            print_fields(&out.stats);
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for m in &out.messages {
                println!(
                    "message={} status={} attempts={} steps={} delivered={}",
                    m.index, m.status, m.attempts, m.steps, m.delivered
                );
            }
            let s = &out.stats;
            println!(
                "sent={} retransmissions={} timeouts={} dropped={} corrupted={} rejected={}",
                s.frames_sent,
                s.retransmissions,
                s.timeouts,
                s.dropped,
                s.corrupted,
                s.frames_rejected
            );
        }
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{ChecksumArg, PayloadArgs};

    fn args() -> SimulateArgs {
        SimulateArgs {
            payload: PayloadArgs {
                data: Some("hi".to_string()),
                hex: None,
                file: None,
            },
            count: 1,
            drop_every: Some(2),
            corrupt_every: None,
            drop_ack_every: Some(3),
            timeout_steps: 4,
            timeout: None,
            max_retries: 5,
            max_steps: Some(100),
            checksum: ChecksumArg::Xor,
        }
    }

    #[test]
    fn link_config_carries_faults_and_limits() {
        let config = link_config(&args());
        assert_eq!(config.channel.faults.drop_forward_every, Some(2));
        assert_eq!(config.channel.faults.drop_reverse_every, Some(3));
        assert_eq!(config.channel.faults.corrupt_forward_every, None);
        assert_eq!(config.max_retries, Some(5));
        assert_eq!(config.max_steps, Some(100));
    }

    #[test]
    fn delivery_is_tracked_per_message() {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    drop_reverse_every: Some(2),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_retries: Some(0),
            ..LinkConfig::default()
        };
        let mut link = Link::with_config(FrameLog::new(), StepDeadline::new(4), config);

        let (messages, failure) = send_messages(&mut link, b"hi", 3);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].status, "acked");
        assert!(messages[0].delivered);
        assert_eq!(messages[1].status, "retries-exhausted");
        assert_eq!(messages[1].attempts, 1);
        assert!(messages[1].delivered);
        assert!(matches!(
            failure,
            Some(LinkError::RetriesExhausted { attempts: 1 })
        ));
    }

    #[test]
    fn corrupted_message_is_resent_and_delivered() {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    corrupt_forward_every: Some(2),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_retries: Some(1),
            ..LinkConfig::default()
        };
        let mut link = Link::with_config(FrameLog::new(), StepDeadline::new(4), config);

        let (messages, failure) = send_messages(&mut link, b"hi", 2);
        assert!(failure.is_none());
        assert!(messages[0].delivered);
        assert_eq!(messages[1].attempts, 2);
        assert!(messages[1].delivered);
        assert_eq!(link.stats().frames_delivered, 2);
    }

    #[test]
    fn huge_count_stops_at_first_failure() {
        let config = LinkConfig {
            channel: ChannelConfig {
                faults: FaultPlan {
                    drop_forward_every: Some(1),
                    ..FaultPlan::default()
                },
                ..ChannelConfig::default()
            },
            max_retries: Some(0),
            ..LinkConfig::default()
        };
        let mut link = Link::with_config(FrameLog::new(), StepDeadline::new(1), config);

        let (messages, failure) = send_messages(&mut link, b"hi", u32::MAX);
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].delivered);
        assert_eq!(messages[0].attempts, 1);
        assert!(failure.is_some());
    }

    #[test]
    fn failure_status_names() {
        assert_eq!(
            failure_status(&LinkError::RetriesExhausted { attempts: 2 }),
            "retries-exhausted"
        );
        assert_eq!(failure_status(&LinkError::StepLimit(5)), "step-limit");
        assert_eq!(failure_status(&LinkError::SendInProgress), "failed");
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
