use stxlink_channel::ChannelConfig;
use stxlink_frame::FrameConfig;

/// Controls how a [`crate::Link`] is built and how long it keeps trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Framing shared by both ends.
    pub frame: FrameConfig,
    /// Channel capacity and injected faults.
    pub channel: ChannelConfig,
    /// Retransmissions allowed per send. `None` retries until acknowledged.
    pub max_retries: Option<u32>,
    /// Scheduling rounds allowed per send in `run_to_completion`. `None` is unbounded.
    pub max_steps: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            channel: ChannelConfig::default(),
            max_retries: None,
            max_steps: None,
        }
    }
}
