use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;

use stxlink_frame::{ChecksumKind, FrameConfig};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a payload and print the wire bytes.
    Encode(EncodeArgs),
    /// Parse a byte stream and print every valid frame.
    Decode(DecodeArgs),
    /// Run the acknowledged link over an in-memory channel.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChecksumArg {
    /// XOR of every payload byte.
    #[default]
    Xor,
    /// Wrapping sum of every payload byte.
    Sum,
}

impl From<ChecksumArg> for ChecksumKind {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Xor => ChecksumKind::Xor,
            ChecksumArg::Sum => ChecksumKind::Sum,
        }
    }
}

impl ChecksumArg {
    pub fn frame_config(self) -> FrameConfig {
        FrameConfig {
            checksum: self.into(),
            ..FrameConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload as hex digits (e.g. "11 22 33" or "0x11,0x22").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(hex) = &self.hex {
            return parse_hex(hex);
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Err(CliError::new(
            USAGE,
            "a payload is required (--data, --hex or --file)",
        ))
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Checksum fold.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex digits.
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read wire bytes from file. Stdin is read when neither input is given.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Checksum fold.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Number of times to send the payload.
    #[arg(long, default_value = "1")]
    pub count: u32,
    /// Drop every n-th frame.
    #[arg(long, value_name = "N", env = "STXLINK_DROP_EVERY")]
    pub drop_every: Option<u32>,
    /// Corrupt one byte of every n-th frame.
    #[arg(long, value_name = "N", env = "STXLINK_CORRUPT_EVERY")]
    pub corrupt_every: Option<u32>,
    /// Drop every n-th acknowledgement.
    #[arg(long, value_name = "N", env = "STXLINK_DROP_ACK_EVERY")]
    pub drop_ack_every: Option<u32>,
    /// Scheduling rounds to wait for an acknowledgement.
    #[arg(long, value_name = "STEPS", default_value = "4", conflicts_with = "timeout")]
    pub timeout_steps: u32,
    /// Wall-clock acknowledgement timeout (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
    /// Retransmissions allowed per message.
    #[arg(long, value_name = "N", default_value = "8", env = "STXLINK_MAX_RETRIES")]
    pub max_retries: u32,
    /// Scheduling rounds allowed per message.
    #[arg(long, value_name = "STEPS")]
    pub max_steps: Option<u64>,
    /// Checksum fold.
    #[arg(long, value_enum, default_value_t)]
    pub checksum: ChecksumArg,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex digits separated by whitespace, commas or colons. A `0x`
/// prefix on any group is ignored.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut digits = String::with_capacity(input.len());
    for group in input.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        let group = group
            .strip_prefix("0x")
            .or_else(|| group.strip_prefix("0X"))
            .unwrap_or(group);
        digits.push_str(group);
    }

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CliError::new(USAGE, format!("invalid hex input: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits: {input}"),
        ));
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex input: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_common_separators() {
        assert_eq!(parse_hex("11 22 33").unwrap(), vec![0x11, 0x22, 0x33]);
        assert_eq!(parse_hex("0x11,0x22").unwrap(), vec![0x11, 0x22]);
        assert_eq!(parse_hex("de:ad:BE:ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex("020311").unwrap(), vec![0x02, 0x03, 0x11]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("123").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("+f").unwrap_err().code, USAGE);
    }

    #[test]
    fn missing_payload_is_usage_error() {
        let args = PayloadArgs {
            data: None,
            hex: None,
            file: None,
        };
        assert_eq!(args.resolve().unwrap_err().code, USAGE);
    }

    #[test]
    fn checksum_arg_selects_fold() {
        assert_eq!(ChecksumArg::Sum.frame_config().checksum, ChecksumKind::Sum);
        assert_eq!(ChecksumArg::default().frame_config(), FrameConfig::default());
    }
}
