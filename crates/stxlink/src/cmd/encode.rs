use serde::Serialize;
use stxlink_frame::encode_with;
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{format_hex, print_fields, print_json, print_raw, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    checksum_kind: &'static str,
    checksum: String,
    payload_len: usize,
    frame_len: usize,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let config = args.checksum.frame_config();
    let frame = encode_with(&config, &payload).map_err(|err| frame_error("encode failed", err))?;
    debug!(payload_len = payload.len(), frame_len = frame.len(), "payload framed");

    let out = EncodeOutput {
        checksum_kind: config.checksum.as_str(),
        checksum: format!("{:#04x}", frame[frame.len() - 2]),
        payload_len: payload.len(),
        frame_len: frame.len(),
        frame: format_hex(&frame),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&out),
        OutputFormat::Pretty => println!("{}", out.frame),
        OutputFormat::Raw => print_raw(&frame),
    }

    Ok(SUCCESS)
}
