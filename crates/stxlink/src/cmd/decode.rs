use std::fs::File;
use std::io::{Cursor, Read};

use serde::Serialize;
use stxlink_frame::{Frame, FrameConfig, FrameReader};
use tracing::{debug, warn};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{
    format_hex, payload_preview, print_json, print_raw, print_table, OutputFormat,
};

#[derive(Serialize)]
struct FrameOutput {
    index: usize,
    payload_size: usize,
    payload_hex: String,
    payload: String,
}

#[derive(Serialize)]
struct DecodeOutput {
    frames: Vec<FrameOutput>,
    rejected: u64,
    lengths_rejected: u64,
    bytes_discarded: u64,
}

struct Decoded {
    frames: Vec<Frame>,
    rejected: u64,
    lengths_rejected: u64,
    bytes_discarded: u64,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.checksum.frame_config();
    let decoded = if let Some(hex) = &args.hex {
        decode_stream(Cursor::new(parse_hex(hex)?), config)?
    } else if let Some(path) = &args.file {
        let file = File::open(path)
            .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
        decode_stream(file, config)?
    } else {
        decode_stream(std::io::stdin().lock(), config)?
    };

    print_decoded(&decoded, format);

    if decoded.frames.is_empty() && (decoded.rejected > 0 || decoded.lengths_rejected > 0) {
        warn!(rejected = decoded.rejected, "no valid frames in input");
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn decode_stream<R: Read>(input: R, config: FrameConfig) -> CliResult<Decoded> {
    let mut reader = FrameReader::with_config(input, config);
    let frames = reader
        .read_to_end()
        .map_err(|err| frame_error("read failed", err))?;
    let stats = reader.stats();
    debug!(
        frames = frames.len(),
        rejected = reader.rejected(),
        discarded = stats.bytes_discarded,
        "stream decoded"
    );

    Ok(Decoded {
        frames,
        rejected: reader.rejected(),
        lengths_rejected: stats.lengths_rejected,
        bytes_discarded: stats.bytes_discarded,
    })
}

fn print_decoded(decoded: &Decoded, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DecodeOutput {
                frames: decoded
                    .frames
                    .iter()
                    .enumerate()
                    .map(|(index, frame)| FrameOutput {
                        index,
                        payload_size: frame.payload.len(),
                        payload_hex: format_hex(&frame.payload),
                        payload: payload_preview(&frame.payload),
                    })
                    .collect(),
                rejected: decoded.rejected,
                lengths_rejected: decoded.lengths_rejected,
                bytes_discarded: decoded.bytes_discarded,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let rows = decoded.frames.iter().enumerate().map(|(index, frame)| {
                vec![
                    index.to_string(),
                    frame.payload.len().to_string(),
                    format_hex(&frame.payload),
                    payload_preview(&frame.payload),
                ]
            });
            print_table(["#", "SIZE", "HEX", "PAYLOAD"], rows);
            println!(
                "rejected={} lengths_rejected={} discarded={}",
                decoded.rejected, decoded.lengths_rejected, decoded.bytes_discarded
            );
        }
        OutputFormat::Pretty => {
            for (index, frame) in decoded.frames.iter().enumerate() {
                println!(
                    "frame={} size={} hex={} payload={}",
                    index,
                    frame.payload.len(),
                    format_hex(&frame.payload),
                    payload_preview(&frame.payload)
                );
            }
            println!(
                "rejected={} lengths_rejected={} discarded={}",
                decoded.rejected, decoded.lengths_rejected, decoded.bytes_discarded
            );
        }
        OutputFormat::Raw => {
            for frame in &decoded.frames {
                print_raw(&frame.payload);
            }
        }
    }
}
