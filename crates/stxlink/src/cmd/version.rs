use serde::Serialize;
use stxlink_frame::{ChecksumKind, ACK, ETX, MAX_FRAME_SIZE, MAX_PAYLOAD, STX};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    max_payload: usize,
    max_frame: usize,
    control_bytes: String,
    default_checksum: &'static str,
    features: String,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("stxlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let out = VersionOutput {
        name: "stxlink",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("STXLINK_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("STXLINK_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        max_payload: MAX_PAYLOAD,
        max_frame: MAX_FRAME_SIZE,
        control_bytes: format!("stx={STX:#04x} etx={ETX:#04x} ack={ACK:#04x}"),
        default_checksum: ChecksumKind::default().as_str(),
        features: format!("link={}, cli=true", cfg!(feature = "link")),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&out),
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("name: {}", out.name);
            println!("version: {}", out.version);
            println!("target: {}", out.target);
            println!("profile: {}", out.profile);
            println!("rustc: {}", out.rustc);
            println!("git_hash: {}", out.git_hash);
            println!("max_payload: {}", out.max_payload);
            println!("max_frame: {}", out.max_frame);
            println!("control_bytes: {}", out.control_bytes);
            println!("default_checksum: {}", out.default_checksum);
            println!("features: {}", out.features);
        }
    }

    Ok(SUCCESS)
}
