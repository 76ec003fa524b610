//! Probe a headless driver and print what it negotiates.
//!
//! Run with:
//! ```sh
//! cargo run --example probe -- --core-max 3.3 --forward-max none --profile gl4
//! ```

use std::sync::Arc;

use clap::Parser;

use gl_context::platform::headless::{HeadlessConfig, HeadlessDevice, HeadlessLookup};
use gl_context::{
    ContextConfig, ContextFactory, ContextResult, GlProfile, GlVersion, LockPolicy,
    NegotiationPolicy, VersionRange,
};

// ============================================================================
// CLI
// ============================================================================

/// Drawable profile selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliProfile {
    /// GL 4 core.
    Gl4,
    /// GL 4 with backward compatibility.
    Gl4bc,
    /// GL 3 core.
    #[default]
    Gl3,
    /// GL 3 with backward compatibility.
    Gl3bc,
    /// Legacy GL 2.
    Gl2,
}

impl From<CliProfile> for GlProfile {
    fn from(cli: CliProfile) -> Self {
        match cli {
            CliProfile::Gl4 => GlProfile::Gl4,
            CliProfile::Gl4bc => GlProfile::Gl4bc,
            CliProfile::Gl3 => GlProfile::Gl3,
            CliProfile::Gl3bc => GlProfile::Gl3bc,
            CliProfile::Gl2 => GlProfile::Gl2,
        }
    }
}

/// Highest version a driver accepts for one profile, `None` if unsupported.
#[derive(Debug, Clone, Copy)]
struct DriverMax(Option<GlVersion>);

/// `M.m`, or `none` for a profile the driver does not support.
fn parse_max(raw: &str) -> Result<DriverMax, String> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(DriverMax(None));
    }
    parse_version(raw).map(|v| DriverMax(Some(v)))
}

fn parse_version(raw: &str) -> Result<GlVersion, String> {
    let (major, minor) = raw
        .split_once('.')
        .ok_or_else(|| format!("expected MAJOR.MINOR, got {raw:?}"))?;
    let version = GlVersion::new(
        major.parse().map_err(|e| format!("bad major: {e}"))?,
        minor.parse().map_err(|e| format!("bad minor: {e}"))?,
    );
    if !version.is_valid() {
        return Err(format!("{version} is not a GL version"));
    }
    Ok(version)
}

#[derive(Parser, Debug)]
#[command(
    name = "probe",
    about = "Negotiate GL versions against a headless driver",
    version
)]
struct Args {
    /// Display connection name.
    #[arg(long, default_value = ":0")]
    connection: String,

    /// Highest core profile version the driver accepts.
    #[arg(long, default_value = "4.6", value_parser = parse_max)]
    core_max: DriverMax,

    /// Highest forward-compatible core version the driver accepts.
    #[arg(long, default_value = "4.6", value_parser = parse_max)]
    forward_max: DriverMax,

    /// Highest compatibility profile version the driver accepts.
    #[arg(long, default_value = "4.6", value_parser = parse_max)]
    compat_max: DriverMax,

    /// Disable the version-negotiating creation path.
    #[arg(long)]
    legacy: bool,

    /// Version string reported by legacy contexts.
    #[arg(long, default_value = "3.0 Headless 1.0")]
    legacy_version: String,

    /// Lowest GL3 version tried during negotiation.
    #[arg(long, default_value = "3.1", value_parser = parse_version)]
    gl3_floor: GlVersion,

    /// Profile of the drawable the context renders to.
    #[arg(long, default_value = "gl3", value_enum)]
    profile: CliProfile,

    /// Functions to look up on the created context.
    #[arg(long = "function", default_values = ["glDrawArrays", "glBegin"])]
    functions: Vec<String>,
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    gl_context::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("Probe failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> ContextResult<()> {
    let driver = HeadlessConfig::default()
        .with_arb(!args.legacy)
        .with_core_max(args.core_max.0)
        .with_forward_max(args.forward_max.0)
        .with_compat_max(args.compat_max.0)
        .with_legacy_version(args.legacy_version.clone());
    let device = HeadlessDevice::new(args.connection.clone(), driver);

    let negotiation = NegotiationPolicy::default().with_range(
        3,
        VersionRange::new(GlVersion::new(3, 3), args.gl3_floor),
    );
    let factory = ContextFactory::new(
        ContextConfig::default()
            .with_lock_policy(LockPolicy::FailFast)
            .with_negotiation(negotiation),
    );

    let profile = GlProfile::from(args.profile);
    let context = factory.create_context(
        device.surface(Some(profile)),
        Box::new(device.platform()),
        Arc::new(HeadlessLookup::new()),
        None,
    );
    let result = context.make_current()?;

    println!("Device {}", device.id());
    println!("  trial creations: {}", device.arb_attempts());
    let mapped = factory.services().versions.mapped_versions(device.id());
    if mapped.is_empty() {
        println!("  no negotiated versions");
    }
    for (request, version) in mapped {
        println!("  {:<12} -> {version}", request.to_string());
    }

    println!("Context {} ({profile}): {result:?}", context.id());
    match context.negotiated_version() {
        Some(version) => println!("  version:  {version}"),
        None => println!("  version:  unknown"),
    }
    if let Some(binding) = context.binding() {
        println!("  binding:  {binding}");
    }
    if let Some(identity) = context.identity() {
        println!("  identity: {identity}");
    }
    for name in &args.functions {
        println!("  {name}: {}", context.is_function_available(name));
    }
    if let Some(extensions) = context.gl_extensions_string() {
        println!("  extensions: {extensions}");
    }

    context.release()?;
    factory.destroy_all()
}
