use clap::Parser;
use log::{info, warn};
use rand::Rng;
use serde::Serialize;

use cpu_dispatch::dispatch::DispatchReport;
use cpu_dispatch::probe::{CPUINFO_PATH, extract_field, read_source};
use cpu_dispatch::{CapabilitySet, ops, registry};

#[derive(Parser)]
#[command(
    name = "cpu_dispatch",
    about = "Report detected CPU capabilities and the variant each dispatched kernel selects",
    version
)]
struct Cli {
    /// Capability tokens to disable before dispatch, e.g. AVX2,SSE41
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also print the raw capability fields of /proc/cpuinfo
    #[arg(long)]
    cpuinfo: bool,

    /// Check every dispatched kernel against a plain loop on N random inputs
    #[arg(long, value_name = "N")]
    verify: Option<usize>,
}

#[derive(Serialize)]
struct Report {
    cpu: Option<&'static str>,
    disabled: CapabilitySet,
    #[serde(flatten)]
    dispatch: DispatchReport,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Must happen before the table is built: building it seals the registry
    for name in &cli.disable {
        registry::force_disable_by_name(name.trim())?;
    }

    if cli.cpuinfo {
        print_cpuinfo();
    }

    let table = ops::builtin_table()?;
    let report = Report {
        cpu: registry::cpu_model_name(),
        disabled: registry::disabled(),
        dispatch: table.report(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(rounds) = cli.verify {
        verify(rounds)?;
        info!("Verified {} rounds on target {}", rounds, ops::dispatch_target());
    }

    Ok(())
}

fn print_cpuinfo() {
    let buffer = match read_source(CPUINFO_PATH) {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };
    for field in ["model name", "flags", "Features", "Hardware", "cpu"] {
        if let Some(value) = extract_field(buffer.as_bytes(), field) {
            println!("{:<12}{}", format!("{}:", field), value);
        }
    }
    println!();
}

fn print_report(report: &Report) {
    println!("CPU:        {}", report.cpu.unwrap_or("unknown"));
    println!("Detected:   {}", registry::detect());
    println!("Disabled:   {}", report.disabled);
    println!("Effective:  {}", report.dispatch.detected);
    println!();

    for function in &report.dispatch.functions {
        let candidates: Vec<String> = function
            .candidates
            .iter()
            .map(|c| {
                if c.eligible {
                    c.variant.name.to_string()
                } else {
                    format!("({})", c.variant.name)
                }
            })
            .collect();
        println!(
            "{:<18} -> {:<9} [{}]",
            function.name,
            function.active.name,
            candidates.join(", ")
        );
    }
}

/// Compare the dispatched kernels with plain loops on random inputs
fn verify(rounds: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    for round in 0..rounds {
        let n = rng.gen_range(0..256);

        let a: Vec<u8> = (0..n).map(|_| rng.r#gen()).collect();
        let b: Vec<u8> = (0..n).map(|_| rng.r#gen()).collect();
        let mut zipped = vec![0u8; 2 * n];
        ops::interleave_u8(&a, &b, &mut zipped)?;
        if a.iter().zip(&b).flat_map(|(x, y)| [*x, *y]).ne(zipped.iter().copied()) {
            return Err(format!("interleave_u8 mismatch in round {} (n = {})", round, n).into());
        }

        let a: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0e3..1.0e3)).collect();
        let b: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0e3..1.0e3)).collect();
        let mut zipped = vec![0.0f32; 2 * n];
        ops::interleave_f32(&a, &b, &mut zipped)?;
        if a.iter().zip(&b).flat_map(|(x, y)| [*x, *y]).ne(zipped.iter().copied()) {
            return Err(format!("interleave_f32 mismatch in round {} (n = {})", round, n).into());
        }

        let mut evens = vec![0.0f32; n];
        let mut odds = vec![0.0f32; n];
        ops::deinterleave_f32(&zipped, &mut evens, &mut odds)?;
        if evens != a || odds != b {
            return Err(format!("deinterleave_f32 mismatch in round {} (n = {})", round, n).into());
        }

        let mut swapped = vec![0.0f32; n];
        ops::swap_pairs_f32(&a, &mut swapped)?;
        let expected = a.chunks(2).flat_map(|pair| pair.iter().rev().copied());
        if expected.ne(swapped.iter().copied()) {
            return Err(format!("swap_pairs_f32 mismatch in round {} (n = {})", round, n).into());
        }
    }
    Ok(())
}
