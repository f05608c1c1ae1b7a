//! Shapeshift CLI
//!
//! Replays synthetic access streams against the caches and reports what they
//! specialized into.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use shapeshift::frame::{Fixity, Frame, FrameDescriptor, IncDecOp, SlotKind};
use shapeshift::ic::{CacheState, Context, GetCache, GetOptions, KeyedGetCache, SetCache, SetOptions, StatsSnapshot};
use shapeshift::object::JsObject;
use shapeshift::{CacheConfig, PropertyKey, Value, VERSION};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shapeshift")]
#[command(author, version, about = "Adaptive inline caches and typed frame slots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON cache configuration (defaults plus SHAPESHIFT_* variables otherwise)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic workload and report cache behavior
    Demo {
        /// Workload to run
        #[arg(value_enum)]
        scenario: Scenario,

        /// Number of accesses
        #[arg(short = 'n', long, default_value_t = 10_000)]
        iterations: usize,

        /// Seed for the key stream
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Scenario {
    /// One layout at one site
    Monomorphic,
    /// Two layouts at one site
    Polymorphic,
    /// Many layouts at one site
    Megamorphic,
    /// Skewed key stream at a keyed site
    HotKeys,
    /// Layout invalidated mid-stream
    Invalidation,
    /// Numeric loop over typed frame slots
    Slots,
}

#[derive(Serialize)]
struct Report {
    scenario: Scenario,
    iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_state: Option<CacheState>,
    entries: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    promoted_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    slot_kinds: Vec<(String, SlotKind)>,
    checksum: f64,
    stats: StatsSnapshot,
    elapsed_us: u128,
}

impl Report {
    fn new(scenario: Scenario, iterations: usize) -> Self {
        Self {
            scenario,
            iterations,
            cache_state: None,
            entries: 0,
            promoted_keys: Vec::new(),
            slot_kinds: Vec::new(),
            checksum: 0.0,
            stats: StatsSnapshot::default(),
            elapsed_us: 0,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Demo {
            scenario,
            iterations,
            seed,
            json,
        } => {
            let report = run_demo(&config, scenario, iterations, seed)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<CacheConfig> {
    let config = match path {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            CacheConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => CacheConfig::from_env().context("reading SHAPESHIFT_* environment")?,
    };
    tracing::info!(?config, "cache configuration loaded");
    Ok(config)
}

fn run_demo(config: &CacheConfig, scenario: Scenario, iterations: usize, seed: u64) -> Result<Report> {
    if iterations == 0 {
        bail!("iterations must be positive");
    }
    let ctx = Context::with_config(config.clone())?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = Report::new(scenario, iterations);
    let start = Instant::now();

    match scenario {
        Scenario::Monomorphic | Scenario::Polymorphic | Scenario::Megamorphic => {
            let layouts = match scenario {
                Scenario::Monomorphic => 1,
                Scenario::Polymorphic => 2,
                _ => 8,
            };
            let objects = layouts_with_x(layouts);
            let cache = GetCache::new(&ctx, "x", GetOptions::default());
            for _ in 0..iterations {
                let obj = &objects[rng.gen_range(0..objects.len())];
                report.checksum += cache.get_double(obj)?;
            }
            report.cache_state = Some(cache.state());
            report.entries = cache.len();
        }
        Scenario::HotKeys => {
            let keys: Vec<PropertyKey> = (0..64).map(|i| PropertyKey::name(&format!("k{}", i))).collect();
            let obj = JsObject::new(None);
            for (i, key) in keys.iter().enumerate() {
                obj.define_data(key, Value::Int(i as i32), Default::default())?;
            }
            let obj = Value::Object(obj);
            let cache = KeyedGetCache::new(&ctx);
            for _ in 0..iterations {
                // Roughly half of the accesses go to k0, a quarter to k1 and so on.
                let mut index = 0;
                while index < keys.len() - 1 && rng.gen_bool(0.5) {
                    index += 1;
                }
                report.checksum += cache.get(&obj, &keys[index])?.to_number();
            }
            report.promoted_keys = cache.promoted_keys().iter().map(|k| k.to_string()).collect();
            report.entries = report.promoted_keys.len();
        }
        Scenario::Invalidation => {
            let objects = layouts_with_x(2);
            let get = GetCache::new(&ctx, "x", GetOptions::default());
            let set = SetCache::new(&ctx, "x", SetOptions::default());
            for i in 0..iterations {
                if i == iterations / 2 {
                    if let Some(o) = objects[1].as_object() {
                        o.delete(&PropertyKey::name("pad0"))?;
                    }
                }
                let obj = &objects[i % objects.len()];
                set.set(obj, Value::Int(i as i32))?;
                report.checksum += get.get_double(obj)?;
            }
            report.cache_state = Some(get.state());
            report.entries = get.len();
        }
        Scenario::Slots => {
            let desc = FrameDescriptor::builder().slot("i").slot("sum").tdz_slot("step").build();
            let (i, sum, step) = match (desc.slot("i"), desc.slot("sum"), desc.slot("step")) {
                (Some(i), Some(sum), Some(step)) => (i.clone(), sum.clone(), step.clone()),
                _ => bail!("frame descriptor lost a slot"),
            };
            let mut frame = Frame::new(&desc);
            frame.write(&i, Value::Int(0))?;
            frame.write(&sum, Value::Int(0))?;
            frame.write(&step, Value::Int(1))?;
            while (frame.read_int(&i)? as usize) < iterations {
                let current = frame.read(&sum)?.to_number() + frame.read(&step)?.to_number();
                let next = if current.fract() == 0.0 && current.abs() <= i32::MAX as f64 {
                    Value::Int(current as i32)
                } else {
                    Value::Number(current)
                };
                frame.write(&sum, next)?;
                if rng.gen_ratio(1, 1000) {
                    frame.write(&step, Value::Number(0.5))?;
                }
                frame.increment(&i, IncDecOp::Increment, Fixity::Prefix)?;
            }
            report.checksum = frame.read(&sum)?.to_number();
            report.slot_kinds = desc
                .slots()
                .iter()
                .map(|s| (s.identifier().to_string(), desc.kind(s)))
                .collect();
            report.entries = desc.generation() as usize;
        }
    }

    report.elapsed_us = start.elapsed().as_micros();
    report.stats = ctx.snapshot();
    Ok(report)
}

/// Objects with `x` at the same slot but `n` distinct layouts
fn layouts_with_x(n: usize) -> Vec<Value> {
    (0..n)
        .map(|layout| {
            let obj = JsObject::new(None);
            for pad in 0..layout {
                let _ = obj.define_data(&PropertyKey::name(&format!("pad{}", pad)), Value::Int(0), Default::default());
            }
            let _ = obj.define_data(&PropertyKey::name("x"), Value::Int(layout as i32 + 1), Default::default());
            Value::Object(obj)
        })
        .collect()
}

fn print_report(report: &Report) {
    println!("shapeshift {} - {:?}", VERSION, report.scenario);
    println!("  iterations:      {}", report.iterations);
    if let Some(state) = report.cache_state {
        println!("  cache state:     {}", state);
    }
    println!("  entries:         {}", report.entries);
    if !report.promoted_keys.is_empty() {
        println!("  promoted keys:   {}", report.promoted_keys.join(", "));
    }
    for (name, kind) in &report.slot_kinds {
        println!("  slot {:<10} {}", name, kind);
    }
    println!("  checksum:        {}", report.checksum);
    println!("  elapsed:         {} us", report.elapsed_us);
    let s = &report.stats;
    println!(
        "  stats:           {} entries, {} polymorphic, {} megamorphic, {} invalidations, {} promotions",
        s.entries_added, s.polymorphic_inserts, s.megamorphic_rewrites, s.invalidation_restarts, s.hot_key_promotions
    );
}
