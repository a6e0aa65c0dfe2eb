use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use worldseed::{
    CachedLayoutGenerator, Category, GenerationParameterCalculator, GenerationParams,
    GenerationRequest, GridTopology, Layout, LayoutGenerator, PlacementRule, WorldGenConfig,
    WorldGenError, WorldGenResult,
};

#[derive(Parser, Clone)]
#[command(name = "placement_bench")]
#[command(about = "Compare the naive layout generator against the cached variant")]
struct Args {
    /// Grid size in cells (format: WIDTHxHEIGHT)
    #[arg(long, default_value = "64x64")]
    size: String,

    /// Grid topology (square, hex)
    #[arg(long, default_value = "square")]
    topology: String,

    /// Generation runs per variant
    #[arg(long, default_value = "20")]
    runs: u32,

    /// Concurrent requests per run against the shared cache (1 = serial)
    #[arg(long, default_value = "1")]
    concurrent: u32,

    /// Random seed for reproducible generation
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum POIs per layout
    #[arg(long, default_value = "12")]
    max_entities: u32,

    /// Resource nodes per layout
    #[arg(long, default_value = "8")]
    resource_nodes: u32,

    /// Danger level fed to the parameter calculator (1-10)
    #[arg(long, default_value = "5")]
    danger: u8,

    /// Narrative context keywords, comma-separated (e.g. "crowded,organized")
    #[arg(long, default_value = "")]
    context: String,

    /// Give every run its own seed, defeating the cache on purpose
    #[arg(long)]
    vary_seeds: bool,

    /// Optional TOML config; overrides the size/entity flags above
    #[arg(long)]
    config: Option<String>,
}

fn parse_size(size: &str) -> WorldGenResult<(u32, u32)> {
    let parts: Vec<&str> = size.split('x').collect();
    if parts.len() != 2 {
        return Err(WorldGenError::ConfigValidationFailed {
            reason: format!("size must be WIDTHxHEIGHT, got '{size}'"),
        });
    }
    let width = parts[0]
        .parse()
        .map_err(|_| WorldGenError::ConfigValidationFailed {
            reason: format!("invalid width '{}'", parts[0]),
        })?;
    let height = parts[1]
        .parse()
        .map_err(|_| WorldGenError::ConfigValidationFailed {
            reason: format!("invalid height '{}'", parts[1]),
        })?;
    Ok((width, height))
}

fn parse_topology(topology: &str) -> WorldGenResult<GridTopology> {
    match topology.to_lowercase().as_str() {
        "square" => Ok(GridTopology::Square),
        "hex" => Ok(GridTopology::Hex),
        other => Err(WorldGenError::ConfigValidationFailed {
            reason: format!("unknown topology '{other}' (expected square or hex)"),
        }),
    }
}

fn build_request(args: &Args) -> WorldGenResult<GenerationRequest> {
    let mut config = match &args.config {
        Some(path) => WorldGenConfig::load_from_file(path)?,
        None => {
            let (width, height) = parse_size(&args.size)?;
            let mut config = WorldGenConfig::default();
            config.width = width;
            config.height = height;
            config.topology = parse_topology(&args.topology)?;
            config.max_entities = args.max_entities;
            config.resource_nodes = args.resource_nodes;
            config
        }
    };
    config.seed = args.seed.or(config.seed);

    // Derive the social rule from the narrative/danger inputs so the bench
    // exercises the same parameter path the orchestration layer uses
    let narrative_context: Vec<String> = args
        .context
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_string())
        .collect();
    let calculator = GenerationParameterCalculator::new();
    let distribution = calculator.calculate(&GenerationParams {
        danger_level: args.danger,
        category: Category::Social,
        narrative_context,
        area_width: config.width,
        area_height: config.height,
    });
    println!(
        "Derived parameters: density={:.2} organization={:.2} min_spacing={} road_density={:.2}",
        distribution.density.get(),
        distribution.organization_factor.get(),
        distribution.min_spacing,
        distribution.road_density.get()
    );
    config.category_rules.insert(
        Category::Social,
        PlacementRule {
            min_spacing: distribution.min_spacing,
            ..Default::default()
        },
    );

    Ok(config.to_request())
}

struct BenchReport {
    label: String,
    total: Duration,
    runs: u32,
    layout_bytes: usize,
    placed: usize,
    paths: usize,
}

impl BenchReport {
    fn print(&self) {
        let avg = self.total / self.runs.max(1);
        println!(
            "{label:>8}: avg {avg:>10.3?}  layout {bytes} bytes  ({placed} placed, {paths} paths)",
            label = self.label,
            avg = avg,
            bytes = self.layout_bytes,
            placed = self.placed,
            paths = self.paths,
        );
    }
}

fn layout_size(layout: &Layout) -> usize {
    bincode::serde::encode_to_vec(layout, bincode::config::standard())
        .map(|bytes| bytes.len())
        .unwrap_or(0)
}

fn run_naive(request: &GenerationRequest, args: &Args) -> WorldGenResult<BenchReport> {
    let generator = LayoutGenerator::default();
    let mut last = None;
    let start = Instant::now();
    for run in 0..args.runs {
        let mut request = request.clone();
        if args.vary_seeds {
            request.seed = Some(request.seed_value() + run as u64);
        }
        last = Some(generator.generate(&request)?);
    }
    let total = start.elapsed();
    let layout = last.expect("at least one run");
    Ok(BenchReport {
        label: "naive".to_string(),
        total,
        runs: args.runs,
        layout_bytes: layout_size(&layout),
        placed: layout.placed.len(),
        paths: layout.paths.len(),
    })
}

fn run_cached(request: &GenerationRequest, args: &Args) -> WorldGenResult<(BenchReport, f64)> {
    let generator = Arc::new(CachedLayoutGenerator::default());
    let mut last = None;
    let start = Instant::now();
    for run in 0..args.runs {
        let mut request = request.clone();
        if args.vary_seeds {
            request.seed = Some(request.seed_value() + run as u64);
        }

        if args.concurrent > 1 {
            // Concurrent requests share one cache; each runs against its
            // own grid instance
            std::thread::scope(|scope| {
                for _ in 0..args.concurrent {
                    let generator = Arc::clone(&generator);
                    let request = request.clone();
                    scope.spawn(move || generator.get_or_generate(&request));
                }
            });
            last = Some(generator.get_or_generate(&request)?);
        } else {
            last = Some(generator.get_or_generate(&request)?);
        }
    }
    let total = start.elapsed();
    let layout = last.expect("at least one run");
    let report = BenchReport {
        label: "cached".to_string(),
        total,
        runs: args.runs,
        layout_bytes: layout_size(&layout),
        placed: layout.placed.len(),
        paths: layout.paths.len(),
    };
    Ok((report, generator.cache_hit_ratio()))
}

fn main() -> WorldGenResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let request = build_request(&args)?;

    println!(
        "Benchmarking {}x{} {:?} grid, {} runs, concurrency {}",
        request.width, request.height, request.topology, args.runs, args.concurrent
    );

    let naive = run_naive(&request, &args)?;
    let (cached, hit_ratio) = run_cached(&request, &args)?;

    naive.print();
    cached.print();
    println!("Cache hit ratio: {:.1}%", hit_ratio * 100.0);

    let naive_avg = naive.total.as_secs_f64() / naive.runs.max(1) as f64;
    let cached_avg = cached.total.as_secs_f64() / cached.runs.max(1) as f64;
    if cached_avg > 0.0 {
        println!("Speedup: {:.1}x", naive_avg / cached_avg);
    }
    Ok(())
}
