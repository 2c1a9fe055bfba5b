//! Animap CLI - Build, inspect and preview tile animation caches.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use animap::{
    animation::{AnimatedImageMap, MapMetadata},
    compute::{MapPalette, Palette, assemble_tiles},
    fetch::SourceFetcher,
    schema::{PipelineConfig, TileGrid},
};
use image::RgbaImage;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("build") if args.len() >= 6 => build(&args[2..]),
        Some("info") if args.len() >= 3 => info(Path::new(&args[2])),
        Some("preview") if args.len() >= 5 => preview(&args[2..]),
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} build <url|path> <width> <height> <data_folder> [config.json]", program);
    eprintln!("  {} info <map_dir>", program);
    eprintln!("  {} preview <map_dir> <tick> <out.png>", program);
    eprintln!("  {} --example", program);
    eprintln!();
    eprintln!("Build a tiled palette animation cache from an animated GIF.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  width, height  Tile grid size in tiles");
    eprintln!("  data_folder    The map is written to <data_folder>/0/");
    eprintln!("  config.json    Pipeline configuration (see --example)");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn load_config(path: Option<&String>) -> PipelineConfig {
    let Some(path) = path else {
        return PipelineConfig::default();
    };
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading config file {}: {}", path, e)));
    let config: PipelineConfig =
        serde_json::from_str(&text).unwrap_or_else(|e| fail(format!("parsing config: {}", e)));
    config.validate().unwrap_or_else(|e| fail(e));
    config
}

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| fail(format!("invalid {}: {}", what, value)))
}

fn build(args: &[String]) {
    let source = &args[0];
    let width: u32 = parse(&args[1], "width");
    let height: u32 = parse(&args[2], "height");
    let data_folder = PathBuf::from(&args[3]);
    let config = load_config(args.get(4));

    let grid = TileGrid::new(width, height).unwrap_or_else(|e| fail(e));
    let creator = std::env::var("USER").unwrap_or_else(|_| "animap".to_string());
    let surface_ids = (0..grid.tile_count() as i32).collect();
    let meta = MapMetadata::new(0, source.as_str(), grid, creator, surface_ids);

    println!("Animap Build");
    println!("============");
    println!("Source: {}", source);
    println!(
        "Grid: {}x{} tiles of {}px (step {}ms)",
        width, height, config.tile_pixels, config.sample_step
    );

    let start = Instant::now();
    let map = AnimatedImageMap::create(
        meta,
        config,
        Arc::new(MapPalette::new()),
        Arc::new(SourceFetcher),
    )
    .unwrap_or_else(|e| fail(e));
    let built = start.elapsed();

    let dir = map.save(&data_folder).unwrap_or_else(|e| fail(e));
    println!(
        "Frames per tile: {} (built in {:.2}s)",
        map.cache().frame_count(),
        built.as_secs_f32()
    );
    println!("Saved to {}", dir.display());
}

fn load_map(dir: &Path) -> AnimatedImageMap {
    AnimatedImageMap::load(
        dir,
        PipelineConfig::default(),
        Arc::new(MapPalette::new()),
        Arc::new(SourceFetcher),
    )
    .unwrap_or_else(|e| fail(e))
}

fn info(dir: &Path) {
    let map = load_map(dir);
    let meta = map.metadata();
    println!("Map {}", meta.index);
    println!("  Source: {}", meta.url);
    println!("  Creator: {}", meta.creator);
    println!("  Created: {} (epoch ms)", meta.creation_time);
    println!(
        "  Grid: {}x{} tiles of {}px",
        meta.grid.width,
        meta.grid.height,
        map.config().tile_pixels
    );
    println!("  Frames per tile: {}", map.cache().frame_count());
    println!("  Surface ids: {:?}", meta.surface_ids);
}

fn preview(args: &[String]) {
    let map = load_map(Path::new(&args[0]));
    let tick: u64 = parse(&args[1], "tick");
    let out = PathBuf::from(&args[2]);

    let tile_pixels = map.config().tile_pixels;
    let grid = map.metadata().grid;
    let palette = map.palette();
    let tiles: Vec<RgbaImage> = (0..grid.tile_count())
        .map(|tile| {
            let colors = map.raw_animation_colors(tick, tile);
            RgbaImage::from_fn(tile_pixels, tile_pixels, |x, y| {
                palette.color(colors[(y * tile_pixels + x) as usize])
            })
        })
        .collect();

    assemble_tiles(&tiles, grid, tile_pixels)
        .save(&out)
        .unwrap_or_else(|e| fail(format!("writing {}: {}", out.display(), e)));
    println!("Wrote tick {} to {}", tick, out.display());
}

fn print_example_config() {
    let config = PipelineConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}
