//! CLI commands for butterfly-overlay

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use butterfly_overlay::build::{grid, StoreWriter};
use butterfly_overlay::{Coord, Metric, Planner, Route, Store, Transport};

#[derive(Parser)]
#[command(name = "butterfly-overlay")]
#[command(about = "Partitioned point-to-point routing over memory-mapped graphs", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Route through two or more waypoints
    Route {
        /// Store directory (contains overlay/ and clusterN/)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Transport::Car)]
        transport: Transport,

        #[arg(short, long, value_enum, default_value_t = Metric::Duration)]
        metric: Metric,

        /// Print the full route as JSON
        #[arg(long)]
        json: bool,

        /// Waypoints as lat,lon
        #[arg(required = true, num_args = 2.., value_parser = parse_coord)]
        waypoints: Vec<Coord>,
    },

    /// Snap one coordinate onto the graph
    Snap {
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Transport::Car)]
        transport: Transport,

        /// Point as lat,lon
        #[arg(value_parser = parse_coord)]
        point: Coord,
    },

    /// Print store statistics
    Inspect {
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Write a synthetic partitioned grid store
    BuildGrid {
        /// Output store directory
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long, default_value = "40")]
        width: u32,

        #[arg(long, default_value = "30")]
        height: u32,

        #[arg(long, default_value = "4")]
        clusters_x: u32,

        #[arg(long, default_value = "3")]
        clusters_y: u32,

        /// Lattice spacing in degrees
        #[arg(long, default_value_t = grid::DEFAULT_SPACING)]
        spacing: f64,
    },
}

fn parse_coord(s: &str) -> std::result::Result<Coord, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("coordinate '{}' must be in format 'lat,lon'", s))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude '{}': {}", lat, e))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude '{}': {}", lon, e))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinate '{}' is out of range", s));
    }
    Ok(Coord::from_degrees(lat, lon))
}

fn open_store(path: &Path) -> Result<Store> {
    Store::open(path).with_context(|| format!("Failed to open store {}", path.display()))
}

pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Route {
            store,
            transport,
            metric,
            json,
            waypoints,
        } => {
            let store = open_store(&store)?;
            let start = Instant::now();
            let route = Planner::new(&store)
                .plan(&waypoints, transport, metric)
                .context("Routing failed")?;
            let elapsed = start.elapsed();

            if json {
                println!("{}", serde_json::to_string_pretty(&route)?);
            } else {
                print_route(&route);
                println!("Planned in {:.3} ms", elapsed.as_secs_f64() * 1000.0);
            }
        }
        Commands::Snap {
            store,
            transport,
            point,
        } => {
            let store = open_store(&store)?;
            let loc = store
                .snap(point, transport)
                .with_context(|| format!("No {} accessible road near {:.6},{:.6}", transport, point.lat_deg(), point.lon_deg()))?;
            println!("{}", serde_json::to_string_pretty(&loc)?);
        }
        Commands::Inspect { store } => {
            let store = open_store(&store)?;
            print_inspect(&store);
        }
        Commands::BuildGrid {
            out,
            width,
            height,
            clusters_x,
            clusters_y,
            spacing,
        } => {
            anyhow::ensure!(width >= 2 && height >= 2, "grid must be at least 2x2");
            anyhow::ensure!(
                (1..=width).contains(&clusters_x) && (1..=height).contains(&clusters_y),
                "cluster counts must be between 1 and the grid size"
            );
            let start = Instant::now();
            let network = grid::grid(width, height, spacing);
            let clusters = grid::grid_clusters(width, height, clusters_x, clusters_y);
            let summary = StoreWriter::new(&out)
                .write(&network, &clusters)
                .with_context(|| format!("Failed to write store {}", out.display()))?;

            println!("Store written to {}", out.display());
            println!("  vertices:          {}", network.vertex_count());
            println!("  edges:             {}", network.edge_count());
            println!("  clusters:          {}", summary.clusters);
            println!("  boundary vertices: {}", summary.boundary_vertices);
            println!("  cut edges:         {}", summary.cut_edges);
            println!("  shortcuts:         {}", summary.shortcuts);
            println!("  took {:.2}s", start.elapsed().as_secs_f64());
        }
    }
    Ok(())
}

fn print_route(route: &Route) {
    let unit = match route.metric {
        Metric::Distance => "m",
        Metric::Duration => "s",
    };
    println!("Route ({}, {}): {:.1} {}", route.transport, route.metric, route.distance, unit);
    for (i, leg) in route.legs.iter().enumerate() {
        println!(
            "  leg {}: {:.1} {}, {} edges, {} points",
            i,
            leg.distance,
            unit,
            leg.edges.len(),
            leg.polyline.len()
        );
    }
}

fn print_inspect(store: &Store) {
    let overlay = store.overlay();
    let shortcuts: usize = (0..overlay.vertex_count() as u32)
        .map(|v| overlay.out_edges(v).filter(|&e| overlay.is_shortcut(e, v)).count())
        .sum();

    println!("Store {}", store.base().display());
    println!(
        "  overlay: {} vertices, {} edges ({} shortcuts)",
        overlay.vertex_count(),
        overlay.edge_count(),
        shortcuts
    );
    for c in 0..store.cluster_count() as u32 {
        let graph = store.cluster(c);
        let bbox = store.spatial().bbox(c);
        println!(
            "  cluster{}: {} vertices ({} boundary), {} edges, bbox [{:.5},{:.5}]-[{:.5},{:.5}]",
            c + 1,
            graph.vertex_count(),
            overlay.cluster_size(c),
            graph.edge_count(),
            bbox.min_lat,
            bbox.min_lon,
            bbox.max_lat,
            bbox.max_lon
        );
    }
}
