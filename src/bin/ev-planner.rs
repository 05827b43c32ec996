use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use ev_fleet_planner::config::PlannerConfig;
use ev_fleet_planner::geo::Coordinate;
use ev_fleet_planner::scorer::{rank_stations, ScoringWeights, StationCandidate};
use ev_fleet_planner::solver::{alternative_routes, optimize_multi_stop, single_route};
use ev_fleet_planner::{route_risk, telemetry};

#[derive(Parser)]
#[command(author, version, about = "Route planning for EV charging trips", long_about = None)]
struct Args {
    /// JSON config file; EV_PLANNER_* variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route on great-circle estimates only.
    #[arg(long, default_value_t = false)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Point-to-point route.
    Route {
        /// "lat,lon"
        #[arg(value_parser = parse_coordinate)]
        start: Coordinate,
        #[arg(value_parser = parse_coordinate)]
        end: Coordinate,
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Best visiting order for several stops.
    MultiStop {
        #[arg(value_parser = parse_coordinate)]
        start: Coordinate,
        #[arg(required = true, value_parser = parse_coordinate)]
        stops: Vec<Coordinate>,
        /// Defaults to the start.
        #[arg(long, value_parser = parse_coordinate)]
        end: Option<Coordinate>,
    },
    /// Primary route plus jittered detours.
    Alternatives {
        #[arg(value_parser = parse_coordinate)]
        start: Coordinate,
        #[arg(value_parser = parse_coordinate)]
        end: Coordinate,
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
        #[arg(long, help = "Random seed for reproducible detours")]
        seed: Option<u64>,
    },
    /// Rank charging stations from a JSON array of candidates.
    Rank {
        #[arg(value_parser = parse_coordinate)]
        location: Coordinate,
        stations: PathBuf,
    },
    /// Weighted risk of a trip.
    RouteRisk {
        #[arg(value_parser = parse_coordinate)]
        start: Coordinate,
        #[arg(value_parser = parse_coordinate)]
        end: Coordinate,
        #[arg(short, long)]
        weather: Option<String>,
        /// Hour of departure; defaults to the current hour.
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,
    },
    /// Simulated traffic along a path of points.
    Traffic {
        #[arg(num_args = 2.., required = true, value_parser = parse_coordinate)]
        path: Vec<Coordinate>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got '{}'", raw))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude '{}'", lat))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude '{}'", lon))?;
    Coordinate::new(lat, lon).map_err(|err| err.to_string())
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PlannerConfig::load(args.config.as_deref())?;
    config.offline |= args.offline;
    telemetry::init(&config.log_level);

    let oracle = config.build_oracle();
    info!(
        osrm = %config.osrm.base_url,
        offline = config.offline,
        "planner ready"
    );

    match args.command {
        Command::Route { start, end, profile } => {
            let profile = profile.unwrap_or_else(|| oracle.default_profile().to_string());
            print_json(&single_route(&oracle, start, end, &profile))?;
        }
        Command::MultiStop { start, stops, end } => {
            print_json(&optimize_multi_stop(&oracle, start, &stops, end)?)?;
        }
        Command::Alternatives {
            start,
            end,
            count,
            seed,
        } => {
            print_json(&alternative_routes(&oracle, start, end, count, &mut rng(seed)))?;
        }
        Command::Rank { location, stations } => {
            let raw = std::fs::read_to_string(&stations)
                .with_context(|| format!("reading {}", stations.display()))?;
            let candidates: Vec<StationCandidate> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", stations.display()))?;
            print_json(&rank_stations(
                &oracle,
                location,
                &candidates,
                &ScoringWeights::default(),
            )?)?;
        }
        Command::RouteRisk {
            start,
            end,
            weather,
            hour,
        } => {
            let route = oracle.route_default(start, end);
            let assessment = match hour {
                Some(hour) => route_risk::assess(&route, weather.as_deref(), hour),
                None => route_risk::assess_now(&route, weather.as_deref()),
            };
            print_json(&assessment)?;
        }
        Command::Traffic { path, seed } => {
            let now = chrono::Local::now().naive_local();
            print_json(&route_risk::traffic_conditions(&path, now, &mut rng(seed)))?;
        }
    }

    Ok(())
}
