use mpm_sim::config::{SceneConfig, SimulationMode};
use mpm_sim::export::ExportFormat;
use mpm_sim::statistics::SimulationStatistics;
use mpm_sim::{CoupledSimulation, Hooks, MpmSimulation, Simulation, SimulationRunner};

use eyre::WrapErr;
use structopt::StructOpt;
use tracing::Level;

#[derive(StructOpt, Debug)]
#[structopt(name = "mpm_sim")]
struct Opt {
    /// JSON scene description
    #[structopt(short, long)]
    scene: Option<std::path::PathBuf>,
    /// Built-in scene, used when no scene file is given
    #[structopt(short, long, default_value = "water_jelly_snow")]
    preset: String,
    #[structopt(short, long, default_value = "600")]
    frames: usize,
    #[structopt(short, long)]
    output_dir: Option<std::path::PathBuf>,
    /// `ply` or `msgpack`
    #[structopt(long, default_value = "ply")]
    format: ExportFormat,
    /// Overrides the mode of the scene: `single_pool` or `coupled`
    #[structopt(long)]
    mode: Option<SimulationMode>,
    /// Print the resolved scene as JSON and exit
    #[structopt(long)]
    dump_scene: bool,
    /// -v for debug, -vv for trace
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

fn run<S: Simulation + SimulationStatistics>(simulation: S, opt: &Opt) -> eyre::Result<()> {
    let mut hooks = Hooks::default();
    if let Some(dir) = &opt.output_dir {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create output directory {:?}", dir))?;
        hooks.exporters.push(opt.format.exporter(dir.clone()));
    }

    let mut runner = SimulationRunner::new(simulation);
    for frame in 0..opt.frames {
        tracing::info!("Starting frame {}", frame + 1);
        runner
            .run(1, &mut hooks)
            .wrap_err_with(|| format!("Frame {} failed", frame + 1))?;
    }

    tracing::info!(
        "Finished {} frames, simulated {:.3}s",
        runner.simulation.frame(),
        runner.simulation.time()
    );
    Ok(())
}

fn main() -> eyre::Result<()> {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match &opt.scene {
        Some(path) => SceneConfig::from_json_file(path)
            .wrap_err_with(|| format!("Failed to read scene file: {:?}", path))?,
        None => SceneConfig::preset(&opt.preset).wrap_err("Failed to load preset")?,
    };
    if let Some(mode) = opt.mode {
        config.mode = mode;
    }

    if opt.dump_scene {
        println!("{}", config.to_json_string()?);
        return Ok(());
    }

    match config.mode {
        SimulationMode::SinglePool => run(
            MpmSimulation::new(&config).wrap_err("Failed to assemble the scene")?,
            &opt,
        ),
        SimulationMode::Coupled => run(
            CoupledSimulation::new(&config).wrap_err("Failed to assemble the scene")?,
            &opt,
        ),
    }
}
