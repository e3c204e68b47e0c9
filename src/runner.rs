use crate::error::Result;
use crate::export::{FrameExporter, RenderHook};
use crate::statistics::SimulationStatistics;
use crate::Simulation;

/// Observers invoked between frames.
#[derive(Default)]
pub struct Hooks {
    pub exporters: Vec<Box<dyn FrameExporter>>,
    pub renderers: Vec<Box<dyn RenderHook>>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty() && self.renderers.is_empty()
    }

    fn call<S: Simulation>(&mut self, simulation: &S) -> Result<()> {
        let frame = simulation.frame();

        if !self.exporters.is_empty() {
            let snapshots = simulation.snapshots();
            for exporter in self.exporters.iter_mut() {
                exporter.export(frame, &snapshots)?;
            }
        }

        if !self.renderers.is_empty() {
            let vertices = simulation.vertices();
            for renderer in self.renderers.iter_mut() {
                renderer.render(frame, &vertices)?;
            }
        }

        Ok(())
    }
}

/// Drives a simulation frame by frame.
pub struct SimulationRunner<S> {
    pub simulation: S,
}

impl<S: Simulation + SimulationStatistics> SimulationRunner<S> {
    pub fn new(simulation: S) -> Self {
        SimulationRunner { simulation }
    }

    /// Advances `frames` frames, calling `hooks` after each one. A simulation that has not run
    /// yet also reports its initial state as frame 0.
    pub fn run(&mut self, frames: usize, hooks: &mut Hooks) -> Result<()> {
        if self.simulation.frame() == 0 {
            hooks.call(&self.simulation)?;
        }

        let last = self.simulation.frame() + frames;
        while self.simulation.frame() < last {
            self.simulation.advance_frame();
            self.log_frame();
            hooks.call(&self.simulation)?;
        }

        Ok(())
    }

    fn log_frame(&self) {
        let s = &self.simulation;
        tracing::debug!(
            "Frame {} (t = {:.4}): mass {:.6e}, momentum {:?}, kinetic energy {:.6e}, volume {:.6e}",
            s.frame(),
            s.total_time(),
            s.total_mass(),
            s.total_linear_momentum().as_slice(),
            s.total_energy(),
            s.total_volume()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, MaterialConfig, ObjectConfig, ParticleBudget, SceneConfig};
    use crate::export::{ObjectSnapshot, Vertex};
    use crate::mpm::{MpmSimulation, Phase};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(usize, usize)>>>);

    impl FrameExporter for Recorder {
        fn export(&mut self, frame: usize, snapshots: &[ObjectSnapshot]) -> Result<()> {
            let particles = snapshots.iter().map(|s| s.positions.len()).sum();
            self.0.lock().unwrap().push((frame, particles));
            Ok(())
        }
    }

    impl RenderHook for Recorder {
        fn render(&mut self, frame: usize, vertices: &[Vertex]) -> Result<()> {
            self.0.lock().unwrap().push((frame, vertices.len()));
            Ok(())
        }
    }

    fn scene() -> SceneConfig {
        SceneConfig {
            quality: 1,
            substeps_per_frame: 5,
            budget: ParticleBudget::Fixed {
                base_num_particles: 100,
            },
            objects: vec![ObjectConfig::new(
                MaterialConfig::new("snow", 1000., 0.2, 1.),
                GeometryConfig::sphere([0.5; 3], 0.1),
            )],
            ..Default::default()
        }
    }

    #[test]
    fn hooks_run_once_per_frame() {
        let mut runner = SimulationRunner::new(MpmSimulation::new(&scene()).unwrap());
        let exported = Recorder::default();
        let rendered = Recorder::default();
        let mut hooks = Hooks {
            exporters: vec![Box::new(exported.clone())],
            renderers: vec![Box::new(rendered.clone())],
        };

        runner.run(3, &mut hooks).unwrap();
        assert_eq!(runner.simulation.frame(), 3);
        assert_eq!(runner.simulation.phase(), Phase::Idle);
        assert_eq!(
            *exported.0.lock().unwrap(),
            vec![(0, 100), (1, 100), (2, 100), (3, 100)]
        );
        assert_eq!(rendered.0.lock().unwrap().len(), 4);

        // resuming does not repeat the initial frame
        runner.run(2, &mut hooks).unwrap();
        assert_eq!(runner.simulation.frame(), 5);
        assert_eq!(exported.0.lock().unwrap().last(), Some(&(5, 100)));
        assert_eq!(exported.0.lock().unwrap().len(), 6);
    }

    #[test]
    fn runs_without_hooks() {
        let mut runner = SimulationRunner::new(MpmSimulation::new(&scene()).unwrap());
        let mut hooks = Hooks::default();
        assert!(hooks.is_empty());

        runner.run(2, &mut hooks).unwrap();
        assert_eq!(runner.simulation.frame(), 2);
        assert!((runner.simulation.time() - 10. * 1e-4).abs() < 1e-12);
    }
}
