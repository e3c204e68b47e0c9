//! Hooks that observe a simulation between frames. None of them feed back into the solver.

use crate::error::{MpmError, Result};
use crate::math::T;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    /// The raw bytes of a vertex slice, ready to upload into a vertex buffer.
    pub fn as_bytes(vertices: &[Vertex]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }
}

/// The active particles of one object at the end of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub frame: usize,
    pub object: usize,
    pub color: [f32; 4],
    pub positions: Vec<[T; 3]>,
}

/// Writes the per-object snapshots of a frame somewhere.
pub trait FrameExporter {
    fn export(&mut self, frame: usize, snapshots: &[ObjectSnapshot]) -> Result<()>;
}

/// Receives the vertices of every frame for visualization.
pub trait RenderHook {
    fn render(&mut self, frame: usize, vertices: &[Vertex]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Ply,
    Msgpack,
}

impl std::str::FromStr for ExportFormat {
    type Err = MpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ply" => Ok(ExportFormat::Ply),
            "msgpack" => Ok(ExportFormat::Msgpack),
            _ => Err(MpmError::InvalidParameter(format!(
                "unknown export format {:?}",
                s
            ))),
        }
    }
}

impl ExportFormat {
    pub fn exporter(self, dir: PathBuf) -> Box<dyn FrameExporter> {
        match self {
            ExportFormat::Ply => Box::new(PlyExporter::new(dir)),
            ExportFormat::Msgpack => Box::new(MsgpackExporter::new(dir)),
        }
    }
}

/// One ASCII PLY file per object: `<dir>/<frame>/particle_object_<object>.ply`.
pub struct PlyExporter {
    dir: PathBuf,
}

impl PlyExporter {
    pub fn new(dir: PathBuf) -> Self {
        PlyExporter { dir }
    }

    pub fn path(&self, frame: usize, object: usize) -> PathBuf {
        self.dir
            .join(format!("{:06}", frame))
            .join(format!("particle_object_{}.ply", object))
    }
}

fn color_byte(c: f32) -> u8 {
    (c.max(0.).min(1.) * 255.).round() as u8
}

pub fn write_ply<W: Write>(writer: &mut W, snapshot: &ObjectSnapshot) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", snapshot.positions.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property float {}", axis)?;
    }
    for channel in ["red", "green", "blue", "alpha"] {
        writeln!(writer, "property uchar {}", channel)?;
    }
    writeln!(writer, "end_header")?;

    let [r, g, b, a] = snapshot.color.map(color_byte);
    for [x, y, z] in &snapshot.positions {
        writeln!(writer, "{} {} {} {} {} {} {}", x, y, z, r, g, b, a)?;
    }
    Ok(())
}

impl FrameExporter for PlyExporter {
    fn export(&mut self, frame: usize, snapshots: &[ObjectSnapshot]) -> Result<()> {
        std::fs::create_dir_all(self.dir.join(format!("{:06}", frame)))?;
        for snapshot in snapshots {
            let file = std::fs::File::create(self.path(frame, snapshot.object))?;
            let mut writer = BufWriter::new(file);
            write_ply(&mut writer, snapshot)?;
            writer.flush()?;
        }
        Ok(())
    }
}

/// All objects of a frame in one MessagePack file: `<dir>/<frame>.msgpack`.
pub struct MsgpackExporter {
    dir: PathBuf,
}

impl MsgpackExporter {
    pub fn new(dir: PathBuf) -> Self {
        MsgpackExporter { dir }
    }

    pub fn path(&self, frame: usize) -> PathBuf {
        self.dir.join(format!("{:06}.msgpack", frame))
    }
}

impl FrameExporter for MsgpackExporter {
    fn export(&mut self, frame: usize, snapshots: &[ObjectSnapshot]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut writer = BufWriter::new(std::fs::File::create(self.path(frame))?);
        rmp_serde::encode::write(&mut writer, snapshots)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads back a frame written by `MsgpackExporter`.
pub fn read_msgpack_frame(path: &Path) -> Result<Vec<ObjectSnapshot>> {
    let bytes = std::fs::read(path)?;
    rmp_serde::from_read_ref(&bytes).map_err(|e| {
        MpmError::InvalidParameter(format!("{:?} is not a snapshot frame: {}", path, e))
    })
}

/// Streams the vertices of every frame to another thread, e.g. a window.
impl RenderHook for std::sync::mpsc::Sender<Vec<Vertex>> {
    fn render(&mut self, _frame: usize, vertices: &[Vertex]) -> Result<()> {
        self.send(vertices.to_vec()).map_err(|_| {
            MpmError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "the vertex receiver hung up",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mpm_sim_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn snapshot(object: usize) -> ObjectSnapshot {
        ObjectSnapshot {
            frame: 3,
            object,
            color: [0.2, 0.6, 1., 1.],
            positions: vec![[0.25, 0.5, 0.75], [0.1, 0.2, 0.3]],
        }
    }

    #[test]
    fn ply_layout() {
        let mut bytes = Vec::new();
        write_ply(&mut bytes, &snapshot(0)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "ply");
        assert_eq!(lines[2], "element vertex 2");
        assert_eq!(lines[10], "end_header");
        assert_eq!(lines[11], "0.25 0.5 0.75 51 153 255 255");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn ply_files_per_frame_and_object() {
        let dir = scratch_dir("ply");
        let mut exporter = PlyExporter::new(dir.clone());
        exporter.export(3, &[snapshot(0), snapshot(1)]).unwrap();

        assert!(dir.join("000003").join("particle_object_0.ply").is_file());
        assert!(exporter.path(3, 1).is_file());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn msgpack_frame_reads_back() {
        let dir = scratch_dir("msgpack");
        let mut exporter = MsgpackExporter::new(dir.clone());
        let snapshots = vec![snapshot(0), snapshot(1)];
        exporter.export(3, &snapshots).unwrap();

        let path = dir.join("000003.msgpack");
        assert_eq!(read_msgpack_frame(&path).unwrap(), snapshots);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn vertices_cast_to_bytes() {
        let vertices = [Vertex {
            position: [1., 2., 3.],
            color: [1.; 4],
        }; 2];
        assert_eq!(Vertex::as_bytes(&vertices).len(), 2 * 7 * 4);
    }

    #[test]
    fn channel_render_hook() {
        let (mut tx, rx) = std::sync::mpsc::channel::<Vec<Vertex>>();
        let vertex = Vertex {
            position: [0.; 3],
            color: [1.; 4],
        };
        tx.render(0, &[vertex]).unwrap();
        assert_eq!(rx.recv().unwrap(), vec![vertex]);

        drop(rx);
        assert!(tx.render(1, &[vertex]).is_err());
    }
}
